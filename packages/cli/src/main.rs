//! `spangraph`: operator command-line interface for a span annotation store.
//!
//! Subcommands:
//!
//! - **`seed`**: create the enum nodes annotations link to.
//! - **`add-manifestation`** / **`add-expression`** / **`link`**: create the
//!   nodes annotations and lineage hang off.
//! - **`bibliographic`**, **`notes`**, **`segmentation`**, **`pagination`**:
//!   get, list, add, delete annotations of one kind.
//! - **`purge`**: remove every annotation on a manifestation.
//! - **`infer`**: group expressions by their relation to one expression.
//!
//! Annotation input is JSON read from a file path or from stdin (`-`), either
//! a single object or an array. Output is JSON on stdout.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use spangraph::EdgeType;
use spangraph_store::{
    open_provider, schema, AnnotationKind, GraphProvider, RelationshipService, Repositories,
    SpanAnnotationRepository, StoreConfig, StoreError,
};

/// spangraph: span annotation store CLI
///
/// Manage span-anchored annotations on manifestations and infer how texts
/// relate to each other.
#[derive(Parser)]
#[command(name = "spangraph", version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database. Without it the store is in-memory and
    /// discarded on exit.
    #[arg(long, env = "SPANGRAPH_DB", value_name = "PATH", global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create every bibliography, note, and segmentation type node that is
    /// missing.
    Seed,

    /// Create a manifestation node.
    AddManifestation { id: String },

    /// Create an expression node.
    AddExpression { id: String },

    /// Record that expression FROM is a translation of / commentary on TO.
    Link {
        from: String,
        #[arg(value_enum)]
        kind: LinkKind,
        to: String,
    },

    /// Bibliographic metadata (titles, colophons, incipits, ...).
    Bibliographic {
        #[command(subcommand)]
        action: Action,
    },

    /// Editorial notes.
    Notes {
        #[command(subcommand)]
        action: Action,
    },

    /// Segmentation and alignment segments.
    Segmentation {
        #[command(subcommand)]
        action: Action,
    },

    /// Volume and page layout.
    Pagination {
        #[command(subcommand)]
        action: Action,
    },

    /// Delete every annotation of every kind on a manifestation.
    Purge { manifestation: String },

    /// Group every expression reachable from ID by its relation to ID.
    Infer {
        id: String,

        /// Print each reached expression with its classification instead of
        /// the grouped view.
        #[arg(long)]
        dict: bool,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Print one annotation.
    Get { id: String },

    /// Print every annotation on a manifestation, in text order.
    List {
        manifestation: String,

        /// Only annotations linked to this type, e.g. `title` or `alignment`.
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        type_filter: Option<String>,
    },

    /// Create annotations from JSON and print their IDs.
    ///
    /// Pass `-` as FILE to read from stdin.
    Add {
        manifestation: String,
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Delete one annotation and everything it owns.
    Delete { id: String },

    /// Delete every annotation of this kind on a manifestation.
    DeleteAll { manifestation: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum LinkKind {
    TranslationOf,
    CommentaryOf,
}

impl From<LinkKind> for EdgeType {
    fn from(kind: LinkKind) -> Self {
        match kind {
            LinkKind::TranslationOf => EdgeType::TranslationOf,
            LinkKind::CommentaryOf => EdgeType::CommentaryOf,
        }
    }
}

/// Log filter used when `RUST_LOG` is unset. The binary's own events are
/// under the `spangraph` target.
const DEFAULT_LOG_FILTER: &str = "spangraph_store=info,spangraph=info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env();
    if cli.db.is_some() {
        config.db_path = cli.db;
    }

    let provider = open_provider(&config).unwrap_or_else(|e| fatal(&e.to_string()));
    tracing::debug!(
        retries = config.retry.max_retries,
        backoff_ms = u64::try_from(config.retry.backoff.as_millis()).unwrap_or(u64::MAX),
        "store opened"
    );

    if let Err(e) = run(provider, cli.command).await {
        eprintln!("spangraph: {e}");
        let code = match e {
            StoreError::NotFound(_) | StoreError::Invalid(_) | StoreError::Conflict(_) => 1,
            _ => 2,
        };
        process::exit(code);
    }
}

async fn run(provider: Arc<dyn GraphProvider>, command: Command) -> Result<(), StoreError> {
    let repos = Repositories::new(Arc::clone(&provider));

    match command {
        Command::Seed => {
            let created = schema::seed_enum_nodes(provider.as_ref())?;
            print_json(&json!({ "created": created }));
        }

        Command::AddManifestation { id } => {
            schema::create_manifestation(provider.as_ref(), &id)?;
            tracing::info!(%id, "created manifestation");
            print_json(&json!({ "id": id }));
        }

        Command::AddExpression { id } => {
            schema::create_expression(provider.as_ref(), &id)?;
            tracing::info!(%id, "created expression");
            print_json(&json!({ "id": id }));
        }

        Command::Link { from, kind, to } => {
            let edge_type = EdgeType::from(kind);
            schema::link_expressions(provider.as_ref(), &from, edge_type, &to)?;
            tracing::info!(%from, %to, edge = %edge_type, "linked expressions");
            print_json(&json!({ "from": from, "type": edge_type, "to": to }));
        }

        Command::Bibliographic { action } => run_action(&repos.bibliographic, action).await?,
        Command::Notes { action } => run_action(&repos.notes, action).await?,
        Command::Segmentation { action } => run_action(&repos.segmentation, action).await?,
        Command::Pagination { action } => run_action(&repos.pagination, action).await?,

        Command::Purge { manifestation } => {
            let removed = repos.purge_manifestation(&manifestation).await?;
            print_json(&json!({ "removed": removed }));
        }

        Command::Infer { id, dict } => {
            tracing::debug!(root = %id, dict, "inferring relationships");
            let service = RelationshipService::new(provider);
            if dict {
                let dict = service.relation_dict(&id).await?;
                let entries: Vec<_> = dict
                    .iter()
                    .map(|(id, class)| json!({ "id": id, "classification": class }))
                    .collect();
                print_json(&entries);
            } else {
                print_json(&service.infer(&id).await?);
            }
        }
    }
    Ok(())
}

/// Run one repository action for annotation kind `K`.
async fn run_action<K>(repo: &SpanAnnotationRepository<K>, action: Action) -> Result<(), StoreError>
where
    K: AnnotationKind,
    K::Input: DeserializeOwned,
    K::Output: Serialize,
{
    match action {
        Action::Get { id } => print_json(&repo.get(&id).await?),
        Action::List {
            manifestation,
            type_filter,
        } => print_json(&repo.get_all(&manifestation, type_filter.as_deref()).await?),
        Action::Add {
            manifestation,
            file,
        } => {
            let items = parse_items::<K::Input>(&read_input(&file));
            print_json(&repo.add(&manifestation, items).await?);
        }
        Action::Delete { id } => {
            let deleted = repo.delete(&id).await?;
            print_json(&json!({ "deleted": deleted }));
        }
        Action::DeleteAll { manifestation } => {
            let removed = repo.delete_all(&manifestation).await?;
            print_json(&json!({ "removed": removed }));
        }
    }
    Ok(())
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &PathBuf) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", path.display())))
    }
}

/// Parse a JSON string as either an array of items or a single item.
fn parse_items<T: DeserializeOwned>(json: &str) -> Vec<T> {
    if let Ok(items) = serde_json::from_str::<Vec<T>>(json) {
        if items.is_empty() {
            fatal("input contains an empty array; nothing to add");
        }
        return items;
    }
    match serde_json::from_str::<T>(json) {
        Ok(item) => vec![item],
        Err(e) => fatal(&format!("failed to parse input: {e}")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fatal(&format!("failed to encode output: {e}")),
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("spangraph: {msg}");
    process::exit(2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use spangraph::{BibliographicInput, BibliographyType, PaginationInput};

    #[test]
    fn default_log_filter_covers_this_binary() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        let own = format!("{}=", env!("CARGO_CRATE_NAME"));
        assert!(DEFAULT_LOG_FILTER.contains(&own), "{DEFAULT_LOG_FILTER}");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_annotation_actions() {
        let cli = Cli::try_parse_from([
            "spangraph",
            "--db",
            "store.db",
            "segmentation",
            "list",
            "M1",
            "--type",
            "alignment",
        ])
        .unwrap();
        assert_eq!(cli.db.as_deref(), Some("store.db"));
        match cli.command {
            Command::Segmentation {
                action:
                    Action::List {
                        manifestation,
                        type_filter,
                    },
            } => {
                assert_eq!(manifestation, "M1");
                assert_eq!(type_filter.as_deref(), Some("alignment"));
            }
            _ => panic!("expected segmentation list"),
        }
    }

    #[test]
    fn link_kind_maps_to_edge_type() {
        let cli = Cli::try_parse_from(["spangraph", "link", "E1", "commentary-of", "E2"]).unwrap();
        match cli.command {
            Command::Link { kind, .. } => {
                assert_eq!(EdgeType::from(kind), EdgeType::CommentaryOf)
            }
            _ => panic!("expected link"),
        }
    }

    #[test]
    fn parse_items_accepts_object_or_array() {
        let one: Vec<BibliographicInput> =
            parse_items(r#"{"type": "title", "span": {"start": 0, "end": 4}}"#);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].bibliography_type, BibliographyType::Title);

        let many: Vec<PaginationInput> = parse_items(
            r#"[{"volume": {"index": 1, "pages": [{"reference": "1a", "lines": [{"start": 0, "end": 9}]}]}}]"#,
        );
        assert_eq!(many[0].volume.pages[0].reference, "1a");
    }
}
