//! Relationship inference over graphs built through the store.

use std::sync::Arc;

use spangraph::{Classification, EdgeType, Relation};
use spangraph_store::schema;
use spangraph_store::{GraphProvider, MemoryGraph, RelationshipService, SqliteGraph, StoreError};

fn backends() -> Vec<(&'static str, Arc<dyn GraphProvider>)> {
    vec![
        ("memory", Arc::new(MemoryGraph::new())),
        ("sqlite", Arc::new(SqliteGraph::open_in_memory().unwrap())),
    ]
}

fn lineage(provider: &Arc<dyn GraphProvider>, ids: &[&str], links: &[(&str, EdgeType, &str)]) {
    for id in ids {
        schema::create_expression(provider.as_ref(), id).unwrap();
    }
    for (from, edge_type, to) in links {
        schema::link_expressions(provider.as_ref(), from, *edge_type, to).unwrap();
    }
}

#[tokio::test]
async fn translation_then_commentary_root() {
    for (name, provider) in backends() {
        // E1 translates E2; E2 comments on E3.
        lineage(
            &provider,
            &["E1", "E2", "E3"],
            &[
                ("E1", EdgeType::TranslationOf, "E2"),
                ("E2", EdgeType::CommentaryOf, "E3"),
            ],
        );
        let service = RelationshipService::new(Arc::clone(&provider));

        let dict = service.relation_dict("E1").await.unwrap();
        assert_eq!(dict.get("E1"), Some(Classification::Origin), "{name}");
        assert_eq!(
            dict.get("E2"),
            Some(Classification::Related(Relation::Translation)),
            "{name}"
        );
        assert_eq!(
            dict.get("E3"),
            Some(Classification::Related(Relation::SiblingRoot)),
            "{name}"
        );

        let groups = service.infer("E1").await.unwrap();
        assert_eq!(groups.len(), 2, "{name}");
        assert_eq!(groups[&Relation::Translation], vec!["E2".to_string()]);
        assert_eq!(groups[&Relation::SiblingRoot], vec!["E3".to_string()]);
    }
}

#[tokio::test]
async fn commentary_seen_from_the_commented_text() {
    for (name, provider) in backends() {
        // C1 and C2 both comment on R.
        lineage(
            &provider,
            &["R", "C1", "C2"],
            &[
                ("C1", EdgeType::CommentaryOf, "R"),
                ("C2", EdgeType::CommentaryOf, "R"),
            ],
        );
        let service = RelationshipService::new(Arc::clone(&provider));

        let from_root = service.infer("R").await.unwrap();
        assert_eq!(
            from_root[&Relation::Commentary],
            vec!["C1".to_string(), "C2".to_string()],
            "{name}"
        );

        let from_commentary = service.infer("C1").await.unwrap();
        assert_eq!(from_commentary[&Relation::Root], vec!["R".to_string()], "{name}");
        assert_eq!(
            from_commentary[&Relation::SiblingCommentary],
            vec!["C2".to_string()],
            "{name}"
        );
    }
}

#[tokio::test]
async fn cyclic_lineage_terminates() {
    for (name, provider) in backends() {
        lineage(
            &provider,
            &["E1", "E2", "E3"],
            &[
                ("E1", EdgeType::TranslationOf, "E2"),
                ("E2", EdgeType::TranslationOf, "E3"),
                ("E3", EdgeType::TranslationOf, "E1"),
            ],
        );
        let service = RelationshipService::new(Arc::clone(&provider));

        let dict = service.relation_dict("E1").await.unwrap();
        assert_eq!(dict.len(), 3, "{name}");
        let groups = service.infer("E1").await.unwrap();
        assert_eq!(
            groups[&Relation::Translation],
            vec!["E2".to_string(), "E3".to_string()],
            "{name}"
        );
    }
}

#[tokio::test]
async fn unknown_expression_is_not_found() {
    for (name, provider) in backends() {
        lineage(&provider, &["E1"], &[]);
        let service = RelationshipService::new(Arc::clone(&provider));

        let err = service.infer("E_missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "{name}: {err}");
        assert!(service.infer("E1").await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn neighbour_of_unclassified_expression_takes_primitive() {
    for (name, provider) in backends() {
        // E1 comments on E2, E3 comments on E2 and on E4, E5 translates E4.
        // E4 is reached over SIBLING_COMMENTARY then ROOT, which has no
        // composition.
        lineage(
            &provider,
            &["E1", "E2", "E3", "E4", "E5"],
            &[
                ("E1", EdgeType::CommentaryOf, "E2"),
                ("E3", EdgeType::CommentaryOf, "E2"),
                ("E3", EdgeType::CommentaryOf, "E4"),
                ("E5", EdgeType::TranslationOf, "E4"),
            ],
        );
        let service = RelationshipService::new(Arc::clone(&provider));

        let dict = service.relation_dict("E1").await.unwrap();
        assert_eq!(
            dict.get("E3"),
            Some(Classification::Related(Relation::SiblingCommentary)),
            "{name}"
        );
        assert_eq!(dict.get("E4"), Some(Classification::Unclassified), "{name}");
        assert_eq!(
            dict.get("E5"),
            Some(Classification::Related(Relation::Translation)),
            "{name}"
        );

        let groups = service.infer("E1").await.unwrap();
        assert_eq!(groups[&Relation::Translation], vec!["E5".to_string()], "{name}");
        assert!(groups.values().all(|ids| !ids.contains(&"E4".to_string())), "{name}");
    }
}
