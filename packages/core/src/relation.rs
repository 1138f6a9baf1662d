//! Relationship inference between expressions.
//!
//! Expressions (original works, translations, commentaries) are linked by
//! `TRANSLATION_OF` and `COMMENTARY_OF` edges. Given a root expression,
//! [`infer_relationships`] labels every reachable expression relative to the
//! root by walking an [`AdjacencyMap`] breadth-first and composing the
//! single-hop [`Primitive`] of each edge with the relation already known for
//! the node it was reached from.
//!
//! ```text
//!   E1 --TRANSLATION_OF-- E2 --COMMENTARY_OF--> E3
//!
//!   from E1:  E2 = TRANSLATION            (primitive)
//!             E3 = TRANSLATION + ROOT     (composed) = SIBLING_ROOT
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Adjacency input
// ---------------------------------------------------------------------------

/// The lineage edge types the engine understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    TranslationOf,
    CommentaryOf,
}

impl EdgeType {
    pub const ALL: &'static [EdgeType] = &[EdgeType::TranslationOf, EdgeType::CommentaryOf];

    /// The graph relationship type name, e.g. `"TRANSLATION_OF"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::TranslationOf => "TRANSLATION_OF",
            EdgeType::CommentaryOf => "COMMENTARY_OF",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way an edge points relative to the expression whose adjacency list
/// holds it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// The edge points into this expression.
    In,
    /// The edge points from this expression to the other one.
    #[default]
    Out,
}

/// One entry of an expression's adjacency list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Adjacency {
    #[serde(alias = "other")]
    pub other_id: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub direction: EdgeDirection,
}

impl Adjacency {
    pub fn new(other_id: impl Into<String>, edge_type: EdgeType, direction: EdgeDirection) -> Self {
        Self {
            other_id: other_id.into(),
            edge_type,
            direction,
        }
    }

    /// The single-hop relation this edge contributes.
    ///
    /// `TRANSLATION_OF` is symmetric for inference purposes. For
    /// `COMMENTARY_OF`, an incoming edge means the other expression comments
    /// on this one; an outgoing edge means the other expression is the root
    /// text this one comments on.
    pub fn primitive(&self) -> Primitive {
        match (self.edge_type, self.direction) {
            (EdgeType::TranslationOf, _) => Primitive::Translation,
            (EdgeType::CommentaryOf, EdgeDirection::In) => Primitive::Commentary,
            (EdgeType::CommentaryOf, EdgeDirection::Out) => Primitive::Root,
        }
    }
}

/// `expression_id -> adjacency list`. An expression with no edges still has
/// an (empty) entry.
pub type AdjacencyMap = HashMap<String, Vec<Adjacency>>;

// ---------------------------------------------------------------------------
// Relations and composition
// ---------------------------------------------------------------------------

/// A single-hop relation derived from one edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Primitive {
    Translation,
    Commentary,
    Root,
}

/// The relation of an expression to the root of an inference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    Root,
    Translation,
    Commentary,
    SiblingRoot,
    SiblingCommentary,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Root => "ROOT",
            Relation::Translation => "TRANSLATION",
            Relation::Commentary => "COMMENTARY",
            Relation::SiblingRoot => "SIBLING_ROOT",
            Relation::SiblingCommentary => "SIBLING_COMMENTARY",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Primitive> for Relation {
    fn from(p: Primitive) -> Self {
        match p {
            Primitive::Translation => Relation::Translation,
            Primitive::Commentary => Relation::Commentary,
            Primitive::Root => Relation::Root,
        }
    }
}

/// Result of looking a `(relation, primitive)` pair up in the composition
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    Composed(Relation),
    /// The table has no entry for this pair.
    Uncovered,
}

/// Compose the relation already known for a node with the primitive of an
/// edge leaving it, yielding the neighbour's relation to the root.
pub fn compose(pre: Relation, primitive: Primitive) -> Composition {
    use Composition::{Composed, Uncovered};
    use Primitive as P;
    use Relation as R;

    match (pre, primitive) {
        (R::Root, P::Root) => Composed(R::SiblingRoot),
        (R::Root, P::Translation) => Composed(R::Root),
        (R::Root, P::Commentary) => Composed(R::SiblingCommentary),

        (R::Translation, P::Translation) => Composed(R::Translation),
        (R::Translation, P::Root) => Composed(R::SiblingRoot),
        (R::Translation, P::Commentary) => Composed(R::Commentary),

        (R::Commentary, P::Translation) => Composed(R::Commentary),
        (R::Commentary, P::Root) => Composed(R::SiblingCommentary),
        (R::Commentary, P::Commentary) => Composed(R::SiblingCommentary),

        (R::SiblingRoot, P::Translation) => Composed(R::SiblingRoot),
        (R::SiblingRoot, P::Root) => Composed(R::SiblingRoot),
        (R::SiblingRoot, P::Commentary) => Composed(R::SiblingCommentary),

        (R::SiblingCommentary, P::Translation) => Composed(R::SiblingCommentary),
        (R::SiblingCommentary, P::Commentary) => Composed(R::SiblingCommentary),
        (R::SiblingCommentary, P::Root) => Uncovered,
    }
}

/// What the traversal learned about one visited expression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "relation")]
pub enum Classification {
    /// The expression the inference started from.
    Origin,
    Related(Relation),
    /// Reached over an uncovered composition. Its own neighbours take their
    /// primitive relation directly, as the origin's do.
    Unclassified,
}

impl Classification {
    /// Classification of a neighbour reached from `self` over `primitive`.
    /// With no relation to compose with, the primitive stands on its own.
    fn reach(self, primitive: Primitive) -> Classification {
        match self {
            Classification::Related(pre) => match compose(pre, primitive) {
                Composition::Composed(r) => Classification::Related(r),
                Composition::Uncovered => Classification::Unclassified,
            },
            Classification::Origin | Classification::Unclassified => {
                Classification::Related(primitive.into())
            }
        }
    }

    pub fn relation(&self) -> Option<Relation> {
        match self {
            Classification::Related(r) => Some(*r),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelationError {
    #[error("expression {0:?} is not in the adjacency map")]
    UnknownExpression(String),
}

/// Every expression visited by one inference, in discovery order, with its
/// classification. The root comes first.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDict {
    entries: Vec<(String, Classification)>,
}

impl RelationDict {
    pub fn get(&self, id: &str) -> Option<Classification> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Classification)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }

    /// Invert into `relation -> [expression_id]`, dropping the root and
    /// unclassified expressions.
    pub fn into_groups(self) -> RelationGroups {
        let mut groups = RelationGroups::new();
        for (id, class) in self.entries {
            if let Some(rel) = class.relation() {
                groups.entry(rel).or_default().push(id);
            }
        }
        groups
    }
}

/// `relation -> expression ids`, ids in discovery order.
pub type RelationGroups = BTreeMap<Relation, Vec<String>>;

/// Classify every expression reachable from `root`.
///
/// Each expression is classified the first time it is discovered and never
/// again; each is expanded at most once, so cycles terminate.
pub fn infer_relation_dict(
    map: &AdjacencyMap,
    root: &str,
) -> Result<RelationDict, RelationError> {
    if !map.contains_key(root) {
        return Err(RelationError::UnknownExpression(root.to_string()));
    }

    let mut classified: HashMap<&str, Classification> = HashMap::new();
    let mut explored: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut entries: Vec<(String, Classification)> = Vec::new();

    classified.insert(root, Classification::Origin);
    entries.push((root.to_string(), Classification::Origin));
    queue.push_back(root);

    while let Some(current) = queue.pop_front() {
        if !explored.insert(current) {
            continue;
        }
        let pre = classified[current];
        let Some(adjacent) = map.get(current) else {
            continue;
        };
        for adj in adjacent {
            let other = adj.other_id.as_str();
            if classified.contains_key(other) {
                continue;
            }
            let class = pre.reach(adj.primitive());
            classified.insert(other, class);
            entries.push((other.to_string(), class));
            queue.push_back(other);
        }
    }

    Ok(RelationDict { entries })
}

/// Group every expression reachable from `root` by its relation to `root`.
pub fn infer_relationships(
    map: &AdjacencyMap,
    root: &str,
) -> Result<RelationGroups, RelationError> {
    infer_relation_dict(map, root).map(RelationDict::into_groups)
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(other: &str, edge_type: EdgeType, direction: EdgeDirection) -> Adjacency {
        Adjacency::new(other, edge_type, direction)
    }

    fn map(entries: Vec<(&str, Vec<Adjacency>)>) -> AdjacencyMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    use EdgeDirection::{In, Out};
    use EdgeType::{CommentaryOf, TranslationOf};

    #[test]
    fn translation_then_root_is_sibling_root() {
        let m = map(vec![
            ("E1", vec![adj("E2", TranslationOf, Out)]),
            (
                "E2",
                vec![adj("E1", TranslationOf, In), adj("E3", CommentaryOf, Out)],
            ),
            ("E3", vec![adj("E2", CommentaryOf, In)]),
        ]);

        let dict = infer_relation_dict(&m, "E1").unwrap();
        assert_eq!(dict.get("E1"), Some(Classification::Origin));
        assert_eq!(dict.get("E2"), Some(Classification::Related(Relation::Translation)));
        assert_eq!(dict.get("E3"), Some(Classification::Related(Relation::SiblingRoot)));

        let groups = dict.into_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&Relation::Translation], vec!["E2".to_string()]);
        assert_eq!(groups[&Relation::SiblingRoot], vec!["E3".to_string()]);
    }

    #[test]
    fn cycle_terminates_and_classifies_once() {
        let m = map(vec![
            (
                "E1",
                vec![adj("E2", TranslationOf, Out), adj("E3", TranslationOf, In)],
            ),
            (
                "E2",
                vec![adj("E1", TranslationOf, In), adj("E3", TranslationOf, Out)],
            ),
            (
                "E3",
                vec![adj("E2", TranslationOf, In), adj("E1", TranslationOf, Out)],
            ),
        ]);

        let dict = infer_relation_dict(&m, "E1").unwrap();
        assert_eq!(dict.len(), 3);
        let groups = dict.into_groups();
        assert_eq!(
            groups[&Relation::Translation],
            vec!["E2".to_string(), "E3".to_string()]
        );
    }

    #[test]
    fn first_seen_classification_wins() {
        // E3 is reachable as a commentary of E1 directly, and as a root of E2
        // (a translation of E1). The direct edge is seen first.
        let m = map(vec![
            (
                "E1",
                vec![adj("E3", CommentaryOf, In), adj("E2", TranslationOf, Out)],
            ),
            ("E2", vec![adj("E3", CommentaryOf, Out)]),
            ("E3", vec![]),
        ]);
        let dict = infer_relation_dict(&m, "E1").unwrap();
        assert_eq!(dict.get("E3"), Some(Classification::Related(Relation::Commentary)));
    }

    #[test]
    fn commentary_direction_matters() {
        let m = map(vec![
            (
                "T",
                vec![adj("C", CommentaryOf, In), adj("R", CommentaryOf, Out)],
            ),
            ("C", vec![adj("T", CommentaryOf, Out)]),
            ("R", vec![adj("T", CommentaryOf, In)]),
        ]);
        let groups = infer_relationships(&m, "T").unwrap();
        assert_eq!(groups[&Relation::Commentary], vec!["C".to_string()]);
        assert_eq!(groups[&Relation::Root], vec!["R".to_string()]);
    }

    #[test]
    fn uncovered_pair_is_unclassified_but_its_neighbours_are_not() {
        // E1 -root-> E2 -commentary-> E3 makes E3 a SIBLING_COMMENTARY;
        // E3 -root-> E4 is the uncovered pair; E5 is a translation of E4.
        let m = map(vec![
            ("E1", vec![adj("E2", CommentaryOf, Out)]),
            (
                "E2",
                vec![adj("E1", CommentaryOf, In), adj("E3", CommentaryOf, In)],
            ),
            (
                "E3",
                vec![adj("E2", CommentaryOf, Out), adj("E4", CommentaryOf, Out)],
            ),
            ("E4", vec![adj("E5", TranslationOf, Out)]),
            ("E5", vec![]),
        ]);
        let dict = infer_relation_dict(&m, "E1").unwrap();
        assert_eq!(dict.get("E2"), Some(Classification::Related(Relation::Root)));
        assert_eq!(
            dict.get("E3"),
            Some(Classification::Related(Relation::SiblingCommentary))
        );
        assert_eq!(dict.get("E4"), Some(Classification::Unclassified));
        assert_eq!(
            dict.get("E5"),
            Some(Classification::Related(Relation::Translation))
        );

        let groups = dict.into_groups();
        let grouped: usize = groups.values().map(Vec::len).sum();
        assert_eq!(grouped, 3, "unclassified expressions are dropped");
        assert_eq!(groups[&Relation::Translation], vec!["E5".to_string()]);
    }

    #[test]
    fn unknown_root_is_an_error() {
        let m = map(vec![("E1", vec![])]);
        assert_eq!(
            infer_relationships(&m, "E_missing"),
            Err(RelationError::UnknownExpression("E_missing".into()))
        );
    }

    #[test]
    fn isolated_root_has_no_groups() {
        let m = map(vec![("E1", vec![])]);
        assert!(infer_relationships(&m, "E1").unwrap().is_empty());
    }

    #[test]
    fn only_sibling_commentary_root_is_uncovered() {
        let relations = [
            Relation::Root,
            Relation::Translation,
            Relation::Commentary,
            Relation::SiblingRoot,
            Relation::SiblingCommentary,
        ];
        let primitives = [Primitive::Translation, Primitive::Commentary, Primitive::Root];
        let uncovered: Vec<_> = relations
            .iter()
            .flat_map(|r| primitives.iter().map(move |p| (*r, *p)))
            .filter(|(r, p)| compose(*r, *p) == Composition::Uncovered)
            .collect();
        assert_eq!(uncovered, vec![(Relation::SiblingCommentary, Primitive::Root)]);
    }

    #[test]
    fn adjacency_map_deserialises_with_default_direction() {
        let json = r#"{
            "E1": [{"other": "E2", "type": "TRANSLATION_OF"}],
            "E2": [{"other_id": "E1", "type": "TRANSLATION_OF", "direction": "in"}]
        }"#;
        let m: AdjacencyMap = serde_json::from_str(json).unwrap();
        assert_eq!(m["E1"][0].direction, EdgeDirection::Out);
        assert_eq!(m["E2"][0].direction, EdgeDirection::In);
    }

    #[test]
    fn groups_serialise_with_wire_labels() {
        let mut groups = RelationGroups::new();
        groups.insert(Relation::SiblingRoot, vec!["E3".into()]);
        let json = serde_json::to_string(&groups).unwrap();
        assert_eq!(json, r#"{"SIBLING_ROOT":["E3"]}"#);
    }
}
