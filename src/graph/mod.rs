//! Knowledge graph: entity/relation store with adjacency indices.
//!
//! - **Store** ([`KnowledgeGraph`]): entities by id, relations in insertion order,
//!   a `petgraph` adjacency layer for subject/object lookups and a predicate index
//! - **Traversal** ([`traverse`]): bounded k-hop extraction and simple-path enumeration
//! - **Exchange** ([`io`]): lossless JSON document round trip
//! - **Display names** ([`names`]): optional id → human-readable name context
//!
//! All traversal orders are derived from insertion order so that identical inputs
//! always produce identical subgraphs and paths.

pub mod index;
pub mod io;
pub mod names;
pub mod traverse;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use index::KnowledgeGraph;
pub use names::EntityNames;

/// Free-form attribute map attached to entities and relations.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// A node of the knowledge graph. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier (e.g. a KB id like `m.06f7lp` or a plain name).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Entity type label.
    #[serde(rename = "type", default = "default_entity_type")]
    pub kind: String,
    /// Arbitrary attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

fn default_entity_type() -> String {
    "Entity".into()
}

impl Entity {
    /// Create an entity with the default `Entity` type and no attributes.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: default_entity_type(),
            attributes: Attributes::new(),
        }
    }

    /// Set the entity type.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Add one attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// A typed, weighted, directed edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Head (subject) entity id.
    pub head: String,
    /// Relation type, e.g. `founded` or `people.person.place_of_birth`.
    pub relation: String,
    /// Tail (object) entity id.
    pub tail: String,
    /// Edge weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Arbitrary attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

fn default_weight() -> f64 {
    1.0
}

impl Relation {
    /// Create a relation with weight 1.0 and no attributes.
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
            weight: default_weight(),
            attributes: Attributes::new(),
        }
    }

    /// Set the edge weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// The bare `(head, relation, tail)` triple of this edge.
    pub fn as_triple(&self) -> Triple {
        Triple {
            head: self.head.clone(),
            relation: self.relation.clone(),
            tail: self.tail.clone(),
        }
    }
}

/// One hop of a reasoning path: `(head, relation, tail)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub head: String,
    pub relation: String,
    pub tail: String,
}

impl Triple {
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
        }
    }
}

/// Edge direction for neighbour queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow outgoing edges (id is the head).
    Out,
    /// Follow incoming edges (id is the tail).
    In,
    /// Both directions.
    #[default]
    Both,
}

/// Summary counts of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub num_entities: usize,
    pub num_relations: usize,
    pub num_entity_types: usize,
    pub num_relation_types: usize,
}

/// Shorten a dotted relation path to its most specific segment.
///
/// `location.location.containedby` → `containedby`.
pub fn short_relation_name(relation: &str) -> &str {
    if relation.is_empty() {
        return "unknown_relation";
    }
    relation.rsplit('.').next().unwrap_or(relation)
}
