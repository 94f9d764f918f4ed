//! JSON exchange format for knowledge graphs.
//!
//! `{"entities": [{id, name, type, attributes}], "relations": [{head, relation, tail, weight, attributes}]}`
//!
//! The round trip is lossless: entity order, relation order, weights and attributes
//! survive `to_document` → `from_document`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

use super::index::KnowledgeGraph;
use super::{Entity, Relation};

/// Serializable snapshot of a [`KnowledgeGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Serialize for KnowledgeGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KnowledgeGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        GraphDocument::deserialize(deserializer).map(Self::from_document)
    }
}

impl KnowledgeGraph {
    /// Snapshot the graph as a serializable document.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            entities: self.entities().to_vec(),
            relations: self.relations().to_vec(),
        }
    }

    /// Build a graph from a document. Entities are added before relations.
    pub fn from_document(document: GraphDocument) -> Self {
        let mut kg = Self::new();
        for entity in document.entities {
            kg.add_entity(entity);
        }
        for relation in document.relations {
            kg.add_relation(relation);
        }
        kg
    }

    /// Build a graph from a JSON value in the document format.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, GraphError> {
        let document: GraphDocument =
            serde_json::from_value(value).map_err(|e| GraphError::Parse {
                path: "<inline>".into(),
                message: e.to_string(),
            })?;
        Ok(Self::from_document(document))
    }

    /// Load a graph from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let document: GraphDocument =
            serde_json::from_str(&text).map_err(|e| GraphError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let kg = Self::from_document(document);
        tracing::info!(
            path = %path.display(),
            entities = kg.len(),
            relations = kg.relation_count(),
            "loaded knowledge graph"
        );
        Ok(kg)
    }

    /// Save the graph as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<(), GraphError> {
        let text = serde_json::to_string_pretty(&self.to_document()).map_err(|e| {
            GraphError::Serialize {
                message: e.to_string(),
            }
        })?;
        std::fs::write(path, text).map_err(|e| GraphError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        kg.add_entity(
            Entity::new("m.01", "Ada")
                .with_kind("Person")
                .with_attribute("born", serde_json::json!(1815)),
        );
        kg.add_entity(Entity::new("m.02", "Co1").with_kind("Company"));
        kg.add_relation(Relation::new("m.01", "founded", "m.02").with_weight(0.8));
        kg
    }

    #[test]
    fn document_round_trip_preserves_stats() {
        let kg = sample();
        let back = KnowledgeGraph::from_document(kg.to_document());
        assert_eq!(back.stats(), kg.stats());
        assert_eq!(back.to_document(), kg.to_document());
    }

    #[test]
    fn json_value_uses_expected_keys() {
        let value = serde_json::to_value(sample().to_document()).unwrap();
        assert_eq!(value["entities"][0]["type"], "Person");
        assert_eq!(value["relations"][0]["weight"], 0.8);

        let back = KnowledgeGraph::from_json_value(value).unwrap();
        assert_eq!(back.relation_count(), 1);
    }

    #[test]
    fn graph_serializes_as_its_document() {
        let kg = sample();
        let text = serde_json::to_string(&kg).unwrap();
        let back: KnowledgeGraph = serde_json::from_str(&text).unwrap();
        assert_eq!(back.to_document(), kg.to_document());
    }

    #[test]
    fn malformed_value_is_a_parse_error() {
        let err = KnowledgeGraph::from_json_value(serde_json::json!({"entities": 3})).unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = KnowledgeGraph::load_json(Path::new("/nonexistent/kg.json")).unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }
}
