//! # eperm
//!
//! Evidence-path reasoning over knowledge graphs: answer a natural-language
//! question by extracting the relevant subgraph, ranking reasoning paths through
//! it, and predicting an answer from the best paths.
//!
//! ## Architecture
//!
//! - **Knowledge graph** (`graph`): petgraph-indexed entity/relation store with
//!   bounded k-hop extraction and path enumeration
//! - **Retrieval** (`retrieve`): question mentions → seed entities → subgraph
//! - **Evidence** (`evidence`): heuristic or model-assisted path scoring
//! - **Prediction** (`predict`): direct extraction or model-generated answers
//! - **Batch** (`batch`): parallel per-item evidence, combined model requests,
//!   checkpointed dataset runs
//! - **Text completion** (`llm`): OpenAI-compatible client, response cache,
//!   tolerant JSON extraction
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use eperm::config::EpermConfig;
//! use eperm::graph::{Entity, EntityNames, KnowledgeGraph, Relation};
//! use eperm::orchestrator::Orchestrator;
//!
//! let mut kg = KnowledgeGraph::new();
//! kg.add_entity(Entity::new("Ada", "Ada"));
//! kg.add_entity(Entity::new("Co1", "Co1"));
//! kg.add_relation(Relation::new("Ada", "founded", "Co1"));
//!
//! let pipeline = Orchestrator::new(EpermConfig::default(), kg, Arc::new(EntityNames::new()), None).unwrap();
//! let answer = pipeline.answer_question("Who founded Co1?").unwrap();
//! println!("{} ({:.2})", answer.answer, answer.confidence);
//! ```

pub mod batch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evidence;
pub mod graph;
pub mod llm;
pub mod orchestrator;
pub mod predict;
pub mod retrieve;

pub use error::{EpermError, EpermResult};
pub use orchestrator::Orchestrator;
