//! In-memory knowledge graph with adjacency indices.
//!
//! Uses `petgraph` for the subject/object adjacency structure and a secondary
//! `HashMap` index for predicate lookups. Edges carry the position of their
//! relation in the insertion-ordered relation list, which is what every
//! deterministic ordering in this crate is derived from.

use std::collections::{HashMap, HashSet};

use petgraph::Direction as PgDirection;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::{Direction, Entity, EntityNames, GraphStats, Relation};

/// Knowledge graph: entities keyed by id, relations in insertion order.
///
/// Entities keep their first insertion position; re-adding an id replaces the
/// stored entity in place (last write wins). Relations may reference ids that
/// have no entity record; such endpoints still exist as adjacency nodes.
#[derive(Clone)]
pub struct KnowledgeGraph {
    /// Entities in first-insertion order.
    entities: Vec<Entity>,
    /// Entity id → position in `entities`.
    entity_pos: HashMap<String, usize>,
    /// Relations in insertion order.
    relations: Vec<Relation>,
    /// Adjacency: nodes are ids, edge weights are indices into `relations`.
    graph: DiGraph<String, usize>,
    /// Id → NodeIndex mapping for O(1) node lookups.
    node_index: HashMap<String, NodeIndex>,
    /// Predicate → relation indices.
    predicate_index: HashMap<String, Vec<usize>>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            entity_pos: HashMap::new(),
            relations: Vec::new(),
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            predicate_index: HashMap::new(),
        }
    }

    /// Ensure an adjacency node exists for the given id, returning its NodeIndex.
    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.node_index.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.node_index.insert(id.to_string(), idx);
        idx
    }

    /// Insert or replace an entity.
    pub fn add_entity(&mut self, entity: Entity) {
        self.ensure_node(&entity.id);
        match self.entity_pos.get(&entity.id) {
            Some(&pos) => self.entities[pos] = entity,
            None => {
                self.entity_pos
                    .insert(entity.id.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    /// Append a relation and update every adjacency index.
    pub fn add_relation(&mut self, relation: Relation) {
        let head = self.ensure_node(&relation.head);
        let tail = self.ensure_node(&relation.tail);
        let position = self.relations.len();

        self.graph.add_edge(head, tail, position);
        self.predicate_index
            .entry(relation.relation.clone())
            .or_default()
            .push(position);
        self.relations.push(relation);
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entity_pos.get(id).map(|&pos| &self.entities[pos])
    }

    /// Whether an entity record exists for `id`.
    pub fn contains_entity(&self, id: &str) -> bool {
        self.entity_pos.contains_key(id)
    }

    /// Whether `id` takes part in the adjacency structure (entity or relation endpoint).
    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// All relations in insertion order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the graph holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Find entities whose name contains `name`, case-insensitively, in insertion order.
    pub fn entities_by_name(&self, name: &str) -> Vec<&Entity> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return vec![];
        }
        self.entities
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Relation indices touching `id` in the given petgraph direction, ascending.
    pub(super) fn edge_positions(&self, id: &str, direction: PgDirection) -> Vec<usize> {
        let Some(&idx) = self.node_index.get(id) else {
            return vec![];
        };
        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| *e.weight())
            .collect();
        positions.sort_unstable();
        positions
    }

    /// Relation at an insertion position.
    pub(super) fn relation_at(&self, position: usize) -> &Relation {
        &self.relations[position]
    }

    /// Relations whose head is `id`, in insertion order.
    pub fn relations_from(&self, id: &str) -> Vec<&Relation> {
        self.edge_positions(id, PgDirection::Outgoing)
            .into_iter()
            .map(|p| &self.relations[p])
            .collect()
    }

    /// Relations whose tail is `id`, in insertion order.
    pub fn relations_to(&self, id: &str) -> Vec<&Relation> {
        self.edge_positions(id, PgDirection::Incoming)
            .into_iter()
            .map(|p| &self.relations[p])
            .collect()
    }

    /// Relations with the given predicate, in insertion order.
    pub fn relations_for_predicate(&self, predicate: &str) -> Vec<&Relation> {
        self.predicate_index
            .get(predicate)
            .map(|positions| positions.iter().map(|&p| &self.relations[p]).collect())
            .unwrap_or_default()
    }

    /// Relations from `head` to `tail`, earliest inserted first.
    pub fn relations_between(&self, head: &str, tail: &str) -> Vec<&Relation> {
        let (Some(&h), Some(&t)) = (self.node_index.get(head), self.node_index.get(tail)) else {
            return vec![];
        };
        let mut positions: Vec<usize> = self
            .graph
            .edges_connecting(h, t)
            .map(|e| *e.weight())
            .collect();
        positions.sort_unstable();
        positions.into_iter().map(|p| &self.relations[p]).collect()
    }

    /// Distinct neighbour ids of `id`.
    ///
    /// Ordered by the earliest relation connecting each neighbour; self-loops are
    /// ignored. Unknown ids yield an empty list.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let mut linked: Vec<(usize, &str)> = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            for p in self.edge_positions(id, PgDirection::Outgoing) {
                linked.push((p, self.relations[p].tail.as_str()));
            }
        }
        if matches!(direction, Direction::In | Direction::Both) {
            for p in self.edge_positions(id, PgDirection::Incoming) {
                linked.push((p, self.relations[p].head.as_str()));
            }
        }
        linked.sort_by_key(|(p, _)| *p);

        let mut seen: HashSet<&str> = HashSet::new();
        linked
            .into_iter()
            .filter(|(_, n)| *n != id && seen.insert(*n))
            .map(|(_, n)| n.to_string())
            .collect()
    }

    /// Distinct in-neighbours plus distinct out-neighbours of `id`.
    pub fn degree(&self, id: &str) -> usize {
        self.neighbors(id, Direction::Out).len() + self.neighbors(id, Direction::In).len()
    }

    /// Degree of every entity, keyed by id.
    pub fn degrees(&self) -> HashMap<String, usize> {
        self.entities
            .iter()
            .map(|e| (e.id.clone(), self.degree(&e.id)))
            .collect()
    }

    /// Summary counts.
    pub fn stats(&self) -> GraphStats {
        let entity_types: HashSet<&str> = self.entities.iter().map(|e| e.kind.as_str()).collect();
        GraphStats {
            num_entities: self.entities.len(),
            num_relations: self.relations.len(),
            num_entity_types: entity_types.len(),
            num_relation_types: self.predicate_index.len(),
        }
    }

    /// Display name for an id: mapped name, then entity name, then the id itself.
    pub fn display_name<'a>(&'a self, id: &'a str, names: &'a EntityNames) -> &'a str {
        if let Some(mapped) = names.get(id) {
            return mapped;
        }
        match self.entity(id) {
            Some(e) if !e.name.is_empty() => &e.name,
            _ => id,
        }
    }

    /// Render entities and relations as the plain-text listing used in prompts.
    pub fn to_text(&self, names: &EntityNames) -> String {
        let mut lines = vec!["Entities:".to_string()];
        for entity in &self.entities {
            match names.get(&entity.id) {
                Some(mapped) if mapped != entity.name => lines.push(format!(
                    "  - {mapped} [kb_id: {}] ({})",
                    entity.id, entity.kind
                )),
                _ => lines.push(format!("  - {} ({})", entity.name, entity.kind)),
            }
        }

        lines.push(String::new());
        lines.push("Relations:".to_string());
        for relation in &self.relations {
            lines.push(format!(
                "  - {} --[{}]--> {}",
                self.display_name(&relation.head, names),
                relation.relation,
                self.display_name(&relation.tail, names)
            ));
        }
        lines.join("\n")
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("entities", &self.len())
            .field("relations", &self.relation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str) -> Entity {
        Entity::new(id, id).with_kind("Person")
    }

    fn founders() -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        kg.add_entity(person("Ada"));
        kg.add_entity(person("Bob"));
        kg.add_entity(Entity::new("Co1", "Co1").with_kind("Company"));
        kg.add_relation(Relation::new("Ada", "founded", "Co1"));
        kg.add_relation(Relation::new("Bob", "advises", "Co1"));
        kg
    }

    #[test]
    fn insert_and_query() {
        let kg = founders();
        assert_eq!(kg.len(), 3);
        assert_eq!(kg.relation_count(), 2);
        assert!(kg.has_node("Co1"));
        assert_eq!(kg.relations_from("Ada").len(), 1);
        assert_eq!(kg.relations_to("Co1").len(), 2);
        assert_eq!(kg.relations_for_predicate("founded")[0].head, "Ada");
    }

    #[test]
    fn readding_entity_overwrites_in_place() {
        let mut kg = founders();
        kg.add_entity(Entity::new("Ada", "Ada Lovelace"));
        assert_eq!(kg.len(), 3);
        assert_eq!(kg.entities()[0].name, "Ada Lovelace");
        assert_eq!(kg.entity("Ada").unwrap().kind, "Entity");
    }

    #[test]
    fn neighbors_follow_relation_insertion_order() {
        let mut kg = KnowledgeGraph::new();
        for id in ["a", "b", "c", "d"] {
            kg.add_entity(Entity::new(id, id));
        }
        kg.add_relation(Relation::new("c", "r", "a"));
        kg.add_relation(Relation::new("a", "r", "d"));
        kg.add_relation(Relation::new("a", "r", "b"));
        kg.add_relation(Relation::new("a", "s", "d"));

        assert_eq!(kg.neighbors("a", Direction::Both), vec!["c", "d", "b"]);
        assert_eq!(kg.neighbors("a", Direction::Out), vec!["d", "b"]);
        assert_eq!(kg.neighbors("a", Direction::In), vec!["c"]);
        assert_eq!(kg.degree("a"), 3);
    }

    #[test]
    fn relations_between_earliest_first() {
        let mut kg = founders();
        kg.add_relation(Relation::new("Ada", "chaired", "Co1"));
        let between: Vec<&str> = kg
            .relations_between("Ada", "Co1")
            .iter()
            .map(|r| r.relation.as_str())
            .collect();
        assert_eq!(between, vec!["founded", "chaired"]);
        assert!(kg.relations_between("Co1", "Ada").is_empty());
    }

    #[test]
    fn entities_by_name_is_case_insensitive_substring() {
        let kg = founders();
        let hits: Vec<&str> = kg.entities_by_name("co").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(hits, vec!["Co1"]);
        assert!(kg.entities_by_name("  ").is_empty());
    }

    #[test]
    fn stats_counts_types() {
        let stats = founders().stats();
        assert_eq!(
            stats,
            GraphStats {
                num_entities: 3,
                num_relations: 2,
                num_entity_types: 2,
                num_relation_types: 2,
            }
        );
    }

    #[test]
    fn to_text_uses_display_names() {
        let kg = founders();
        let mut names = EntityNames::default();
        names.insert("Co1", "Company One");
        let text = kg.to_text(&names);
        assert!(text.contains("Company One [kb_id: Co1] (Company)"));
        assert!(text.contains("Ada --[founded]--> Company One"));
    }

    #[test]
    fn empty_queries() {
        let kg = KnowledgeGraph::new();
        assert!(kg.neighbors("x", Direction::Both).is_empty());
        assert!(kg.relations_from("x").is_empty());
        assert!(kg.relations_between("x", "y").is_empty());
        assert_eq!(kg.degree("x"), 0);
        assert!(kg.entity("x").is_none());
    }
}
