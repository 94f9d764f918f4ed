//! Question-answering datasets as [`BatchItem`]s.
//!
//! Two line-oriented JSON formats are supported:
//! - **native**: one `{id, question, answers, answer_entity_ids?, kg}` object per
//!   line, with `kg` in the graph document format
//! - **WebQSP**: samples whose `subgraph.tuples` are `[head, relation, tail]`
//!   indices into `entities.txt` / `relations.txt`, with `answers` given as
//!   `[{kb_id, text}]`

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use crate::batch::BatchItem;
use crate::error::DatasetError;
use crate::graph::{Entity, EntityNames, KnowledgeGraph, Relation};

/// Default cap on triples taken from one WebQSP subgraph.
pub const DEFAULT_TRIPLE_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct NativeRecord {
    #[serde(default)]
    id: Option<serde_json::Value>,
    question: String,
    #[serde(default)]
    answers: Vec<String>,
    #[serde(default)]
    answer_entity_ids: Vec<String>,
    #[serde(default)]
    kg: KnowledgeGraph,
}

/// Load a native JSONL dataset, at most `limit` records when given.
///
/// Records without an `id` are named `sample_{n}` by their position.
pub fn load_jsonl(path: &Path, limit: Option<usize>) -> Result<Vec<BatchItem>, DatasetError> {
    let items = read_records(path, limit, |n, record: NativeRecord| {
        Ok(BatchItem {
            id: record_id(record.id.as_ref(), n),
            question: record.question,
            gold_answers: record.answers,
            gold_entity_ids: record.answer_entity_ids,
            kg: record.kg,
        })
    })?;
    tracing::info!(path = %path.display(), items = items.len(), "loaded dataset");
    Ok(items)
}

/// One gold answer of a WebQSP sample.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebQspAnswer {
    #[serde(default)]
    pub kb_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebQspSubgraph {
    #[serde(default)]
    pub tuples: Vec<[usize; 3]>,
}

/// One raw WebQSP sample.
#[derive(Debug, Clone, Deserialize)]
pub struct WebQspSample {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub question: String,
    #[serde(default, deserialize_with = "skip_null_answers")]
    pub answers: Vec<WebQspAnswer>,
    #[serde(default)]
    pub subgraph: WebQspSubgraph,
}

fn skip_null_answers<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<WebQspAnswer>, D::Error> {
    let raw: Vec<Option<WebQspAnswer>> = Vec::deserialize(d)?;
    Ok(raw.into_iter().flatten().collect())
}

/// Entity and relation vocabularies that WebQSP tuples index into.
#[derive(Debug, Clone, Default)]
pub struct WebQspVocab {
    entities: Vec<String>,
    relations: Vec<String>,
}

impl WebQspVocab {
    pub fn new(entities: Vec<String>, relations: Vec<String>) -> Self {
        Self { entities, relations }
    }

    /// Read `entities.txt` and `relations.txt` (one name per line) from `dir`.
    pub fn load(dir: &Path) -> Result<Self, DatasetError> {
        let vocab = Self {
            entities: read_lines(&dir.join("entities.txt"))?,
            relations: read_lines(&dir.join("relations.txt"))?,
        };
        tracing::info!(
            entities = vocab.entities.len(),
            relations = vocab.relations.len(),
            "loaded WebQSP vocabularies"
        );
        Ok(vocab)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Build the sample's graph from at most `triple_limit` tuples.
    ///
    /// Entities are added in order of first appearance. Entities named by an
    /// answer take the answer text; others are named after their id with the
    /// `m.` prefix removed and underscores turned into spaces. Tuples with an
    /// out-of-range index are skipped.
    pub fn sample_to_kg(&self, sample: &WebQspSample, triple_limit: usize) -> KnowledgeGraph {
        let answer_names: HashMap<&str, &str> = sample
            .answers
            .iter()
            .filter_map(|a| Some((a.kb_id.as_deref()?, a.text.as_deref()?)))
            .collect();

        let tuples = &sample.subgraph.tuples[..sample.subgraph.tuples.len().min(triple_limit)];
        let mut kg = KnowledgeGraph::new();
        for &[head, _, tail] in tuples {
            for idx in [head, tail] {
                let Some(id) = self.entities.get(idx) else {
                    continue;
                };
                if kg.contains_entity(id) {
                    continue;
                }
                let name = answer_names
                    .get(id.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| readable_id(id));
                kg.add_entity(Entity::new(id.clone(), name).with_attribute("original_idx", serde_json::json!(idx)));
            }
        }
        for &[head, rel, tail] in tuples {
            if let (Some(h), Some(r), Some(t)) = (self.entities.get(head), self.relations.get(rel), self.entities.get(tail)) {
                kg.add_relation(Relation::new(h.clone(), r.clone(), t.clone()));
            }
        }
        kg
    }

    /// Turn a sample into a batch item; `position` names samples without an id.
    pub fn sample_to_item(&self, sample: WebQspSample, position: usize, triple_limit: usize) -> BatchItem {
        let kg = self.sample_to_kg(&sample, triple_limit);
        let gold_answers: Vec<String> = sample.answers.iter().filter_map(|a| a.text.clone()).collect();
        let mut gold_entity_ids: Vec<String> = Vec::new();
        for answer in &sample.answers {
            if answer.text.is_some()
                && let Some(id) = &answer.kb_id
                && !gold_entity_ids.contains(id)
            {
                gold_entity_ids.push(id.clone());
            }
        }
        BatchItem {
            id: record_id(sample.id.as_ref(), position),
            question: sample.question,
            gold_answers,
            gold_entity_ids,
            kg,
        }
    }
}

/// Load WebQSP samples from a JSONL file and convert them into batch items.
pub fn load_webqsp(
    path: &Path,
    vocab: &WebQspVocab,
    limit: Option<usize>,
    triple_limit: usize,
) -> Result<Vec<BatchItem>, DatasetError> {
    let items = read_records(path, limit, |n, sample: WebQspSample| {
        Ok(vocab.sample_to_item(sample, n, triple_limit))
    })?;
    tracing::info!(path = %path.display(), items = items.len(), triple_limit, "loaded WebQSP samples");
    Ok(items)
}

/// Collect `kb_id -> text` display names from WebQSP answers.
///
/// When an id appears with several texts, the longest wins.
pub fn answer_name_map(samples: &[WebQspSample]) -> EntityNames {
    let mut best: HashMap<String, String> = HashMap::new();
    for answer in samples.iter().flat_map(|s| &s.answers) {
        let (Some(id), Some(text)) = (&answer.kb_id, &answer.text) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        match best.get(id) {
            Some(current) if current.len() >= text.len() => {}
            _ => {
                best.insert(id.clone(), text.clone());
            }
        }
    }
    best.into_iter().collect()
}

/// Read raw WebQSP samples, e.g. for [`answer_name_map`].
pub fn read_webqsp_samples(path: &Path, limit: Option<usize>) -> Result<Vec<WebQspSample>, DatasetError> {
    read_records(path, limit, |_, sample| Ok(sample))
}

fn read_records<R, T>(
    path: &Path,
    limit: Option<usize>,
    mut convert: impl FnMut(usize, R) -> Result<T, DatasetError>,
) -> Result<Vec<T>, DatasetError>
where
    R: for<'de> Deserialize<'de>,
{
    let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let limit = limit.unwrap_or(usize::MAX);
    let mut out = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        if out.len() >= limit {
            break;
        }
        let line = line.map_err(|e| DatasetError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: R = serde_json::from_str(&line).map_err(|e| DatasetError::Record {
            path: path.display().to_string(),
            line: line_no + 1,
            message: e.to_string(),
        })?;
        let position = out.len();
        out.push(convert(position, record)?);
    }
    Ok(out)
}

fn read_lines(path: &Path) -> Result<Vec<String>, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(text.lines().map(|l| l.trim().to_string()).collect())
}

fn record_id(id: Option<&serde_json::Value>, position: usize) -> String {
    match id {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => format!("sample_{position}"),
        Some(other) => other.to_string(),
    }
}

fn readable_id(id: &str) -> String {
    id.replacen("m.", "", 1).replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vocab() -> WebQspVocab {
        WebQspVocab::new(
            vec!["m.0jamaica".into(), "m.english_lang".into(), "m.0carib".into()],
            vec!["location.country.languages_spoken".into(), "location.location.containedby".into()],
        )
    }

    fn sample(json: &str) -> WebQspSample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn webqsp_sample_builds_named_graph() {
        let s = sample(
            r#"{"id": "WebQTest-1", "question": "what language do jamaican people speak",
                "answers": [{"kb_id": "m.english_lang", "text": "English"}, null],
                "subgraph": {"tuples": [[0, 0, 1], [0, 1, 2], [0, 9, 2], [7, 0, 1]]}}"#,
        );
        let item = vocab().sample_to_item(s, 0, DEFAULT_TRIPLE_LIMIT);

        assert_eq!(item.id, "WebQTest-1");
        assert_eq!(item.gold_answers, vec!["English"]);
        assert_eq!(item.gold_entity_ids, vec!["m.english_lang"]);
        assert_eq!(item.kg.len(), 3);
        assert_eq!(item.kg.relation_count(), 2);
        assert_eq!(item.kg.entity("m.english_lang").unwrap().name, "English");
        assert_eq!(item.kg.entity("m.0jamaica").unwrap().name, "0jamaica");
        assert_eq!(
            item.kg.entity("m.0carib").unwrap().attributes["original_idx"],
            serde_json::json!(2)
        );
    }

    #[test]
    fn triple_limit_truncates() {
        let s = sample(r#"{"question": "q", "subgraph": {"tuples": [[0, 0, 1], [0, 1, 2]]}}"#);
        let item = vocab().sample_to_item(s, 4, 1);
        assert_eq!(item.id, "sample_4");
        assert_eq!(item.kg.relation_count(), 1);
        assert!(!item.kg.contains_entity("m.0carib"));
    }

    #[test]
    fn readable_ids() {
        assert_eq!(readable_id("m.0d_3k"), "0d 3k");
        assert_eq!(readable_id("Paris"), "Paris");
    }

    #[test]
    fn name_map_prefers_longest_text() {
        let samples = vec![
            sample(r#"{"question": "a", "answers": [{"kb_id": "m.1", "text": "Obama"}]}"#),
            sample(r#"{"question": "b", "answers": [{"kb_id": "m.1", "text": "Barack Obama"}, {"kb_id": "m.2"}]}"#),
        ];
        let names = answer_name_map(&samples);
        assert_eq!(names.get("m.1"), Some("Barack Obama"));
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn native_jsonl_loads_and_reports_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"{{"id": 7, "question": "Who founded Co1?", "answers": ["Ada"], "kg": {{"entities": [{{"id": "Ada", "name": "Ada"}}], "relations": []}}}}"#
        )
        .unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"{{"question": "second"}}"#).unwrap();
        drop(f);

        let items = load_jsonl(&path, None).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "7");
        assert_eq!(items[0].kg.len(), 1);
        assert_eq!(items[1].id, "sample_1");
        assert!(items[1].kg.is_empty());

        assert_eq!(load_jsonl(&path, Some(1)).unwrap().len(), 1);

        std::fs::write(&path, "{\"question\": \"ok\"}\nnot json\n").unwrap();
        let err = load_jsonl(&path, None).unwrap_err();
        assert!(matches!(err, DatasetError::Record { line: 2, .. }));
    }

    #[test]
    fn vocab_files_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("entities.txt"), "m.1\nm.2\n").unwrap();
        std::fs::write(dir.path().join("relations.txt"), "r.a\n").unwrap();
        let vocab = WebQspVocab::load(dir.path()).unwrap();
        assert_eq!(vocab.entity_count(), 2);
        assert_eq!(vocab.relation_count(), 1);
        assert!(matches!(
            WebQspVocab::load(&dir.path().join("missing")),
            Err(DatasetError::Io { .. })
        ));
    }
}
