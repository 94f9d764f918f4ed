//! Batch processing, dataset loading and checkpointed runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use eperm::batch::checkpoint::latest_checkpoint;
use eperm::batch::{BatchInferenceProcessor, BatchItem, Checkpoint, DatasetRunner};
use eperm::config::{BatchConfig, EpermConfig};
use eperm::dataset::{self, WebQspVocab};
use eperm::evidence::{EvidencePath, HeuristicPathFinder, PathFinder};
use eperm::graph::{Entity, EntityNames, KnowledgeGraph, Relation};
use eperm::llm::{CompletionRequest, LlmError, ScriptedCompletion, TextCompletion};
use eperm::predict::{AnswerPredictor, DirectPredictor, GenerativePredictor};

fn founders() -> KnowledgeGraph {
    let mut kg = KnowledgeGraph::new();
    for id in ["Ada", "Bob", "Co1"] {
        kg.add_entity(Entity::new(id, id));
    }
    kg.add_relation(Relation::new("Ada", "founded", "Co1"));
    kg.add_relation(Relation::new("Bob", "advises", "Co1"));
    kg
}

fn items(n: usize) -> Vec<BatchItem> {
    (0..n)
        .map(|i| BatchItem::new(format!("q{i}"), "Who founded Co1?", founders()).with_gold_answers(["Ada"]))
        .collect()
}

/// Heuristic path finder that counts calls and fails on one question id.
struct Counting {
    inner: HeuristicPathFinder,
    calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

impl Counting {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            inner: HeuristicPathFinder::new(EpermConfig::default().path_finder, Arc::new(EntityNames::new())),
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

impl PathFinder for Counting {
    fn find_evidence_paths(&self, question: &str, kg: &KnowledgeGraph) -> Result<Vec<EvidencePath>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_on
            && question.contains(marker)
        {
            return Err(LlmError::RequestFailed {
                message: "HTTP 500".into(),
            });
        }
        self.inner.find_evidence_paths(question, kg)
    }
}

fn direct() -> Arc<dyn AnswerPredictor> {
    Arc::new(DirectPredictor::new(EpermConfig::default().predictor, Arc::new(EntityNames::new())))
}

#[test]
fn one_failing_item_out_of_n() {
    let finder = Arc::new(Counting::new(Some("[fail]")));
    let processor = BatchInferenceProcessor::new(BatchConfig::default(), finder.clone(), direct());

    let mut batch = items(7);
    batch[4].question = "[fail] Who founded Co1?".into();
    let (results, metrics) = processor.process_batch(&batch);

    assert_eq!(results.len(), 7);
    assert_eq!(finder.calls.load(Ordering::SeqCst), 7);
    let failed: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.error.is_some())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(failed, vec![4]);
    assert!(!results[4].correct);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.id, format!("q{i}"));
        if i != 4 {
            assert!(r.correct, "item {i} should be answered");
            assert_eq!(r.predicted_answer, "Ada");
        }
    }
    assert_eq!((metrics.successful, metrics.failed), (6, 1));
}

#[test]
fn sequential_and_parallel_agree() {
    let parallel = BatchInferenceProcessor::new(BatchConfig::default(), Arc::new(Counting::new(None)), direct());
    let sequential = BatchInferenceProcessor::new(
        BatchConfig {
            parallel: false,
            ..BatchConfig::default()
        },
        Arc::new(Counting::new(None)),
        direct(),
    );
    let batch = items(12);
    let (a, _) = parallel.process_batch(&batch);
    let (b, _) = sequential.process_batch(&batch);

    let strip = |r: &eperm::batch::BatchResult| (r.id.clone(), r.predicted_answer.clone(), r.confidence, r.correct);
    assert_eq!(a.iter().map(strip).collect::<Vec<_>>(), b.iter().map(strip).collect::<Vec<_>>());
}

#[test]
fn combined_requests_can_be_disabled() {
    let client = Arc::new(ScriptedCompletion::always(r#"{"answer": "Ada", "confidence": 0.7}"#).with_batch_support());
    let predictor: Arc<dyn AnswerPredictor> = Arc::new(GenerativePredictor::new(
        EpermConfig::default().predictor,
        client.clone(),
        Arc::new(EntityNames::new()),
    ));
    let config = BatchConfig {
        combine_requests: false,
        ..BatchConfig::default()
    };
    let processor = BatchInferenceProcessor::new(config, Arc::new(Counting::new(None)), predictor);
    let (results, _) = processor.process_batch(&items(3));

    assert_eq!(client.batch_call_count(), 0);
    assert_eq!(client.call_count(), 3);
    assert!(results.iter().all(|r| r.correct));
}

/// Batched backend whose combined reply can come back short or fail at one position.
struct Ragged {
    drop_last: bool,
    fail_at: Option<usize>,
}

const ADA_REPLY: &str = r#"{"answer": "Ada", "confidence": 0.7}"#;

impl TextCompletion for Ragged {
    fn generate(&self, _: &CompletionRequest) -> Result<String, LlmError> {
        Ok(ADA_REPLY.into())
    }

    fn batch_generate(&self, requests: &[CompletionRequest]) -> Vec<Result<String, LlmError>> {
        let mut replies: Vec<Result<String, LlmError>> = (0..requests.len())
            .map(|i| {
                if self.fail_at == Some(i) {
                    Err(LlmError::RequestFailed {
                        message: "HTTP 502".into(),
                    })
                } else {
                    Ok(ADA_REPLY.into())
                }
            })
            .collect();
        if self.drop_last {
            replies.pop();
        }
        replies
    }

    fn supports_batch(&self) -> bool {
        true
    }
}

fn ragged_processor(backend: Ragged) -> BatchInferenceProcessor {
    let predictor: Arc<dyn AnswerPredictor> = Arc::new(GenerativePredictor::new(
        EpermConfig::default().predictor,
        Arc::new(backend),
        Arc::new(EntityNames::new()),
    ));
    BatchInferenceProcessor::new(BatchConfig::default(), Arc::new(Counting::new(None)), predictor)
}

#[test]
fn short_combined_reply_fails_only_the_unmatched_item() {
    let processor = ragged_processor(Ragged {
        drop_last: true,
        fail_at: None,
    });
    let (results, metrics) = processor.process_batch(&items(3));

    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["q0", "q1", "q2"]);
    assert!(results[..2].iter().all(|r| r.is_success() && r.correct && r.predicted_answer == "Ada"));
    let missing = results[2].error.as_deref().unwrap();
    assert!(missing.starts_with("parse error: "));
    assert!(missing.contains("missing an entry"));
    assert!(!results[2].correct);
    assert_eq!((metrics.successful, metrics.failed), (2, 1));
}

#[test]
fn failed_combined_entry_stays_at_its_position() {
    let processor = ragged_processor(Ragged {
        drop_last: false,
        fail_at: Some(1),
    });
    let (results, _) = processor.process_batch(&items(3));

    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["q0", "q1", "q2"]);
    let failed = results[1].error.as_deref().unwrap();
    assert!(failed.starts_with("external call failed: "));
    assert!(failed.contains("HTTP 502"));
    for i in [0, 2] {
        assert!(results[i].is_success() && results[i].correct, "item {i} should be answered");
        assert!(results[i].confidence > 0.0);
    }
}

#[test]
fn dataset_run_checkpoints_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let finder = Arc::new(Counting::new(None));
    let processor = BatchInferenceProcessor::new(BatchConfig::default(), finder.clone(), direct());
    let dataset = items(5);

    // First session stops after the first checkpoint.
    let first = DatasetRunner::new(&processor, dir.path())
        .with_batch_size(2)
        .with_save_interval(2)
        .run(&dataset[..3], None)
        .unwrap();
    assert_eq!(first.checkpoints.len(), 1);
    assert!(first.checkpoints[0].ends_with("checkpoint_2.json"));
    assert!(first.final_path.ends_with("final_results_3.json"));

    let latest = latest_checkpoint(dir.path()).unwrap().unwrap();
    let checkpoint = Checkpoint::load(&latest).unwrap();
    assert_eq!(checkpoint.results.len(), 2);
    assert_eq!(checkpoint.stats.processed, 2);

    // Resume: only the three items after the checkpoint are processed.
    finder.calls.store(0, Ordering::SeqCst);
    let second = DatasetRunner::new(&processor, dir.path())
        .with_batch_size(2)
        .with_save_interval(2)
        .run(&dataset, Some(checkpoint))
        .unwrap();
    assert_eq!(finder.calls.load(Ordering::SeqCst), 3);
    assert_eq!(second.results.len(), 5);
    assert_eq!(
        second.results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        ["q0", "q1", "q2", "q3", "q4"]
    );
    assert_eq!(second.stats.total_samples, 5);
    assert_eq!(second.stats.correct, 5);
    assert!(second.checkpoints.last().unwrap().ends_with("checkpoint_4.json"));

    let saved = Checkpoint::load(&second.final_path).unwrap();
    assert_eq!(saved.results.len(), second.results.len());
    assert!(
        saved
            .results
            .iter()
            .zip(&second.results)
            .all(|(a, b)| a.id == b.id && a.predicted_answer == b.predicted_answer && a.correct == b.correct)
    );
    assert_eq!(processor.statistics().total_items, 2 + 1 + 2 + 1);
}

#[test]
fn zero_batch_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let processor = BatchInferenceProcessor::new(BatchConfig::default(), Arc::new(Counting::new(None)), direct());
    let err = DatasetRunner::new(&processor, dir.path())
        .with_batch_size(0)
        .run(&items(1), None)
        .unwrap_err();
    assert!(matches!(err, eperm::error::BatchError::ZeroBatchSize));
}

#[test]
fn webqsp_files_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("entities.txt"), "m.ada\nm.co1\nm.bob\n").unwrap();
    std::fs::write(dir.path().join("relations.txt"), "organization.founder\norganization.advisor\n").unwrap();
    let data = dir.path().join("test.jsonl");
    std::fs::write(
        &data,
        concat!(
            r#"{"id": "WebQTest-0", "question": "who founded co1", "answers": [{"kb_id": "m.ada", "text": "Ada"}], "subgraph": {"tuples": [[0, 0, 1], [2, 1, 1]]}}"#,
            "\n",
            r#"{"id": "WebQTest-1", "question": "who advises co1", "answers": [{"kb_id": "m.bob", "text": "Bob"}], "subgraph": {"tuples": []}}"#,
            "\n",
        ),
    )
    .unwrap();

    let vocab = WebQspVocab::load(dir.path()).unwrap();
    let batch = dataset::load_webqsp(&data, &vocab, None, 100).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].kg.relation_count(), 2);
    assert_eq!(batch[0].gold_entity_ids, vec!["m.ada"]);

    let samples = dataset::read_webqsp_samples(&data, None).unwrap();
    let names = dataset::answer_name_map(&samples);
    assert_eq!(names.get("m.bob"), Some("Bob"));

    let processor = BatchInferenceProcessor::new(BatchConfig::default(), Arc::new(Counting::new(None)), direct());
    let (results, metrics) = processor.process_batch(&batch);
    assert_eq!(metrics.successful, 2);
    assert!(results[0].num_evidence_paths > 0);
    assert_eq!(results[1].num_evidence_paths, 0);
    assert_eq!(results[1].confidence, 0.0);
    assert!(!results[1].correct);
}
