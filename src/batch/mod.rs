//! Batch inference over independent question/subgraph items.
//!
//! A batch runs in two stages:
//! 1. **Evidence**: every item runs its path finder against its own subgraph.
//!    Items share nothing, so this stage fans out over the rayon pool.
//! 2. **Answers**: items without evidence get a single direct model call (or a
//!    zero-confidence answer when no backend is configured). Items with evidence
//!    are planned by the predictor; the pending model requests of all items are
//!    sent together through [`TextCompletion::batch_generate`] when the backend
//!    supports it, and the replies are matched back by position.
//!
//! A failure inside one item, including a panic, is recorded on that item's
//! [`BatchResult`] and never touches its siblings. Results come back in input order.

pub mod checkpoint;
pub mod matching;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;
use crate::evidence::{EvidencePath, PathFinder};
use crate::graph::KnowledgeGraph;
use crate::llm::{CompletionRequest, LlmError, TextCompletion};
use crate::predict::{Answer, AnswerPredictor, NO_ANSWER_FOUND, PendingAnswer, PredictionPlan};

pub use checkpoint::{Checkpoint, DatasetRunner, RunOutcome, RunStats};
pub use matching::{flexible_match, normalize_text};

const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions accurately and concisely. \
Provide a short, direct answer (typically 1-10 words).";

const FALLBACK_TEMPERATURE: f64 = 0.1;
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// One question with its gold answers and its own subgraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub gold_answers: Vec<String>,
    /// Gold answers as entity ids of `kg`, when the dataset provides them.
    #[serde(default)]
    pub gold_entity_ids: Vec<String>,
    pub kg: KnowledgeGraph,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, question: impl Into<String>, kg: KnowledgeGraph) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            gold_answers: Vec::new(),
            gold_entity_ids: Vec::new(),
            kg,
        }
    }

    pub fn with_gold_answers(mut self, answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.gold_answers = answers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_gold_entity_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.gold_entity_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub id: String,
    pub question: String,
    pub gold_answers: Vec<String>,
    pub predicted_answer: String,
    pub confidence: f64,
    pub correct: bool,
    /// Seconds spent on this item.
    pub processing_time: f64,
    /// Paths the path finder ranked for this item, before top-K selection.
    pub num_evidence_paths: usize,
    /// Set when the item failed. Model failures are prefixed with their
    /// degradation, e.g. `external call failed: ...`; panics with `panic: `.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    fn failed(item: &BatchItem, error: String, elapsed: Duration, num_evidence_paths: usize) -> Self {
        Self {
            id: item.id.clone(),
            question: item.question.clone(),
            gold_answers: item.gold_answers.clone(),
            predicted_answer: String::new(),
            confidence: 0.0,
            correct: false,
            processing_time: elapsed.as_secs_f64(),
            num_evidence_paths,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Throughput of one processed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// 1-based sequence number within this processor.
    pub batch_number: usize,
    pub batch_size: usize,
    /// Wall-clock seconds for the whole batch.
    pub processing_time: f64,
    pub items_per_second: f64,
    pub avg_item_time: f64,
    pub successful: usize,
    pub failed: usize,
}

/// Cumulative statistics across every batch a processor has run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_batches: usize,
    pub total_items: usize,
    pub avg_batch_time: f64,
    pub avg_items_per_second: f64,
    pub total_successful: usize,
    pub total_failed: usize,
    pub success_rate: f64,
}

impl BatchStatistics {
    fn from_history(history: &[BatchMetrics]) -> Self {
        if history.is_empty() {
            return Self::default();
        }
        let n = history.len() as f64;
        let total_items: usize = history.iter().map(|m| m.batch_size).sum();
        let total_successful: usize = history.iter().map(|m| m.successful).sum();
        let total_failed: usize = history.iter().map(|m| m.failed).sum();
        Self {
            total_batches: history.len(),
            total_items,
            avg_batch_time: history.iter().map(|m| m.processing_time).sum::<f64>() / n,
            avg_items_per_second: history.iter().map(|m| m.items_per_second).sum::<f64>() / n,
            total_successful,
            total_failed,
            success_rate: if total_items == 0 {
                0.0
            } else {
                total_successful as f64 / total_items as f64
            },
        }
    }
}

/// Stage-1 outcome of one item.
enum EvidenceOutcome {
    Paths(Vec<EvidencePath>),
    Failed(String),
}

/// Stage-2 work for one item, before any model call.
enum AnswerWork {
    Done(Result<Answer, String>),
    Fallback(CompletionRequest),
    Pending(PendingAnswer),
}

/// Runs batches of independent items through path finding and prediction.
pub struct BatchInferenceProcessor {
    config: BatchConfig,
    path_finder: Arc<dyn PathFinder>,
    predictor: Arc<dyn AnswerPredictor>,
    fallback_client: Option<Arc<dyn TextCompletion>>,
    history: Mutex<Vec<BatchMetrics>>,
}

impl BatchInferenceProcessor {
    pub fn new(
        config: BatchConfig,
        path_finder: Arc<dyn PathFinder>,
        predictor: Arc<dyn AnswerPredictor>,
    ) -> Self {
        Self {
            config,
            path_finder,
            predictor,
            fallback_client: None,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Backend for answering items that produced no evidence.
    pub fn with_fallback_client(mut self, client: Arc<dyn TextCompletion>) -> Self {
        self.fallback_client = Some(client);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process one batch. `results[i]` always belongs to `items[i]`.
    pub fn process_batch(&self, items: &[BatchItem]) -> (Vec<BatchResult>, BatchMetrics) {
        let started = Instant::now();

        let evidence: Vec<(EvidenceOutcome, Duration)> = if self.config.parallel {
            items.par_iter().map(|item| self.find_evidence(item)).collect()
        } else {
            items.iter().map(|item| self.find_evidence(item)).collect()
        };

        let results = self.answer_all(items, evidence);
        let metrics = self.record(items.len(), &results, started.elapsed());
        tracing::info!(
            batch = metrics.batch_number,
            items = metrics.batch_size,
            successful = metrics.successful,
            failed = metrics.failed,
            items_per_second = format!("{:.2}", metrics.items_per_second),
            "batch processed"
        );
        (results, metrics)
    }

    /// Cumulative statistics over every batch since creation or the last reset.
    pub fn statistics(&self) -> BatchStatistics {
        BatchStatistics::from_history(&self.history.lock().expect("batch history lock poisoned"))
    }

    /// Per-batch metrics in processing order.
    pub fn history(&self) -> Vec<BatchMetrics> {
        self.history.lock().expect("batch history lock poisoned").clone()
    }

    pub fn reset_statistics(&self) {
        self.history.lock().expect("batch history lock poisoned").clear();
    }

    fn find_evidence(&self, item: &BatchItem) -> (EvidenceOutcome, Duration) {
        let started = Instant::now();
        let outcome = match isolate(|| self.path_finder.find_evidence_paths(&item.question, &item.kg)) {
            Ok(Ok(paths)) => EvidenceOutcome::Paths(paths),
            Ok(Err(err)) => {
                tracing::warn!(item = %item.id, error = %err, "path finding failed");
                EvidenceOutcome::Failed(describe(&err))
            }
            Err(panic) => {
                tracing::warn!(item = %item.id, error = %panic, "path finding panicked");
                EvidenceOutcome::Failed(panic)
            }
        };
        (outcome, started.elapsed())
    }

    fn answer_all(&self, items: &[BatchItem], evidence: Vec<(EvidenceOutcome, Duration)>) -> Vec<BatchResult> {
        let mut times: Vec<Duration> = Vec::with_capacity(items.len());
        let mut path_counts: Vec<usize> = Vec::with_capacity(items.len());
        let mut work: Vec<AnswerWork> = Vec::with_capacity(items.len());

        for (item, (outcome, elapsed)) in items.iter().zip(evidence) {
            let started = Instant::now();
            let (count, next) = match outcome {
                EvidenceOutcome::Failed(err) => (0, AnswerWork::Done(Err(err))),
                EvidenceOutcome::Paths(paths) if paths.is_empty() => (0, self.fallback_work(item)),
                EvidenceOutcome::Paths(paths) => {
                    let plan = isolate(|| self.predictor.plan(&item.question, &paths, &item.kg));
                    let next = match plan {
                        Ok(PredictionPlan::Ready(answer)) => AnswerWork::Done(Ok(answer)),
                        Ok(PredictionPlan::Pending(pending)) => AnswerWork::Pending(pending),
                        Err(panic) => AnswerWork::Done(Err(panic)),
                    };
                    (paths.len(), next)
                }
            };
            times.push(elapsed + started.elapsed());
            path_counts.push(count);
            work.push(next);
        }

        let answers = self.resolve_pending(work, &mut times);

        items
            .iter()
            .zip(answers)
            .zip(times.into_iter().zip(path_counts))
            .map(|((item, answer), (elapsed, num_paths))| match answer {
                Ok(answer) => BatchResult {
                    id: item.id.clone(),
                    question: item.question.clone(),
                    gold_answers: item.gold_answers.clone(),
                    correct: answer.is_answered()
                        && matching::flexible_match(
                            &answer.answer,
                            &item.gold_answers,
                            &item.gold_entity_ids,
                            Some(&item.kg),
                        ),
                    predicted_answer: answer.answer,
                    confidence: answer.confidence,
                    processing_time: elapsed.as_secs_f64(),
                    num_evidence_paths: num_paths,
                    error: None,
                },
                Err(err) => BatchResult::failed(item, err, elapsed, num_paths),
            })
            .collect()
    }

    fn fallback_work(&self, item: &BatchItem) -> AnswerWork {
        match &self.fallback_client {
            Some(_) => AnswerWork::Fallback(
                CompletionRequest::new(FALLBACK_SYSTEM_PROMPT, format!("Question: {}\n\nAnswer:", item.question))
                    .with_temperature(FALLBACK_TEMPERATURE),
            ),
            None => AnswerWork::Done(Ok(Answer::no_evidence())),
        }
    }

    /// Send every outstanding request and resolve all items, in input order.
    ///
    /// Evidence-backed requests go out as one combined call when the predictor's
    /// backend supports it; fallback requests are sent one by one.
    fn resolve_pending(&self, work: Vec<AnswerWork>, times: &mut [Duration]) -> Vec<Result<Answer, String>> {
        let pending_positions: Vec<usize> = work
            .iter()
            .enumerate()
            .filter_map(|(i, w)| matches!(w, AnswerWork::Pending(_)).then_some(i))
            .collect();

        let mut replies: Vec<Option<Result<String, String>>> = vec![None; work.len()];
        if let Some(client) = self.predictor.client() {
            let requests: Vec<CompletionRequest> = pending_positions
                .iter()
                .filter_map(|&i| match &work[i] {
                    AnswerWork::Pending(p) => Some(p.request.clone()),
                    _ => None,
                })
                .collect();
            let combine = self.config.combine_requests && client.supports_batch() && requests.len() > 1;

            if combine {
                let started = Instant::now();
                let batch_replies = isolate(|| client.batch_generate(&requests));
                let share = started.elapsed() / requests.len() as u32;
                match batch_replies {
                    Ok(batch_replies) => {
                        tracing::debug!(requests = requests.len(), "combined answer request sent");
                        let mut batch_replies = batch_replies.into_iter();
                        for &i in &pending_positions {
                            let reply = batch_replies.next().unwrap_or_else(|| {
                                Err(LlmError::ParseError {
                                    message: "combined reply is missing an entry".into(),
                                })
                            });
                            replies[i] = Some(reply.map_err(|e| describe(&e)));
                            times[i] += share;
                        }
                    }
                    Err(panic) => {
                        for &i in &pending_positions {
                            replies[i] = Some(Err(panic.clone()));
                            times[i] += share;
                        }
                    }
                }
            } else {
                for (&i, request) in pending_positions.iter().zip(&requests) {
                    let started = Instant::now();
                    replies[i] = Some(call(client.as_ref(), request));
                    times[i] += started.elapsed();
                }
            }
        }

        work.into_iter()
            .enumerate()
            .map(|(i, w)| match w {
                AnswerWork::Done(answer) => answer,
                AnswerWork::Pending(pending) => match replies[i].take() {
                    Some(Ok(reply)) => isolate(|| pending.resolve(&reply)),
                    Some(Err(err)) => Err(err),
                    None => Ok(Answer::unable("no text-completion backend configured")),
                },
                AnswerWork::Fallback(request) => {
                    let started = Instant::now();
                    let answer = self.answer_directly(&request);
                    times[i] += started.elapsed();
                    answer
                }
            })
            .collect()
    }

    /// Answer without evidence, straight from the model.
    fn answer_directly(&self, request: &CompletionRequest) -> Result<Answer, String> {
        let Some(client) = &self.fallback_client else {
            return Ok(Answer::no_evidence());
        };
        let reply = call(client.as_ref(), request)?;
        let text = reply.trim();
        if text.is_empty() {
            return Ok(Answer::unable(NO_ANSWER_FOUND));
        }
        Ok(Answer::new(
            text,
            FALLBACK_CONFIDENCE,
            Vec::new(),
            "Answered without knowledge graph evidence",
        ))
    }

    fn record(&self, batch_size: usize, results: &[BatchResult], elapsed: Duration) -> BatchMetrics {
        let secs = elapsed.as_secs_f64();
        let successful = results.iter().filter(|r| r.is_success()).count();
        let mut history = self.history.lock().expect("batch history lock poisoned");
        let metrics = BatchMetrics {
            batch_number: history.len() + 1,
            batch_size,
            processing_time: secs,
            items_per_second: if secs > 0.0 { batch_size as f64 / secs } else { 0.0 },
            avg_item_time: if batch_size > 0 { secs / batch_size as f64 } else { 0.0 },
            successful,
            failed: results.len() - successful,
        };
        history.push(metrics.clone());
        metrics
    }
}

impl std::fmt::Debug for BatchInferenceProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchInferenceProcessor")
            .field("config", &self.config)
            .field("fallback_client", &self.fallback_client.is_some())
            .field("batches", &self.history().len())
            .finish()
    }
}

fn call(client: &dyn TextCompletion, request: &CompletionRequest) -> Result<String, String> {
    match isolate(|| client.generate(request)) {
        Ok(reply) => reply.map_err(|e| describe(&e)),
        Err(panic) => Err(panic),
    }
}

/// Item error text for a model failure, tagged with its degradation.
fn describe(err: &LlmError) -> String {
    format!("{}: {err}", err.degradation())
}

/// Run `f`, turning a panic into an error message.
fn isolate<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("panic: {message}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathFinderConfig, PredictorConfig};
    use crate::evidence::HeuristicPathFinder;
    use crate::graph::{Entity, EntityNames, Relation};
    use crate::llm::ScriptedCompletion;
    use crate::predict::{DirectPredictor, GenerativePredictor};

    fn founders() -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        for id in ["Ada", "Bob", "Co1"] {
            kg.add_entity(Entity::new(id, id));
        }
        kg.add_relation(Relation::new("Ada", "founded", "Co1"));
        kg.add_relation(Relation::new("Bob", "advises", "Co1"));
        kg
    }

    fn item(id: &str) -> BatchItem {
        BatchItem::new(id, "Who founded Co1?", founders()).with_gold_answers(["Ada"])
    }

    fn heuristic() -> Arc<dyn PathFinder> {
        Arc::new(HeuristicPathFinder::new(
            PathFinderConfig::default(),
            Arc::new(EntityNames::new()),
        ))
    }

    fn direct() -> Arc<dyn AnswerPredictor> {
        Arc::new(DirectPredictor::new(
            PredictorConfig::default(),
            Arc::new(EntityNames::new()),
        ))
    }

    struct Flaky {
        inner: Arc<dyn PathFinder>,
    }

    impl PathFinder for Flaky {
        fn find_evidence_paths(&self, question: &str, kg: &KnowledgeGraph) -> Result<Vec<EvidencePath>, LlmError> {
            if question.contains("boom") {
                return Err(LlmError::Timeout { timeout_secs: 30 });
            }
            if question.contains("panic") {
                panic!("corrupt subgraph");
            }
            self.inner.find_evidence_paths(question, kg)
        }
    }

    #[test]
    fn direct_batch_answers_in_order() {
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), direct());
        let items = vec![item("q1"), item("q2"), item("q3")];
        let (results, metrics) = processor.process_batch(&items);

        assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["q1", "q2", "q3"]);
        assert!(results.iter().all(|r| r.correct && r.predicted_answer == "Ada"));
        assert!(results.iter().all(|r| r.num_evidence_paths > 0));
        assert_eq!(metrics.batch_number, 1);
        assert_eq!(metrics.successful, 3);
        assert_eq!(metrics.failed, 0);
    }

    #[test]
    fn failures_stay_with_their_item() {
        let finder: Arc<dyn PathFinder> = Arc::new(Flaky { inner: heuristic() });
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), finder, direct());
        let mut items = vec![item("q1"), item("q2"), item("q3"), item("q4")];
        items[1].question = "boom: who founded Co1?".into();
        items[3].question = "panic: who founded Co1?".into();

        let (results, metrics) = processor.process_batch(&items);
        assert_eq!(results.len(), 4);
        assert!(results[0].is_success() && results[0].correct);
        let timed_out = results[1].error.as_deref().unwrap();
        assert!(timed_out.starts_with("external call failed: "));
        assert!(timed_out.contains("timed out"));
        assert!(!results[1].correct);
        assert!(results[2].is_success() && results[2].correct);
        assert!(results[3].error.as_deref().unwrap().contains("corrupt subgraph"));
        assert_eq!(metrics.failed, 2);
    }

    #[test]
    fn no_evidence_without_fallback_is_zero_confidence() {
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), direct());
        let empty = BatchItem::new("q", "Who founded Co1?", KnowledgeGraph::new());
        let (results, _) = processor.process_batch(&[empty]);
        assert_eq!(results[0].confidence, 0.0);
        assert!(results[0].is_success());
        assert_eq!(results[0].num_evidence_paths, 0);
    }

    #[test]
    fn placeholder_answer_is_never_correct() {
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), direct());
        let empty = BatchItem::new("q", "Who founded Co1?", KnowledgeGraph::new()).with_gold_answers(["Answer"]);
        let (results, _) = processor.process_batch(&[empty]);
        assert_eq!(results[0].predicted_answer, crate::predict::UNABLE_TO_ANSWER);
        assert!(!results[0].correct);
    }

    #[test]
    fn evidence_count_is_every_ranked_path() {
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), direct());
        let (results, _) = processor.process_batch(&[item("q1")]);
        let ranked = heuristic().find_evidence_paths("Who founded Co1?", &founders()).unwrap();
        assert!(ranked.len() > 1);
        assert_eq!(results[0].num_evidence_paths, ranked.len());
    }

    #[test]
    fn no_evidence_uses_direct_fallback() {
        let client = Arc::new(ScriptedCompletion::always("  Ada Lovelace \n"));
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), direct())
            .with_fallback_client(client.clone());
        let empty = BatchItem::new("q", "Who founded Co1?", KnowledgeGraph::new()).with_gold_answers(["Ada"]);
        let (results, _) = processor.process_batch(&[empty]);

        assert_eq!(results[0].predicted_answer, "Ada Lovelace");
        assert_eq!(results[0].confidence, 0.5);
        assert!(results[0].correct);
        let request = &client.calls()[0];
        assert_eq!(request.user, "Question: Who founded Co1?\n\nAnswer:");
        assert_eq!(request.temperature, Some(0.1));
    }

    #[test]
    fn pending_answers_are_combined() {
        let client = Arc::new(
            ScriptedCompletion::from_fn(|req| {
                let answer = if req.user.contains("Co1") { "Ada" } else { "?" };
                Ok(format!(r#"{{"answer": "{answer}", "confidence": 0.8}}"#))
            })
            .with_batch_support(),
        );
        let predictor: Arc<dyn AnswerPredictor> = Arc::new(GenerativePredictor::new(
            PredictorConfig::default(),
            client.clone(),
            Arc::new(EntityNames::new()),
        ));
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), predictor);
        let (results, _) = processor.process_batch(&[item("q1"), item("q2"), item("q3")]);

        assert_eq!(client.batch_call_count(), 1);
        assert_eq!(client.call_count(), 3);
        assert!(results.iter().all(|r| r.correct && r.confidence == 0.8));
    }

    #[test]
    fn combined_transport_failure_fails_only_pending_items() {
        let client = Arc::new(ScriptedCompletion::failing().with_batch_support());
        let predictor: Arc<dyn AnswerPredictor> = Arc::new(GenerativePredictor::new(
            PredictorConfig::default(),
            client,
            Arc::new(EntityNames::new()),
        ));
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), predictor);
        let empty = BatchItem::new("q0", "Who founded Co1?", KnowledgeGraph::new());
        let (results, _) = processor.process_batch(&[empty, item("q1"), item("q2")]);

        assert!(results[0].is_success());
        assert!(results[1].error.is_some());
        assert!(results[2].error.is_some());
    }

    #[test]
    fn statistics_accumulate_until_reset() {
        let config = BatchConfig {
            parallel: false,
            ..BatchConfig::default()
        };
        let processor = BatchInferenceProcessor::new(config, heuristic(), direct());
        processor.process_batch(&[item("a"), item("b")]);
        let (_, second) = processor.process_batch(&[item("c")]);
        assert_eq!(second.batch_number, 2);

        let stats = processor.statistics();
        assert_eq!(stats.total_batches, 2);
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.total_successful, 3);
        assert_eq!(stats.success_rate, 1.0);

        processor.reset_statistics();
        assert_eq!(processor.statistics(), BatchStatistics::default());
    }

    #[test]
    fn empty_batch() {
        let processor = BatchInferenceProcessor::new(BatchConfig::default(), heuristic(), direct());
        let (results, metrics) = processor.process_batch(&[]);
        assert!(results.is_empty());
        assert_eq!(metrics.batch_size, 0);
        assert_eq!(metrics.avg_item_time, 0.0);
    }
}
