//! Lenient comparison of predicted answers against gold answers.
//!
//! Knowledge-base answers arrive in many spellings ("Beyoncé" vs "beyonce",
//! "Barack Obama" vs "Obama"), and WebQSP-style graphs often name entities by
//! their ids. A prediction counts as correct when any of these holds:
//! - it is one of the gold entity ids
//! - its normalized text equals, contains or is contained in a gold answer
//! - at least half of the words are shared with a gold answer
//! - it names (or resolves through the item graph to) a gold entity

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::graph::KnowledgeGraph;
use crate::predict::is_non_answer;

static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

const MIN_WORD_OVERLAP: f64 = 0.5;

/// Lowercase, strip accents and punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let unaccented: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let stripped = PUNCTUATION.replace_all(&unaccented, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `predicted` matches any of the gold answers.
///
/// `kg` is the item's own graph; when given, entity ids on either side are
/// resolved to entity names before comparing. Placeholder answers such as
/// "Unable to find answer" never match.
pub fn flexible_match(
    predicted: &str,
    gold_answers: &[String],
    gold_entity_ids: &[String],
    kg: Option<&KnowledgeGraph>,
) -> bool {
    let predicted = predicted.trim();
    if predicted.is_empty() || is_non_answer(predicted) {
        return false;
    }
    if gold_entity_ids.iter().any(|id| id == predicted) {
        return true;
    }

    let mut candidates = vec![normalize_text(predicted)];
    if let Some(entity) = kg.and_then(|kg| kg.entity(predicted)) {
        candidates.push(normalize_text(&entity.name));
    }
    candidates.retain(|c| !c.is_empty());

    let gold: Vec<String> = gold_answers
        .iter()
        .map(|g| normalize_text(g))
        .filter(|g| !g.is_empty())
        .collect();

    if candidates
        .iter()
        .any(|c| gold.iter().any(|g| text_match(c, g)))
    {
        return true;
    }

    let Some(kg) = kg else {
        return false;
    };
    gold_entity_ids
        .iter()
        .filter_map(|id| kg.entity(id))
        .map(|entity| normalize_text(&entity.name))
        .filter(|name| !name.is_empty())
        .any(|name| candidates.iter().any(|c| *c == name))
}

fn text_match(predicted: &str, gold: &str) -> bool {
    if predicted == gold || predicted.contains(gold) || gold.contains(predicted) {
        return true;
    }
    let p: HashSet<&str> = predicted.split(' ').collect();
    let g: HashSet<&str> = gold.split(' ').collect();
    let overlap = p.intersection(&g).count();
    overlap > 0 && overlap as f64 / p.len().max(g.len()) as f64 >= MIN_WORD_OVERLAP
}
