//! Question keyword extraction with TF-IDF-style weights.

use std::collections::HashSet;
use std::sync::LazyLock;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "were", "be", "been", "being", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "can", "that", "this",
        "these", "those", "what", "which", "who", "whom", "where", "when", "why", "how", "all",
        "each", "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor",
        "not", "only", "own", "same", "so", "than", "too", "very", "just", "before", "during",
        "after", "serve", "serves", "are", "am", "you", "your", "he", "his", "she", "her", "it",
        "its", "we", "our", "they", "their", "them",
    ]
    .into_iter()
    .collect()
});

/// Whether `word` (lowercase) is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Weighted question keywords, in order of first appearance.
///
/// Weight = `ln(1 + length) * ln(1 + frequency)`, divided by the largest weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionKeywords {
    terms: Vec<(String, f64)>,
}

impl QuestionKeywords {
    /// Lowercase, trim punctuation, drop stopwords and tokens of two characters or fewer.
    pub fn extract(question: &str) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for raw in question.split_whitespace() {
            let token = raw
                .to_lowercase()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string();
            if token.chars().count() <= 2 || is_stopword(&token) {
                continue;
            }
            match counts.iter_mut().find(|(t, _)| *t == token) {
                Some((_, n)) => *n += 1,
                None => counts.push((token, 1)),
            }
        }

        let mut terms: Vec<(String, f64)> = counts
            .into_iter()
            .map(|(t, n)| {
                let weight = (1.0 + t.chars().count() as f64).ln() * (1.0 + n as f64).ln();
                (t, weight)
            })
            .collect();
        let max = terms.iter().map(|(_, w)| *w).fold(0.0, f64::max);
        if max > 0.0 {
            for (_, w) in &mut terms {
                *w /= max;
            }
        }
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn weight(&self, term: &str) -> Option<f64> {
        self.terms.iter().find(|(t, _)| t == term).map(|(_, w)| *w)
    }

    /// Sum of weights of keywords contained in any of `texts` (lowercase), each keyword counted once.
    pub fn overlap<'a>(&self, texts: impl IntoIterator<Item = &'a str> + Clone) -> f64 {
        self.terms
            .iter()
            .filter(|(t, _)| texts.clone().into_iter().any(|text| text.contains(t.as_str())))
            .map(|(_, w)| *w)
            .sum()
    }
}
