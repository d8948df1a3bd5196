//! Individual quality signals computed from a reference/candidate pair.
//!
//! Every metric returns a value in `[0, 1]` and never fails, including on empty input.

use std::collections::{BTreeMap, HashSet};

use crate::semantic::{DEFAULT_EMBEDDING_DIM, cosine_similarity, embed_text_local, tokenize_words};

pub const LEXICAL_OVERLAP: &str = "lexical_overlap";
pub const LENGTH_ADEQUACY: &str = "length_adequacy";
pub const KEYWORD_COVERAGE: &str = "keyword_coverage";
pub const SEMANTIC_SIMILARITY: &str = "semantic_similarity";

pub const METRIC_NAMES: [&str; 4] = [
    LEXICAL_OVERLAP,
    LENGTH_ADEQUACY,
    KEYWORD_COVERAGE,
    SEMANTIC_SIMILARITY,
];

const STOP_WORDS: &[&str] = &[
    "about", "also", "been", "being", "from", "have", "into", "like", "more", "most", "only",
    "over", "some", "such", "than", "that", "their", "them", "then", "there", "these", "they",
    "this", "very", "what", "when", "where", "which", "while", "with", "would", "your", "como",
    "esta", "este", "para", "pero", "porque", "sobre", "también", "todo", "una", "unos",
];

/// Jaccard similarity of the lower-cased word-token sets.
pub fn lexical_overlap(reference: &str, candidate: &str) -> f64 {
    let reference_tokens = token_set(reference);
    let candidate_tokens = token_set(candidate);

    match (reference_tokens.is_empty(), candidate_tokens.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let intersection = reference_tokens.intersection(&candidate_tokens).count();
    let union = reference_tokens.union(&candidate_tokens).count();

    clamp_unit(intersection as f64 / union as f64)
}

/// `min(len) / max(len)` over character counts of the trimmed texts.
pub fn length_adequacy(reference: &str, candidate: &str) -> f64 {
    let reference_len = reference.trim().chars().count();
    let candidate_len = candidate.trim().chars().count();

    match (reference_len, candidate_len) {
        (0, 0) => 1.0,
        (0, _) | (_, 0) => 0.0,
        (left, right) => clamp_unit(left.min(right) as f64 / left.max(right) as f64),
    }
}

/// Fraction of the reference's salient tokens found in the candidate.
///
/// Salient tokens are at least `min_keyword_len` characters long and not stop words. When the
/// reference has tokens but none of them are salient, every reference token counts.
pub fn keyword_coverage(reference: &str, candidate: &str, min_keyword_len: usize) -> f64 {
    let reference_tokens = token_set(reference);
    let candidate_tokens = token_set(candidate);

    if reference_tokens.is_empty() {
        return if candidate_tokens.is_empty() { 1.0 } else { 0.0 };
    }

    let salient = reference_tokens
        .iter()
        .filter(|token| is_salient(token, min_keyword_len))
        .collect::<Vec<&String>>();
    let keywords = if salient.is_empty() {
        reference_tokens.iter().collect::<Vec<&String>>()
    } else {
        salient
    };

    let covered = keywords
        .iter()
        .filter(|token| candidate_tokens.contains(token.as_str()))
        .count();

    clamp_unit(covered as f64 / keywords.len() as f64)
}

/// Cosine similarity of hashed bag-of-words embeddings, negative values clipped to zero.
pub fn semantic_similarity(reference: &str, candidate: &str) -> f64 {
    let reference_empty = tokenize_words(reference).is_empty();
    let candidate_empty = tokenize_words(candidate).is_empty();

    match (reference_empty, candidate_empty) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let reference_vector = embed_text_local(reference, DEFAULT_EMBEDDING_DIM);
    let candidate_vector = embed_text_local(candidate, DEFAULT_EMBEDDING_DIM);
    clamp_unit(cosine_similarity(&reference_vector, &candidate_vector))
}

/// Runs every metric over the pair.
pub fn compute_all(
    reference: &str,
    candidate: &str,
    min_keyword_len: usize,
) -> BTreeMap<String, f64> {
    BTreeMap::from([
        (
            LEXICAL_OVERLAP.to_string(),
            lexical_overlap(reference, candidate),
        ),
        (
            LENGTH_ADEQUACY.to_string(),
            length_adequacy(reference, candidate),
        ),
        (
            KEYWORD_COVERAGE.to_string(),
            keyword_coverage(reference, candidate, min_keyword_len),
        ),
        (
            SEMANTIC_SIMILARITY.to_string(),
            semantic_similarity(reference, candidate),
        ),
    ])
}

fn token_set(text: &str) -> HashSet<String> {
    tokenize_words(text).into_iter().collect()
}

fn is_salient(token: &str, min_keyword_len: usize) -> bool {
    token.chars().count() >= min_keyword_len && !STOP_WORDS.contains(&token)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
