use sha2::{Digest, Sha256};

pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Lower-cased word tokens; anything that is not a letter or digit separates words.
pub fn tokenize_words(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Hashed bag-of-words plus adjacent-word-pair embedding, scaled to unit length. Text without
/// word tokens embeds to the zero vector.
pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0_f32; dimensions.max(8)];
    let buckets = vector.len() as u64;

    for feature in text_features(payload) {
        let hash = stable_hash(&feature);
        let bucket = (hash % buckets) as usize;
        let magnitude = 1.0 + ((hash >> 40) & 0xFF) as f32 / 255.0;
        vector[bucket] += if hash >> 63 == 0 { magnitude } else { -magnitude };
    }

    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
    vector
}

/// Dot product of two unit vectors; 0 for empty or mismatched input.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }

    left.iter()
        .zip(right)
        .fold(0.0_f64, |acc, (a, b)| acc + f64::from(*a) * f64::from(*b))
}

fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    digest[..8]
        .iter()
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

fn text_features(payload: &str) -> Vec<String> {
    let words = tokenize_words(payload);
    let pairs = words
        .windows(2)
        .map(|pair| format!("pair:{} {}", pair[0], pair[1]));

    words
        .iter()
        .map(|word| format!("word:{word}"))
        .chain(pairs)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_words_splits_punctuation_and_keeps_accented_letters() {
        assert_eq!(
            tokenize_words("Python es un lenguaje interpretado, de alto-nivel. ¿Qué?"),
            vec![
                "python",
                "es",
                "un",
                "lenguaje",
                "interpretado",
                "de",
                "alto",
                "nivel",
                "qué"
            ]
        );
        assert!(tokenize_words("  ... !!").is_empty());
    }

    #[test]
    fn embedding_is_deterministic_and_unit_length() {
        let first = embed_text_local("Docker runs applications in containers", 64);
        let second = embed_text_local("Docker runs applications in containers", 64);
        assert_eq!(first, second);

        let norm = first
            .iter()
            .map(|value| f64::from(*value) * f64::from(*value))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "unexpected norm: {norm}");
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let vector = embed_text_local("", 32);
        assert_eq!(vector.len(), 32);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn cosine_similarity_rejects_mismatched_dimensions() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
