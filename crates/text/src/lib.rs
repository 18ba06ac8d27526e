mod chunking;
mod normalize;

pub use chunking::{
    chunk_text, hard_split, split_oversized, SentenceSplitter, PARAGRAPH_SEPARATOR,
    SENTENCE_SEPARATOR,
};
pub use normalize::{normalize, Normalizer, RewriteRule};

/// Normalizes raw extracted text and splits it into chunks of at most `limit` chars.
///
/// Returns the normalized text alongside the chunks so callers can report its length.
pub fn normalize_and_chunk(raw: &str, limit: usize) -> (String, Vec<String>) {
    let normalized = normalize(raw);
    let chunks = chunk_text(&normalized, limit);
    (normalized, chunks)
}
