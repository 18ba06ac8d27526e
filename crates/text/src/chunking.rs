use once_cell::sync::Lazy;
use regex::Regex;

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
pub const SENTENCE_SEPARATOR: &str = " ";

static DEFAULT_SENTENCE_SPLITTER: Lazy<SentenceSplitter> =
    Lazy::new(|| SentenceSplitter::new(r"[.!?](\s+)").expect("valid sentence boundary"));

/// Splits a paragraph into sentences at a configurable boundary.
///
/// The boundary pattern must capture the separator as group 1. Text matched
/// before the group stays attached to the preceding sentence and the group
/// itself is discarded.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    boundary: Regex,
}

impl SentenceSplitter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            boundary: Regex::new(pattern)?,
        })
    }

    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for captures in self.boundary.captures_iter(text) {
            let Some(separator) = captures.get(1) else {
                continue;
            };
            sentences.push(&text[start..separator.start()]);
            start = separator.end();
        }

        sentences.push(&text[start..]);
        sentences
    }

    /// Breaks a paragraph longer than `limit` into pieces of at most `limit` chars.
    pub fn split_oversized(&self, text: &str, limit: usize) -> Vec<String> {
        let limit = limit.max(1);
        let mut pieces = Vec::new();
        let mut current = Accumulator::default();

        for sentence in self.split(text) {
            let len = char_len(sentence);
            if len > limit {
                current.flush_into(&mut pieces);
                pieces.extend(
                    hard_split(sentence.trim(), limit)
                        .into_iter()
                        .filter_map(trimmed_piece),
                );
            } else if current.len() + len + SENTENCE_SEPARATOR.len() > limit {
                current.flush_into(&mut pieces);
                current.replace(sentence, len);
            } else {
                current.push(sentence, len, SENTENCE_SEPARATOR);
            }
        }

        current.flush_into(&mut pieces);
        pieces
    }

    /// Greedy paragraph packing with sentence and character fallbacks.
    pub fn chunk(&self, text: &str, limit: usize) -> Vec<String> {
        let limit = limit.max(1);
        let mut chunks = Vec::new();
        let mut current = Accumulator::default();

        for paragraph in text.split(PARAGRAPH_SEPARATOR) {
            let len = char_len(paragraph);
            if len > limit {
                current.flush_into(&mut chunks);
                chunks.extend(self.split_oversized(paragraph, limit));
            } else if current.len() + len + PARAGRAPH_SEPARATOR.len() > limit {
                current.flush_into(&mut chunks);
                current.replace(paragraph, len);
            } else {
                current.push(paragraph, len, PARAGRAPH_SEPARATOR);
            }
        }

        current.flush_into(&mut chunks);
        chunks
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        DEFAULT_SENTENCE_SPLITTER.clone()
    }
}

pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    DEFAULT_SENTENCE_SPLITTER.chunk(text, limit)
}

pub fn split_oversized(text: &str, limit: usize) -> Vec<String> {
    DEFAULT_SENTENCE_SPLITTER.split_oversized(text, limit)
}

/// Fixed-size slices of `limit` chars; the last slice may be shorter.
pub fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == limit {
            pieces.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        pieces.push(text[start..].to_string());
    }

    pieces
}

// Hard-split slices can start or end inside a whitespace run.
fn trimmed_piece(piece: String) -> Option<String> {
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == piece.len() {
        Some(piece)
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[derive(Debug, Default)]
struct Accumulator {
    text: String,
    chars: usize,
}

impl Accumulator {
    fn len(&self) -> usize {
        self.chars
    }

    fn push(&mut self, piece: &str, piece_len: usize, separator: &str) {
        if !self.text.is_empty() {
            self.text.push_str(separator);
            self.chars += separator.len();
        }
        self.text.push_str(piece);
        self.chars += piece_len;
    }

    fn replace(&mut self, piece: &str, piece_len: usize) {
        self.text.clear();
        self.text.push_str(piece);
        self.chars = piece_len;
    }

    // Whitespace-only accumulators are dropped rather than emitted as empty chunks.
    fn flush_into(&mut self, out: &mut Vec<String>) {
        let trimmed = self.text.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
        self.text.clear();
        self.chars = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;

    fn sample_document() -> String {
        let mut body = String::new();
        for idx in 0..40 {
            body.push_str(&format!(
                "Section {idx} opens here. It keeps going for a while! Does it end? "
            ));
            if idx % 3 == 0 {
                body.push_str(&"x".repeat(idx * 7));
            }
            if idx % 5 == 0 {
                body.push_str("\n\n\n");
            } else {
                body.push_str("\n\n");
            }
        }
        body
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("   \n\n  \n\n ", 10).is_empty());
    }

    #[test]
    fn every_chunk_respects_the_limit() {
        let doc = normalize(&sample_document());
        for limit in [1, 2, 7, 16, 33, 64, 150, 999] {
            let chunks = chunk_text(&doc, limit);
            assert!(!chunks.is_empty());
            for chunk in &chunks {
                assert!(!chunk.is_empty());
                assert!(
                    chunk.chars().count() <= limit,
                    "limit {limit} exceeded by {chunk:?}"
                );
            }
        }
    }

    #[test]
    fn zero_limit_does_not_panic() {
        let chunks = chunk_text("ab", 0);
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[test]
    fn half_limit_paragraphs_share_a_chunk() {
        let para = "p".repeat(49);
        let text = format!("{para}\n\n{para}");
        let chunks = chunk_text(&text, 100);
        assert_eq!(chunks, vec![text.clone()]);
    }

    #[test]
    fn exact_fit_stays_in_current_chunk() {
        let head = "h".repeat(50);

        let fits = format!("{head}\n\n{}", "f".repeat(48));
        assert_eq!(chunk_text(&fits, 100).len(), 1);

        let overflows = format!("{head}\n\n{}", "o".repeat(49));
        assert_eq!(
            chunk_text(&overflows, 100),
            vec![head.clone(), "o".repeat(49)]
        );
    }

    #[test]
    fn large_trailing_paragraph_starts_new_chunk() {
        let first = "a".repeat(100);
        let second = "b".repeat(100);
        let third = "c".repeat(19_850);
        let text = format!("{first}\n\n{second}\n\n{third}");

        let chunks = chunk_text(&text, 20_000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{first}\n\n{second}"));
        assert_eq!(chunks[1], third);
    }

    #[test]
    fn oversized_paragraph_is_emitted_on_its_own() {
        let text = "short\n\nThis sentence is long. Tiny.\n\nend";
        assert_eq!(
            chunk_text(text, 20),
            vec!["short", "This sentence is lon", "g.", "Tiny.", "end"]
        );
    }

    #[test]
    fn sentences_pack_greedily() {
        assert_eq!(
            split_oversized("One. Two! Three? Four", 10),
            vec!["One. Two!", "Three?", "Four"]
        );
        assert_eq!(split_oversized("abcde fghi", 10), vec!["abcde fghi"]);
    }

    #[test]
    fn hard_split_uses_fixed_slices() {
        let limit = 8;
        let token = "z".repeat(3 * limit);
        let pieces = split_oversized(&token, limit);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|piece| piece.chars().count() == limit));

        let ragged = hard_split(&"z".repeat(3 * limit + 1), limit);
        assert_eq!(ragged.len(), 4);
        assert_eq!(ragged[3], "z");
    }

    #[test]
    fn hard_split_pieces_are_trimmed_and_never_blank() {
        let chunks = chunk_text(&normalize("aaa\t\t\t\t\tbbb"), 2);
        assert_eq!(chunks, vec!["aa", "a", "bb", "b"]);

        let chunks = chunk_text(&normalize("head.\n\n\nxxxxxxxxxx yyyyyyyy"), 8);
        assert_eq!(chunks, vec!["head.", "xxxxxxxx", "xx yyyyy", "yyy"]);

        for chunk in chunk_text("  \t\t\t\t\t\t\tq\t\t\t\t\t\t  ", 3) {
            assert_eq!(chunk, chunk.trim());
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        assert_eq!(hard_split("ééééé", 2), vec!["éé", "éé", "é"]);
        assert!(hard_split("", 4).is_empty());
    }

    #[test]
    fn sentence_boundaries_keep_punctuation() {
        let splitter = SentenceSplitter::default();
        assert_eq!(
            splitter.split("Wait... what?  Yes"),
            vec!["Wait...", "what?", "Yes"]
        );
        assert_eq!(splitter.split("Done. "), vec!["Done.", ""]);
        assert_eq!(splitter.split("no boundary"), vec!["no boundary"]);
    }

    #[test]
    fn custom_sentence_boundary() {
        let splitter = SentenceSplitter::new(r";(\s+)").unwrap();
        assert_eq!(
            splitter.split_oversized("alpha; beta; gamma", 12),
            vec!["alpha; beta;", "gamma"]
        );
    }

    #[test]
    fn normalized_sample_fits_in_one_chunk() {
        let normalized = normalize("Hello. World this is ABC: test");
        assert_eq!(chunk_text(&normalized, 20_000), vec![normalized.clone()]);
    }

    #[test]
    fn chunks_rejoin_to_normalized_text() {
        let normalized = normalize("Alpha one. Beta two. Gamma three. Delta four.");
        let chunks = chunk_text(&normalized, 24);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join(PARAGRAPH_SEPARATOR), normalized);
    }
}
