use unicode_segmentation::UnicodeSegmentation;

use crate::config::ProcessingConfig;

/// A contiguous slice of the source text. Chunks never overlap, so
/// joining them back with single spaces reproduces the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of the chunk's first character in the source text.
    pub start_index: usize,
    pub token_estimate: usize,
}

/// Splits page text on sentence boundaries and packs whole sentences
/// into chunks up to a token budget. Sentences are never split; a
/// sentence larger than the budget becomes a chunk of its own.
pub struct ContentChunker {
    token_limit: usize,
}

struct Sentence {
    text: String,
    start: usize,
}

impl ContentChunker {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            token_limit: config.chunk_token_limit,
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let sentences = split_into_sentences(text);
        self.pack(sentences)
    }

    fn pack(&self, sentences: Vec<Sentence>) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_start = 0;

        for sentence in sentences {
            let joined_len = if current.is_empty() {
                sentence.text.len()
            } else {
                current.len() + 1 + sentence.text.len()
            };

            if estimate_tokens_for_len(joined_len) > self.token_limit && !current.is_empty() {
                chunks.push(Chunk {
                    token_estimate: estimate_tokens(&current),
                    text: std::mem::take(&mut current),
                    start_index: current_start,
                });
            }

            if current.is_empty() {
                current_start = sentence.start;
                current = sentence.text;
            } else {
                current.push(' ');
                current.push_str(&sentence.text);
            }
        }

        if !current.is_empty() {
            chunks.push(Chunk {
                token_estimate: estimate_tokens(&current),
                text: current,
                start_index: current_start,
            });
        }

        chunks
    }
}

fn split_into_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut current_start = None;
    let mut offset = 0;

    let mut graphemes = text.graphemes(true).peekable();
    while let Some(grapheme) = graphemes.next() {
        if current.is_empty() && grapheme.trim().is_empty() {
            offset += grapheme.len();
            continue;
        }
        if current.is_empty() {
            current_start = Some(offset);
        }
        current.push_str(grapheme);
        offset += grapheme.len();

        if is_sentence_boundary(&current, graphemes.peek().copied()) {
            let trimmed = current.trim_end();
            if !trimmed.is_empty() {
                sentences.push(Sentence {
                    text: trimmed.to_string(),
                    start: current_start.unwrap_or(0),
                });
            }
            current.clear();
            current_start = None;
        }
    }

    let trimmed = current.trim_end();
    if !trimmed.is_empty() {
        sentences.push(Sentence {
            text: trimmed.to_string(),
            start: current_start.unwrap_or(0),
        });
    }

    sentences
}

fn is_sentence_boundary(text: &str, next: Option<&str>) -> bool {
    if text.ends_with('\n') {
        return !text.trim_end().is_empty();
    }

    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return false;
    }

    let Some(last_char) = trimmed.chars().last() else {
        return false;
    };

    if !matches!(last_char, '.' | '!' | '?') {
        return false;
    }

    // A terminator inside a token ("3.5", "v1.2", "example.com") ends
    // nothing; the sentence only closes when whitespace or end of text
    // follows.
    if let Some(following) = next {
        if !following.chars().all(char::is_whitespace) {
            return false;
        }
    }

    if let Some(last_word) = trimmed.split_whitespace().last() {
        let abbreviations = [
            "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "vs.", "etc.", "i.e.", "e.g.",
            "Inc.", "Ltd.", "Corp.", "Co.", "No.", "Vol.", "Ch.", "Fig.", "Eq.", "Sec.",
        ];
        if abbreviations.contains(&last_word) {
            return false;
        }
    }

    true
}

fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_for_len(text.len())
}

fn estimate_tokens_for_len(len: usize) -> usize {
    (len as f32 / 4.0).ceil() as usize
}
