//! Recursive character text splitting with overlap

use std::collections::VecDeque;

/// Separators tried in order: paragraphs, lines, words, characters
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on the coarsest separator that occurs in it, recursing into
/// pieces that are still too long, then greedily merges pieces back into
/// chunks of at most `chunk_size` characters that share up to
/// `chunk_overlap` characters with their predecessor.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Characters carried over from the previous chunk
    chunk_overlap: usize,
    /// Separators, coarsest first
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    /// Create a splitter with the default separators
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();

        // First separator present in the text wins; "" always matches
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut short_pieces: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                short_pieces.push(piece);
                continue;
            }

            if !short_pieces.is_empty() {
                chunks.extend(self.merge_pieces(&short_pieces));
                short_pieces.clear();
            }

            if finer.is_empty() {
                if let Some(chunk) = trimmed(piece) {
                    chunks.push(chunk);
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !short_pieces.is_empty() {
            chunks.extend(self.merge_pieces(&short_pieces));
        }

        chunks
    }

    /// Greedily merge pieces into chunks, carrying an overlapping tail
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of {} characters, longer than the {} limit",
                        total,
                        self.chunk_size
                    );
                }

                if let Some(chunk) = join_window(&window) {
                    chunks.push(chunk);
                }

                // Drop from the front until only the overlap remains and the next piece fits
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            chunks.push(chunk);
        }

        chunks
    }
}

/// Split before every occurrence of `separator` so each piece after the
/// first starts with it. The empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    trimmed(&joined)
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
