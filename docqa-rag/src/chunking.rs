//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text by a prioritized list of literal separators (paragraph, line,
//! sentence punctuation, space, and finally single characters), greedily packs
//! the pieces into chunks of at most `chunk_size` characters, and seeds each
//! chunk with the trailing `chunk_overlap` characters of the previous one.
//! Every chunk is a contiguous slice of the trimmed input, so a separator's
//! whitespace stays at the end of the chunk it closes.
//!
//! All sizes are counted in characters (Unicode scalar values), never bytes.

use crate::config::{RagConfig, default_separators, validate_sizing};
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting text into retrieval-sized pieces.
pub trait Chunker: Send + Sync {
    /// Split text into ordered chunk texts. Empty input yields an empty `Vec`.
    fn split(&self, text: &str) -> Vec<String>;

    /// Split a document into [`Chunk`]s numbered from zero.
    ///
    /// Chunk IDs are generated as `{source}_{sequence}`.
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let source = &document.metadata.source;
        self.split(&document.content)
            .into_iter()
            .enumerate()
            .map(|(sequence, text)| Chunk::new(source, sequence, text))
            .collect()
    }
}

/// Splits text recursively by separator priority with character overlap.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(2000, 400, ["\n\n", "\n", " ", ""])?;
/// let pieces = chunker.split(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationError`](crate::RagError::ConfigurationError)
    /// if `chunk_overlap >= chunk_size` or `chunk_size == 0`.
    pub fn new<I, S>(chunk_size: usize, chunk_overlap: usize, separators: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_sizing(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: separators.into_iter().map(Into::into).collect(),
        })
    }

    /// Create a chunker with the default separator list.
    pub fn with_default_separators(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::new(chunk_size, chunk_overlap, default_separators())
    }

    /// Create a chunker from the chunking fields of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, config.separators.iter().cloned())
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        split_and_merge(text, self.chunk_size, self.chunk_overlap, &self.separators)
    }
}

/// A chunker that only breaks on blank lines, falling back to characters for
/// oversized paragraphs.
pub fn paragraph_chunker(chunk_size: usize, chunk_overlap: usize) -> Result<RecursiveChunker> {
    RecursiveChunker::new(chunk_size, chunk_overlap, ["\n\n"])
}

/// Split `text` with the given sizing and separator priority list.
///
/// # Errors
///
/// Returns [`RagError::ConfigurationError`](crate::RagError::ConfigurationError)
/// if `chunk_overlap >= chunk_size` or `chunk_size == 0`.
pub fn split_text<S: AsRef<str>>(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[S],
) -> Result<Vec<String>> {
    validate_sizing(chunk_size, chunk_overlap)?;
    Ok(split_and_merge(text, chunk_size, chunk_overlap, separators))
}

fn split_and_merge<S: AsRef<str>>(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[S],
) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    // A piece must fit next to a full overlap seed, so that every chunk stays
    // within `chunk_size` and still starts with the previous chunk's tail.
    let piece_limit = chunk_size - chunk_overlap;
    let mut pieces = Vec::new();
    collect_pieces(text, piece_limit, separators, &mut pieces);
    merge_pieces(text, &pieces, chunk_size, chunk_overlap)
}

/// Break `text` into pieces of at most `limit` characters, using the first
/// separator that occurs and recursing into oversized pieces with the rest.
fn collect_pieces<'a, S: AsRef<str>>(
    text: &'a str,
    limit: usize,
    separators: &[S],
    pieces: &mut Vec<&'a str>,
) {
    let chosen = separators.iter().position(|sep| {
        let sep = sep.as_ref();
        sep.is_empty() || text.contains(sep)
    });

    let Some(index) = chosen else {
        split_chars(text, pieces);
        return;
    };
    let separator = separators[index].as_ref();
    if separator.is_empty() {
        split_chars(text, pieces);
        return;
    }

    let remaining = &separators[index + 1..];
    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) <= limit {
            pieces.push(piece);
        } else {
            collect_pieces(piece, limit, remaining, pieces);
        }
    }
}

/// Greedily pack pieces into chunks, seeding each new chunk with the tail of
/// the previous one.
///
/// `pieces` must tile `text` in order. Every chunk is then a slice of `text`:
/// a chunk ends on a piece boundary and the next one starts `chunk_overlap`
/// characters before that boundary, whitespace included.
fn merge_pieces(
    text: &str,
    pieces: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let mut chunks = Vec::new();
    // Byte range of the open chunk and its length in characters.
    let mut start = 0;
    let mut end = 0;
    let mut open_len = 0;

    for piece in pieces {
        let piece_len = char_len(piece);
        if open_len + piece_len > chunk_size && end > start {
            let closed = &text[start..end];
            push_chunk(&mut chunks, closed);
            let seed = tail_chars(closed, chunk_overlap);
            start = end - seed.len();
            open_len = char_len(seed);
        }
        end += piece.len();
        open_len += piece_len;
    }

    if end > start {
        push_chunk(&mut chunks, &text[start..end]);
    }
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, chunk: &str) {
    if !chunk.trim().is_empty() {
        chunks.push(chunk.to_string());
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn split_chars<'a>(text: &'a str, pieces: &mut Vec<&'a str>) {
    pieces.extend(text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]));
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it if shorter).
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}
