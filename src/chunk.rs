//! Recursive-boundary text chunker with trailing-context overlap.
//!
//! Splits page-level document text into [`Chunk`]s of at most `chunk_size`
//! chars. Splitting tries paragraph breaks first, then line breaks, then
//! spaces, then fixed char windows, always choosing the coarsest separator
//! that keeps each fragment within budget. When a chunk is flushed, the
//! trailing fragments totalling at most `chunk_overlap` chars are carried
//! into the start of the next chunk so context survives the cut.
//!
//! Splitting is deterministic and side-effect free. Lengths are measured in
//! chars, not bytes, so multi-byte text never splits inside a code point.

use std::collections::VecDeque;

use crate::models::{Chunk, DocumentPage};

/// Separator ladder, coarsest first. Text with no usable separator falls
/// through to fixed char windows.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split extracted pages into chunks, preserving per-chunk source and page
/// provenance. `seq` is continuous across pages of the same document.
/// Empty input produces empty output, never an error.
pub fn split_pages(
    source: &str,
    pages: &[DocumentPage],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut seq = 0usize;

    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        for text in split_text(&page.text, chunk_size, chunk_overlap) {
            chunks.push(Chunk {
                text,
                source: source.to_string(),
                page: page.page,
                seq,
            });
            seq += 1;
        }
    }

    chunks
}

/// Split a single text into pieces of at most `chunk_size` chars.
///
/// Chunk boundaries never coincide with page or document boundaries here;
/// callers split per page and overlap applies only within one page.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let fragments = fragment(text, chunk_size, chunk_overlap, &SEPARATORS);
    merge(fragments, chunk_size, chunk_overlap)
}

/// Recursively cut `text` into fragments of at most `max` chars.
///
/// Separators stay attached to the fragment they terminate, so concatenating
/// the fragments reproduces the input exactly and no characters are dropped.
fn fragment(text: &str, max: usize, overlap: usize, seps: &[&str]) -> Vec<String> {
    if char_len(text) <= max {
        return vec![text.to_string()];
    }

    match seps.first() {
        None => hard_windows(text, max, overlap),
        Some(sep) => {
            let mut out = Vec::new();
            for part in text.split_inclusive(*sep) {
                if char_len(part) <= max {
                    out.push(part.to_string());
                } else {
                    out.extend(fragment(part, max, overlap, &seps[1..]));
                }
            }
            out
        }
    }
}

/// Last-resort split for separator-free text: fixed windows of `max` chars
/// advancing by `max - overlap`, so adjacent windows share `overlap` chars.
fn hard_windows(text: &str, max: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = max.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + max).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    out
}

/// Greedily pack fragments into chunks of at most `max` chars. On flush,
/// trailing fragments totalling at most `overlap` chars are kept as the
/// start of the next chunk. Fragments larger than `overlap` are never
/// duplicated, which keeps boundaries stable for coarse fragments.
fn merge(fragments: Vec<String>, max: usize, overlap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut window: VecDeque<(String, usize)> = VecDeque::new();
    let mut total = 0usize;

    for frag in fragments {
        let len = char_len(&frag);

        if total + len > max && !window.is_empty() {
            flush(&mut out, &window);
            while total > overlap || (total + len > max && total > 0) {
                let (_, popped) = window.pop_front().expect("window is non-empty");
                total -= popped;
            }
        }

        total += len;
        window.push_back((frag, len));
    }

    if !window.is_empty() {
        flush(&mut out, &window);
    }

    out
}

fn flush(out: &mut Vec<String>, window: &VecDeque<(String, usize)>) {
    let text: String = window.iter().map(|(frag, _)| frag.as_str()).collect();
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
