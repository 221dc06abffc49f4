//! Plain-text line and paragraph splitting under a token budget.
//!
//! Lines over budget are cut recursively at the separator closest to their
//! middle, trying coarser separators first. Lines are then packed into
//! paragraphs, and each paragraph is extended with the opening of the next
//! one as overlap.
//!
//! The tail-balancing step of [`split_paragraphs`] sizes the merge by
//! whitespace-separated words rather than tokens, so a merged final paragraph
//! can exceed the budget. Callers re-check the output.

use super::tokenizer::Tokenizer;

/// Separator classes, coarsest first.
const SEPARATORS: &[&[char]] = &[
    &['\n', '\r'],
    &['.', '?', '!'],
    &[';'],
    &[':'],
    &[','],
    &[')', ']', '}'],
    &[' '],
    &['-'],
];

/// Split `text` into pieces of at most `max_tokens` tokens, trimming each
/// piece and dropping empty ones.
pub fn split_lines(text: &str, max_tokens: usize, tokenizer: &dyn Tokenizer) -> Vec<String> {
    let mut pieces = Vec::new();
    split_to_budget(text, max_tokens.max(1), tokenizer, 0, &mut pieces);
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_to_budget<'a>(
    text: &'a str,
    max_tokens: usize,
    tokenizer: &dyn Tokenizer,
    level: usize,
    out: &mut Vec<&'a str>,
) {
    if text.is_empty() {
        return;
    }
    if tokenizer.count(text) <= max_tokens {
        out.push(text);
        return;
    }

    for (offset, separators) in SEPARATORS.iter().enumerate().skip(level) {
        if let Some(cut) = cut_near_middle(text, separators) {
            let (first, second) = text.split_at(cut);
            split_to_budget(first, max_tokens, tokenizer, offset, out);
            split_to_budget(second, max_tokens, tokenizer, offset, out);
            return;
        }
    }

    match char_midpoint(text) {
        Some(cut) => {
            let (first, second) = text.split_at(cut);
            split_to_budget(first, max_tokens, tokenizer, SEPARATORS.len(), out);
            split_to_budget(second, max_tokens, tokenizer, SEPARATORS.len(), out);
        }
        // A single character over budget cannot be split further.
        None => out.push(text),
    }
}

/// Byte offset just past the separator nearest the middle of `text`.
/// The last character is never a cut point, so both halves are non-empty.
fn cut_near_middle(text: &str, separators: &[char]) -> Option<usize> {
    let half = text.len() / 2;
    let last = text.char_indices().next_back().map_or(0, |(i, _)| i);

    text.char_indices()
        .take_while(|(i, _)| *i < last)
        .filter(|(_, c)| separators.contains(c))
        .min_by_key(|(i, _)| i.abs_diff(half))
        .map(|(i, c)| i + c.len_utf8())
}

fn char_midpoint(text: &str) -> Option<usize> {
    let chars = text.chars().count();
    if chars < 2 {
        return None;
    }
    text.char_indices().nth(chars / 2).map(|(i, _)| i)
}

/// Pack `lines` into paragraphs that fit `max_tokens` once `chunk_header` is
/// prepended, each followed by up to `overlap_tokens` from the next paragraph.
///
/// Returned paragraphs do not include the header.
pub fn split_paragraphs(
    lines: &[String],
    max_tokens: usize,
    overlap_tokens: usize,
    chunk_header: &str,
    tokenizer: &dyn Tokenizer,
) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }

    let header_tokens = tokenizer.count(chunk_header);
    let content_budget = max_tokens
        .saturating_sub(overlap_tokens + header_tokens)
        .max(1);

    let mut truncated = Vec::with_capacity(lines.len());
    for line in lines {
        split_to_budget(line, content_budget, tokenizer, 0, &mut truncated);
    }

    let mut paragraphs = build_paragraphs(&truncated, content_budget, tokenizer);
    balance_tail(&mut paragraphs, content_budget, tokenizer);

    let mut result = Vec::with_capacity(paragraphs.len());
    for (i, paragraph) in paragraphs.iter().enumerate() {
        let mut text = paragraph.clone();
        if overlap_tokens > 0
            && let Some(next) = paragraphs.get(i + 1)
        {
            let mut pieces = Vec::new();
            split_to_budget(next, overlap_tokens, tokenizer, 0, &mut pieces);
            if let Some(first) = pieces.first().map(|piece| piece.trim())
                && !first.is_empty()
            {
                text.push(' ');
                text.push_str(first);
            }
        }
        result.push(text);
    }
    result
}

fn build_paragraphs(lines: &[&str], max_tokens: usize, tokenizer: &dyn Tokenizer) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in lines {
        if !current.is_empty() {
            let mut tokens = tokenizer.count(line) + 1;
            if tokens < max_tokens {
                tokens += tokenizer.count(&current);
            }
            if tokens >= max_tokens {
                paragraphs.push(current.trim().to_string());
                current.clear();
            }
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    paragraphs.retain(|p| !p.is_empty());
    paragraphs
}

/// Fold a short final paragraph into the one before it.
fn balance_tail(paragraphs: &mut Vec<String>, max_tokens: usize, tokenizer: &dyn Tokenizer) {
    let n = paragraphs.len();
    if n < 2 || tokenizer.count(&paragraphs[n - 1]) >= max_tokens / 4 {
        return;
    }

    let last: Vec<&str> = paragraphs[n - 1].split(' ').filter(|w| !w.is_empty()).collect();
    let second: Vec<&str> = paragraphs[n - 2].split(' ').filter(|w| !w.is_empty()).collect();
    if last.len() + second.len() <= max_tokens {
        let merged = format!("{} {}", second.join(" "), last.join(" "));
        paragraphs[n - 2] = merged;
        paragraphs.pop();
    }
}
