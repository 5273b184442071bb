//! Greedy token-budget packing of blocks into chunks.

use super::tokens::TokenEstimator;

const JOINER: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedChunk {
    pub body: String,
    pub tokens: usize,
    /// True for slices cut out of a single oversized block.
    pub hard_split: bool,
}

/// Packs ordered blocks into chunks of at most `max_tokens`.
///
/// Blocks are never reordered and never cut unless a single block is larger
/// than the budget on its own. With `overlap_tokens > 0` the tail of each
/// flushed chunk seeds the next one.
pub struct Packer<'e> {
    estimator: &'e dyn TokenEstimator,
    max_tokens: usize,
    overlap_tokens: usize,
}

#[derive(Default)]
struct Accumulator {
    body: String,
    /// False while the body only holds an overlap seed.
    has_blocks: bool,
}

impl Accumulator {
    fn joined_with(&self, block: &str) -> String {
        if self.body.is_empty() {
            block.to_string()
        } else {
            format!("{}{JOINER}{block}", self.body)
        }
    }

    fn push(&mut self, block: &str) {
        if !self.body.is_empty() {
            self.body.push_str(JOINER);
        }
        self.body.push_str(block);
        self.has_blocks = true;
    }

    fn clear(&mut self) {
        self.body.clear();
        self.has_blocks = false;
    }
}

impl<'e> Packer<'e> {
    pub fn new(estimator: &'e dyn TokenEstimator, max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            estimator,
            max_tokens: max_tokens.max(1),
            overlap_tokens,
        }
    }

    pub fn pack(&self, blocks: &[&str]) -> Vec<PackedChunk> {
        let mut chunks = Vec::new();
        let mut acc = Accumulator::default();

        for &block in blocks {
            let block_tokens = self.estimator.estimate(block);

            if block_tokens > self.max_tokens {
                self.flush(&mut acc, &mut chunks);
                acc.clear();
                self.hard_split(block, &mut chunks);
                continue;
            }

            if !acc.body.is_empty() && self.over_budget(&acc.joined_with(block)) {
                if acc.has_blocks {
                    self.flush(&mut acc, &mut chunks);
                }
                // A seed that cannot sit next to the block is dropped.
                if !acc.body.is_empty() && self.over_budget(&acc.joined_with(block)) {
                    acc.clear();
                }
            }

            acc.push(block);
        }

        if acc.has_blocks {
            self.flush(&mut acc, &mut chunks);
        }
        chunks
    }

    fn over_budget(&self, candidate: &str) -> bool {
        self.estimator.estimate(candidate) > self.max_tokens
    }

    fn flush(&self, acc: &mut Accumulator, chunks: &mut Vec<PackedChunk>) {
        if !acc.has_blocks {
            acc.clear();
            return;
        }
        let body = std::mem::take(&mut acc.body);
        let seed = if self.overlap_tokens > 0 {
            overlap_tail(&body, self.estimator.chars_for(self.overlap_tokens)).to_string()
        } else {
            String::new()
        };
        chunks.push(PackedChunk {
            tokens: self.estimator.estimate(&body),
            body,
            hard_split: false,
        });
        acc.body = seed;
        acc.has_blocks = false;
    }

    fn hard_split(&self, block: &str, chunks: &mut Vec<PackedChunk>) {
        let width = self.estimator.chars_for(self.max_tokens).max(1);
        for slice in char_slices(block, width) {
            self.push_slice(slice, chunks);
        }
    }

    /// `chars_for` is only a guess for estimators that do not count
    /// characters; halve any slice that still estimates over budget.
    fn push_slice(&self, slice: &str, chunks: &mut Vec<PackedChunk>) {
        let len = slice.chars().count();
        if len > 1 && self.over_budget(slice) {
            for half in char_slices(slice, len.div_ceil(2)) {
                self.push_slice(half, chunks);
            }
            return;
        }
        chunks.push(PackedChunk {
            body: slice.to_string(),
            tokens: self.estimator.estimate(slice),
            hard_split: true,
        });
    }
}

/// Consecutive slices of `width` chars; concatenated they equal `text`.
fn char_slices(text: &str, width: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == width {
            slices.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        slices.push(&text[start..]);
    }
    slices
}

/// Trailing `chars` characters of `text`, moved forward to the next word
/// boundary when the cut lands mid-word.
fn overlap_tail(text: &str, chars: usize) -> &str {
    if chars == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= chars {
        return text.trim();
    }
    let Some((start, _)) = text.char_indices().nth(total - chars) else {
        return "";
    };
    let mut tail = &text[start..];
    let mid_word = !text[..start].ends_with(char::is_whitespace)
        && !tail.starts_with(char::is_whitespace);
    if mid_word {
        if let Some(ws) = tail.find(char::is_whitespace) {
            if !tail[ws..].trim().is_empty() {
                tail = &tail[ws..];
            }
        }
    }
    tail.trim()
}
