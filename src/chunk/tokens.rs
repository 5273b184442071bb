/// Rough characters-per-token ratio for English prose.
pub const CHARS_PER_TOKEN: usize = 4;

/// Token counting strategy used by the packer.
///
/// Only `estimate` is required. `chars_for` sizes hard-split slices and
/// overlap windows; override it when the estimator is not char based. The
/// packer halves any hard-split slice that `estimate` still puts over
/// budget, so a rough `chars_for` costs extra slices, never oversize ones.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;

    fn chars_for(&self, tokens: usize) -> usize {
        tokens.saturating_mul(CHARS_PER_TOKEN)
    }
}

/// `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone, Copy)]
pub struct CharEstimator {
    pub chars_per_token: usize,
}

impl Default for CharEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: CHARS_PER_TOKEN,
        }
    }
}

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token.max(1))
    }

    fn chars_for(&self, tokens: usize) -> usize {
        tokens.saturating_mul(self.chars_per_token.max(1))
    }
}
