/// Characters per estimated token. Fixed: downstream datasets were built with it.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Estimate the token count of a piece of text.
///
/// `ceil(chars / 3.5)` over Unicode scalar values, so the estimate is stable
/// regardless of how the text is encoded.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

/// Same estimate for a known character count.
///
/// ceil(n / 3.5) == ceil(2n / 7), done in integers to avoid float rounding.
pub fn tokens_for_chars(chars: usize) -> usize {
    (chars * 2).div_ceil(7)
}
