//! Challenge-page heuristic
//!
//! Looks for bot-challenge phrases near the top of a fetched body. A match
//! is only reported; the body is returned to the caller unchanged.

/// Number of leading bytes inspected
pub const INSPECT_BYTES: usize = 2048;

const CHALLENGE_PHRASES: &[&str] = &[
    "captcha",
    "are you a robot",
    "verify you're human",
    "recaptcha",
];

/// Returns the first challenge phrase found in the head of `body`
///
/// The inspected prefix is lowercased and its whitespace collapsed to
/// single spaces before matching.
///
/// # Example
///
/// ```
/// use polite_fetch::crawler::detect_captcha;
///
/// assert_eq!(detect_captcha("<h1>Are   you a\nROBOT?</h1>"), Some("are you a robot"));
/// assert_eq!(detect_captcha("<h1>Welcome</h1>"), None);
/// ```
pub fn detect_captcha(body: &str) -> Option<&'static str> {
    let normalized = normalize(head(body, INSPECT_BYTES));
    CHALLENGE_PHRASES
        .iter()
        .copied()
        .find(|phrase| normalized.contains(phrase))
}

fn head(body: &str, max_bytes: usize) -> &str {
    if body.len() <= max_bytes {
        return body;
    }
    let mut end = max_bytes;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
