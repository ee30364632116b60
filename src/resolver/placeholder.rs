//! `${path}` and `${path:default}` tokens inside string leaves.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Non-greedy, so one leaf may hold several tokens.
static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(.*?)\}").expect("PLACEHOLDER_REGEX should be a valid regex pattern")
});

/// The inside of one `${...}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub path: &'a str,
    pub default: Option<&'a str>,
}

impl<'a> Placeholder<'a> {
    /// Split on the first `:`; the default keeps any later colons.
    pub fn parse(inner: &'a str) -> Self {
        match inner.split_once(':') {
            Some((path, default)) => Self { path, default: Some(default) },
            None => Self { path: inner, default: None },
        }
    }
}

/// Whether `text` holds at least one token.
pub fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(text)
}

/// Replace every token in `text`.
///
/// `lookup` is asked for the token's path first. When it has nothing the
/// default is used, and a token without a default is kept verbatim.
pub fn substitute<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    PLACEHOLDER_REGEX
        .replace_all(text, |caps: &Captures<'_>| {
            let placeholder = Placeholder::parse(&caps[1]);
            lookup(placeholder.path)
                .or_else(|| placeholder.default.map(str::to_string))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
