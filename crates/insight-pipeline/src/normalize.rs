//! Cleanup of raw scraped text before it is embedded or stored.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z][a-z0-9+.\-]*://\S+|\bwww\.\S+").expect("valid regex")
});
// `\B@` skips e-mail addresses: an `@` directly after a word character is not a mention.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B@\w+").expect("valid regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid regex")
});

/// Normalize raw feedback text.
///
/// Decodes HTML entities, strips URL-like tokens and `@mentions`, collapses
/// every whitespace run (newlines included) to a single space and trims the
/// ends. `None` yields an empty string. Never fails.
#[must_use]
pub fn normalize(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let decoded = decode_html_entities(text);
    let without_urls = URL_RE.replace_all(&decoded, " ");
    let without_mentions = MENTION_RE.replace_all(&without_urls, " ");

    without_mentions
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode named and numeric HTML character references in a single pass.
///
/// Unknown named entities and invalid code points are left untouched.
fn decode_html_entities(value: &str) -> String {
    ENTITY_RE
        .replace_all(value, |caps: &Captures<'_>| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "euro" => '\u{20ac}',
        "pound" => '\u{a3}',
        "rupee" | "inr" => '\u{20b9}',
        _ => return None,
    };
    Some(c)
}
