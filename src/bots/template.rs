//! Template normalization and `$variable` interpolation

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `$name` or `${name}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("valid regex")
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Punctuation flattened to whitespace before matching
const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']'];

/// A piece of a tokenized template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text
    Literal(&'a str),
    /// Placeholder name
    Placeholder(&'a str),
}

/// Flatten punctuation and collapse whitespace runs
#[must_use]
pub fn normalize(text: &str) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();
    WHITESPACE.replace_all(&flattened, " ").trim().to_string()
}

/// Split a template into literal runs and placeholders
#[must_use]
pub fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            out.push(Segment::Literal(&template[last..whole.start()]));
        }
        out.push(Segment::Placeholder(placeholder_name(&caps)));
        last = whole.end();
    }

    if last < template.len() {
        out.push(Segment::Literal(&template[last..]));
    }

    out
}

/// Placeholder names in occurrence order
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| placeholder_name(&caps))
        .collect()
}

/// Substitute placeholders from `variables`
///
/// Unknown variables expand to the empty string. A `$` that does not start
/// a placeholder is kept as-is.
#[must_use]
pub fn interpolate(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            variables
                .get(placeholder_name(caps))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}

fn placeholder_name<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  hello \t\n  world  "), "hello world");
    }

    #[test]
    fn test_normalize_flattens_punctuation() {
        assert_eq!(normalize("Hello, world!"), "Hello world");
        assert_eq!(normalize("what's up?"), "what s up");
        assert_eq!(normalize("a,b"), "a b");
    }

    #[test]
    fn test_normalize_keeps_placeholder_syntax() {
        assert_eq!(normalize("echo ${msg}."), "echo ${msg}");
        assert_eq!(normalize("echo $msg!"), "echo $msg");
    }

    #[test]
    fn test_interpolate_without_placeholders_is_identity() {
        let template = "Nothing to see: 100% plain, $ 5.";
        assert_eq!(interpolate(template, &vars(&[("msg", "x")])), template);
    }

    #[test]
    fn test_interpolate_both_syntaxes() {
        let v = vars(&[("msg", "hi"), ("USER_NAME", "alice")]);
        assert_eq!(interpolate("$USER_NAME said ${msg}!", &v), "alice said hi!");
        assert_eq!(interpolate("${msg}there", &v), "hithere");
    }

    #[test]
    fn test_interpolate_unknown_is_empty() {
        let v = vars(&[]);
        assert_eq!(
            interpolate("Remote said: $REMOTE_RESPONSE", &v),
            "Remote said: "
        );
    }

    #[test]
    fn test_placeholder_name_is_longest_identifier() {
        let v = vars(&[("msg", "short")]);
        assert_eq!(interpolate("$msgs", &v), "");
        assert_eq!(placeholders("$msgs and ${msg}s"), vec!["msgs", "msg"]);
    }

    #[test]
    fn test_segments() {
        assert_eq!(
            segments("echo $msg to ${who}"),
            vec![
                Segment::Literal("echo "),
                Segment::Placeholder("msg"),
                Segment::Literal(" to "),
                Segment::Placeholder("who"),
            ]
        );
        assert_eq!(segments("hi"), vec![Segment::Literal("hi")]);
        assert!(segments("").is_empty());
    }
}
