//! `@name` mention scanning

use std::sync::LazyLock;

use regex::Regex;

use super::types::Bot;

/// `@name` at the start of the text or after a non-word character
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w@])@(\w+(?:[.\-]\w+)*)").expect("valid regex")
});

/// A mention found in a post
#[derive(Debug, Clone)]
pub struct Mention {
    /// Follower the name resolved to, if any
    pub bot: Option<Bot>,
    /// Name as written after `@`
    pub name: String,
    /// Mention text without the sigil, up to the next mention
    pub segment: String,
}

/// Scan post text for mentions of the group's bot followers
///
/// Every mention is returned in text order, including names that match no
/// follower (with `bot: None`), so positions line up with the raw mentions.
#[must_use]
pub fn scan(text: &str, followers: &[Bot]) -> Vec<Mention> {
    let spans: Vec<(usize, &str)> = MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| (name.start(), name.as_str()))
        .collect();

    spans
        .iter()
        .enumerate()
        .map(|(i, &(start, name))| {
            // the next mention's `@` ends this segment
            let end = spans.get(i + 1).map_or(text.len(), |&(next, _)| next - 1);
            Mention {
                bot: find_follower(followers, name).cloned(),
                name: name.to_string(),
                segment: text[start..end].trim().to_string(),
            }
        })
        .collect()
}

fn find_follower<'a>(followers: &'a [Bot], name: &str) -> Option<&'a Bot> {
    let wanted = name.to_lowercase();
    followers
        .iter()
        .find(|bot| bot.user_name.to_lowercase() == wanted)
}
