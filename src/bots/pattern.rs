//! Pattern compilation and state-conditioned matching
//!
//! A request template such as `remind me to $task at $time` compiles to an
//! anchored, case-insensitive expression with one greedy capture group per
//! placeholder. Matching walks a bot's table in order and returns the first
//! pattern whose request matches the segment and whose trigger state
//! interpolates to the bot's current state.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::template::{self, Segment};
use super::types::{MatchResult, Pattern, USER_NAME};

/// Upper bound on the compiled size of a single request matcher
const MATCHER_SIZE_LIMIT: usize = 1 << 20;

/// Errors compiling a pattern's request template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// `$` that does not introduce a valid `$name` or `${name}`
    #[error("malformed placeholder in request: {0:?}")]
    MalformedPlaceholder(String),

    /// The generated matcher could not be built
    #[error("invalid request matcher: {0}")]
    InvalidRegex(String),
}

/// A pattern with its request template compiled to a matcher
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: Pattern,
    matcher: Regex,
    variable_names: Vec<String>,
}

impl CompiledPattern {
    /// Compile a pattern's request template
    ///
    /// # Errors
    ///
    /// Returns error if the request has malformed placeholder syntax or the
    /// resulting matcher exceeds the size limit
    pub fn compile(pattern: Pattern) -> Result<Self, PatternError> {
        let request = template::normalize(&pattern.request);

        let mut expr = String::with_capacity(request.len() + 8);
        expr.push('^');
        let mut variable_names = Vec::new();

        for segment in template::segments(&request) {
            match segment {
                Segment::Literal(text) => {
                    if text.contains('$') {
                        return Err(PatternError::MalformedPlaceholder(pattern.request));
                    }
                    expr.push_str(&regex::escape(text));
                }
                Segment::Placeholder(name) => {
                    expr.push_str("(.+)");
                    variable_names.push(name.to_string());
                }
            }
        }
        expr.push('$');

        let matcher = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .size_limit(MATCHER_SIZE_LIMIT)
            .build()
            .map_err(|e| PatternError::InvalidRegex(e.to_string()))?;

        Ok(Self {
            pattern,
            matcher,
            variable_names,
        })
    }

    /// The source pattern
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Placeholder names, one per capture group
    #[must_use]
    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    /// Match a message segment, returning captured variables
    ///
    /// A placeholder used more than once must capture the same text
    /// (ignoring case) each time.
    #[must_use]
    pub fn captures(&self, segment: &str) -> Option<HashMap<String, String>> {
        let normalized = template::normalize(segment);
        let caps = self.matcher.captures(&normalized)?;

        let mut variables: HashMap<String, String> = HashMap::with_capacity(self.variable_names.len() + 2);
        for (i, name) in self.variable_names.iter().enumerate() {
            let value = caps.get(i + 1)?.as_str();
            match variables.get(name) {
                Some(existing) if !same_text(existing, value) => return None,
                Some(_) => {}
                None => {
                    variables.insert(name.clone(), value.to_string());
                }
            }
        }

        Some(variables)
    }

    /// Whether the trigger state admits `current_state`
    ///
    /// An empty trigger template matches every state.
    #[must_use]
    pub fn trigger_matches(
        &self,
        variables: &HashMap<String, String>,
        current_state: &str,
    ) -> bool {
        if self.pattern.trigger_state.is_empty() {
            return true;
        }
        template::interpolate(&self.pattern.trigger_state, variables) == current_state
    }
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Compile a bot's pattern table, dropping patterns that fail to compile
///
/// Invalid patterns are logged and skipped so the rest of the table still
/// matches. Order is preserved.
#[must_use]
pub fn compile_all(bot_id: &str, patterns: Vec<Pattern>) -> Vec<CompiledPattern> {
    let total = patterns.len();
    let compiled: Vec<_> = patterns
        .into_iter()
        .enumerate()
        .filter_map(|(index, p)| match CompiledPattern::compile(p) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::warn!(
                    bot = %bot_id,
                    index,
                    error = %e,
                    "invalid bot pattern, skipping"
                );
                None
            }
        })
        .collect();

    tracing::debug!(
        bot = %bot_id,
        total,
        compiled = compiled.len(),
        "compiled pattern table"
    );

    compiled
}

/// Find the first pattern matching `segment` in `current_state`
///
/// `USER_NAME` is bound to `user_name` before the trigger state is checked.
#[must_use]
pub fn match_patterns(
    compiled: &[CompiledPattern],
    segment: &str,
    current_state: &str,
    user_name: &str,
) -> Option<MatchResult> {
    compiled.iter().find_map(|candidate| {
        let mut variables = candidate.captures(segment)?;
        variables.insert(USER_NAME.to_string(), user_name.to_string());

        if !candidate.trigger_matches(&variables, current_state) {
            return None;
        }

        Some(MatchResult {
            pattern: candidate.pattern.clone(),
            variables,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(request: &str, trigger: &str, response: &str) -> Pattern {
        Pattern {
            request: request.to_string(),
            trigger_state: trigger.to_string(),
            response: response.to_string(),
            ..Default::default()
        }
    }

    fn compile(patterns: Vec<Pattern>) -> Vec<CompiledPattern> {
        compile_all("bot", patterns)
    }

    #[test]
    fn test_captures_placeholders_in_order() {
        let c = CompiledPattern::compile(pattern("remind me to $task at $time", "", "")).unwrap();
        assert_eq!(c.variable_names(), ["task", "time"]);

        let vars = c.captures("Remind me to buy milk at 5pm").unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["task"], "buy milk");
        assert_eq!(vars["time"], "5pm");
    }

    #[test]
    fn test_fixed_phrase_trigger() {
        let c = CompiledPattern::compile(pattern("echo status", "", "")).unwrap();
        assert!(c.variable_names().is_empty());
        assert!(c.captures("ECHO   status!").unwrap().is_empty());
        assert!(c.captures("echo status please").is_none());
    }

    #[test]
    fn test_literals_are_escaped() {
        let c = CompiledPattern::compile(pattern("calc 1+1 * $x", "", "")).unwrap();
        assert_eq!(c.captures("calc 1+1 * two").unwrap()["x"], "two");
        assert!(c.captures("calc 11 two").is_none());
    }

    #[test]
    fn test_punctuation_differences_ignored() {
        let c = CompiledPattern::compile(pattern("hello, bot!", "", "")).unwrap();
        assert!(c.captures("hello bot").is_some());
        assert!(c.captures("Hello...  bot?").is_some());
    }

    #[test]
    fn test_repeated_placeholder_must_agree() {
        let c = CompiledPattern::compile(pattern("$a and $a", "", "")).unwrap();
        let vars = c.captures("tea and TEA").unwrap();
        assert_eq!(vars.len(), 1);
        assert!(c.captures("tea and coffee").is_none());
    }

    #[test]
    fn test_malformed_placeholder_rejected() {
        let err = CompiledPattern::compile(pattern("pay $5 to ${who", "", "")).unwrap_err();
        assert!(matches!(err, PatternError::MalformedPlaceholder(_)));

        let err = CompiledPattern::compile(pattern("cost $", "", "")).unwrap_err();
        assert!(matches!(err, PatternError::MalformedPlaceholder(_)));
    }

    #[test]
    fn test_malformed_pattern_skipped_in_table() {
        let compiled = compile(vec![
            pattern("echo ${msg", "", "broken"),
            pattern("echo $msg", "", "works"),
        ]);
        assert_eq!(compiled.len(), 1);

        let result = match_patterns(&compiled, "echo hi", "0", "alice").unwrap();
        assert_eq!(result.pattern.response, "works");
    }

    #[test]
    fn test_first_match_wins() {
        let compiled = compile(vec![
            pattern("echo $msg", "", "first"),
            pattern("echo $msg", "", "second"),
        ]);
        let result = match_patterns(&compiled, "echo hello", "0", "alice").unwrap();
        assert_eq!(result.pattern.response, "first");
    }

    #[test]
    fn test_trigger_state_gates_pattern() {
        let compiled = compile(vec![
            pattern("yes", "asked", "confirmed"),
            pattern("yes", "", "nothing to confirm"),
        ]);

        let result = match_patterns(&compiled, "yes", "asked", "alice").unwrap();
        assert_eq!(result.pattern.response, "confirmed");

        let result = match_patterns(&compiled, "yes", "0", "alice").unwrap();
        assert_eq!(result.pattern.response, "nothing to confirm");
    }

    #[test]
    fn test_trigger_state_interpolates_variables() {
        let compiled = compile(vec![pattern("answer $n", "q$n", "ok")]);
        assert!(match_patterns(&compiled, "answer 3", "q3", "alice").is_some());
        assert!(match_patterns(&compiled, "answer 3", "q4", "alice").is_none());

        let compiled = compile(vec![pattern("hi", "$USER_NAME", "hello again")]);
        assert!(match_patterns(&compiled, "hi", "alice", "alice").is_some());
        assert!(match_patterns(&compiled, "hi", "alice", "bob").is_none());
    }

    #[test]
    fn test_user_name_reserved_variable() {
        let compiled = compile(vec![pattern("echo $msg", "", "")]);
        let result = match_patterns(&compiled, "echo hey", "0", "alice").unwrap();
        assert_eq!(result.variables.len(), 2);
        assert_eq!(result.variables[USER_NAME], "alice");
    }

    #[test]
    fn test_empty_table_never_matches() {
        assert!(match_patterns(&[], "anything", "0", "alice").is_none());
    }
}
