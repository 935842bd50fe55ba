//! Callback authentication tags
//!
//! A tag is `hex(sha256(secret ‖ timestamp ‖ message)) + ":" + timestamp`.
//! The receiver knows the bot token, reads the timestamp after the
//! separator, recomputes the digest and decides how old a tag may be.

use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Separator between digest and timestamp
pub const TAG_SEPARATOR: char = ':';

/// Reasons a tag fails verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Tag is not `<hex digest>:<unix seconds>`
    #[error("malformed bot token")]
    Malformed,

    /// Digest does not match secret and message
    #[error("bot token mismatch")]
    Mismatch,

    /// Timestamp outside the accepted window
    #[error("bot token expired")]
    Expired,
}

/// Build the tag for `message` signed at `timestamp` (unix seconds)
#[must_use]
pub fn sign(secret: &str, timestamp: i64, message: &str) -> String {
    format!("{}{TAG_SEPARATOR}{timestamp}", digest(secret, timestamp, message))
}

/// Verify a tag received with `message`
///
/// `now` is the receiver's clock in unix seconds. Tags older than `max_age`,
/// or dated more than `max_age` ahead, are rejected.
///
/// # Errors
///
/// Returns error if the tag is malformed, does not match, or is outside the window
pub fn verify(
    secret: &str,
    message: &str,
    tag: &str,
    now: i64,
    max_age: Duration,
) -> Result<(), AuthError> {
    let (hash, timestamp) = tag.rsplit_once(TAG_SEPARATOR).ok_or(AuthError::Malformed)?;
    let timestamp: i64 = timestamp.parse().map_err(|_| AuthError::Malformed)?;

    let expected = digest(secret, timestamp, message);
    if !constant_time_eq(expected.as_bytes(), hash.as_bytes()) {
        return Err(AuthError::Mismatch);
    }

    if now.abs_diff(timestamp) > max_age.as_secs() {
        return Err(AuthError::Expired);
    }

    Ok(())
}

fn digest(secret: &str, timestamp: i64, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
