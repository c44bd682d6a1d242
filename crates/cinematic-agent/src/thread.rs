//! Rebuild a prior exchange from a rendered bot reply

use cinematic_ai::{Role, Turn};

use crate::render::{DONE_MARKER, HISTORICAL_MARKER, USER_MARKER, is_completed, is_flagged};

/// Why a replied-to message cannot seed a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReconstructible {
    /// The message was written by someone other than the bot
    ForeignAuthor,
    /// The exchange has not reached its done state
    Incomplete,
    /// The exchange has been flagged for review
    Flagged,
}

/// Turn a completed bot reply back into conversation turns.
///
/// Done lines are rewritten with the historical marker so they are told apart
/// from the exchange that is about to resolve.
pub fn reconstruct(
    content: &str,
    author_id: &str,
    bot_id: &str,
) -> Result<Vec<Turn>, NotReconstructible> {
    if author_id != bot_id {
        return Err(NotReconstructible::ForeignAuthor);
    }
    if is_flagged(content) {
        return Err(NotReconstructible::Flagged);
    }
    if !is_completed(content) {
        return Err(NotReconstructible::Incomplete);
    }
    Ok(parse_lines(content))
}

fn parse_lines(content: &str) -> Vec<Turn> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            if let Some(rest) = line.strip_prefix(DONE_MARKER) {
                Some(Turn::assistant(format!("{}{}", HISTORICAL_MARKER, rest.trim())))
            } else if line.starts_with(HISTORICAL_MARKER) {
                Some(Turn::assistant(line))
            } else if line.starts_with(USER_MARKER) {
                Some(Turn::user(line))
            } else {
                None
            }
        })
        .collect()
}

/// The user's own words from reconstructed turns, marker removed
pub fn user_lines(turns: &[Turn]) -> impl Iterator<Item = &str> {
    turns
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.strip_prefix(USER_MARKER).unwrap_or(&t.content))
}
