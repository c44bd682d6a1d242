//! Line-prefix protocol of rendered replies
//!
//! A bot reply is the only persisted state of an exchange. Each line starts
//! with a marker naming its role and completion status, so a later reply can
//! rebuild the conversation from the text alone (see [`crate::thread`]).

/// A user-authored utterance, verbatim
pub const USER_MARKER: &str = "💬 ";
/// Assistant turn, fully resolved
pub const DONE_MARKER: &str = "✅ ";
/// Assistant turn, still resolving
pub const PENDING_MARKER: &str = "⌛ ";
/// Assistant turn carried over from an earlier completed exchange
pub const HISTORICAL_MARKER: &str = "☑️ ";
/// Exchange refused or failed, never rebuilt as a turn
pub const REFUSAL_MARKER: &str = "❌ ";
/// Exchange flagged for manual review
pub const REVIEW_FLAG: &str = "❗";

/// Line appended to a reply that has been flagged
pub const REVIEW_LINE: &str = "❗ This message has been submitted for manual review.";

/// Fixed text shown when the relevance gate refuses a message
pub const REFUSAL_TEXT: &str = "Hi, I'm a media bot. I can help you with media related questions. What would you like to know or achieve?";

/// Fixed text shown when the model cannot be reached
pub const FAILURE_TEXT: &str =
    "Sorry, I couldn't reach my movie brain just now. Please try again in a moment.";

/// Status of an assistant line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InProgress,
    Done,
}

impl Status {
    pub fn marker(&self) -> &'static str {
        match self {
            Status::InProgress => PENDING_MARKER,
            Status::Done => DONE_MARKER,
        }
    }
}

/// Render the visible reply: the fixed start text followed by one status line.
pub fn status_line(start: &str, status: Status, text: &str) -> String {
    format!("{}{}{}", start, status.marker(), text)
}

/// Render the start text of an exchange: carried-over lines plus the new utterance.
pub fn start_text<'a>(history_lines: impl IntoIterator<Item = &'a str>, user_text: &str) -> String {
    let mut out = String::new();
    for line in history_lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(USER_MARKER);
    out.push_str(user_text);
    out.push('\n');
    out
}

/// Render a refusal in place of the pending status line
pub fn refusal(start: &str, text: &str) -> String {
    format!("{}{}{}", start, REFUSAL_MARKER, text)
}

/// Whether a rendered reply has reached its terminal state.
///
/// Only a line opening with the done marker counts; the glyph inside an
/// utterance or a pending line does not.
pub fn is_completed(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.trim_start().starts_with(DONE_MARKER))
}

/// Whether a rendered reply has already been flagged for review
pub fn is_flagged(content: &str) -> bool {
    content.contains(REVIEW_FLAG)
}

/// Append the review line to a rendered reply
pub fn flagged(content: &str) -> String {
    format!("{}\n{}", content, REVIEW_LINE)
}
