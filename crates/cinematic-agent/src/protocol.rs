//! Command micro-language embedded in model output
//!
//! The model answers in free text with bracketed markers mixed in:
//!
//! ```text
//! [CMDRET~movie_lookup~Stargate¬Stargate Universe~Available on the server?]
//! [CMD~movie_post~784993~4]Added Stargate SG-1 in 1080p.
//! ```
//!
//! `CMDRET` markers need data before the model can answer, `CMD` markers are
//! side effects, and `RES` markers carry results back to the model. Markers are
//! found left to right and do not nest: the first `[` pairs with the first `]`
//! after it.

use std::fmt;

pub const MARKER_OPEN: char = '[';
pub const MARKER_CLOSE: char = ']';
/// Separates the tag and positional fields inside a marker
pub const FIELD_SEPARATOR: char = '~';
/// Packs several values into one field, e.g. several lookup terms
pub const MULTI_VALUE_SEPARATOR: char = '¬';

pub const RETRIEVAL_TAG: &str = "CMDRET";
pub const ACTION_TAG: &str = "CMD";
pub const RESULT_TAG: &str = "RES";

/// What a command asks for; decides which collaborator receives it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    WebSearch,
    MovieLookup,
    SeriesLookup,
    MemoryGet,
    MovieAdd,
    MovieUpdate,
    SeriesAdd,
    SeriesUpdate,
    MemoryUpdate,
    /// A well-formed command naming nothing we route
    Unknown(String),
}

impl CommandKind {
    /// Every routed kind, in the order they are described to the model
    pub const ROUTED: [CommandKind; 9] = [
        CommandKind::WebSearch,
        CommandKind::MovieLookup,
        CommandKind::SeriesLookup,
        CommandKind::MemoryGet,
        CommandKind::MovieAdd,
        CommandKind::MovieUpdate,
        CommandKind::SeriesAdd,
        CommandKind::SeriesUpdate,
        CommandKind::MemoryUpdate,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "web_search" => CommandKind::WebSearch,
            "movie_lookup" => CommandKind::MovieLookup,
            "series_lookup" => CommandKind::SeriesLookup,
            "memory_get" => CommandKind::MemoryGet,
            "movie_post" => CommandKind::MovieAdd,
            "movie_put" => CommandKind::MovieUpdate,
            "series_post" => CommandKind::SeriesAdd,
            "series_put" => CommandKind::SeriesUpdate,
            "memory_update" => CommandKind::MemoryUpdate,
            other => CommandKind::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CommandKind::WebSearch => "web_search",
            CommandKind::MovieLookup => "movie_lookup",
            CommandKind::SeriesLookup => "series_lookup",
            CommandKind::MemoryGet => "memory_get",
            CommandKind::MovieAdd => "movie_post",
            CommandKind::MovieUpdate => "movie_put",
            CommandKind::SeriesAdd => "series_post",
            CommandKind::SeriesUpdate => "series_put",
            CommandKind::MemoryUpdate => "memory_update",
            CommandKind::Unknown(name) => name,
        }
    }

    /// Kinds that produce data for the model
    pub fn returns_data(&self) -> bool {
        matches!(
            self,
            CommandKind::WebSearch
                | CommandKind::MovieLookup
                | CommandKind::SeriesLookup
                | CommandKind::MemoryGet
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command extracted from a model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// Positional fields after the kind
    pub arguments: Vec<String>,
    /// The model is blocked until this command's result comes back
    pub is_retrieval: bool,
}

impl Command {
    /// Positional argument, if present
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }

    /// Split a field on the multi-value separator, dropping empty values
    pub fn arg_values(&self, index: usize) -> Vec<&str> {
        self.arg(index)
            .map(|field| {
                field
                    .split(MULTI_VALUE_SEPARATOR)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Why a bracketed span could not be read as a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformation {
    /// `[]` or whitespace only
    Empty,
    /// Leading tag is not one of the known families
    UnknownTag(String),
    /// `CMD`/`CMDRET` without a kind field
    MissingKind,
}

/// One bracketed span found in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Command(Command),
    /// A `RES` marker and its payload
    Result(String),
    Malformed { raw: String, reason: Malformation },
}

impl Marker {
    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Marker::Command(cmd) => Some(cmd),
            _ => None,
        }
    }

    fn parse(interior: &str) -> Self {
        let mut fields = interior.split(FIELD_SEPARATOR);
        let tag = fields.next().unwrap_or_default().trim();

        match tag {
            RETRIEVAL_TAG | ACTION_TAG => {
                let kind = match fields.next().map(str::trim) {
                    Some(name) if !name.is_empty() => CommandKind::from_name(name),
                    _ => {
                        return Marker::Malformed {
                            raw: interior.to_string(),
                            reason: Malformation::MissingKind,
                        };
                    }
                };
                Marker::Command(Command {
                    kind,
                    arguments: fields.map(|f| f.trim().to_string()).collect(),
                    is_retrieval: tag == RETRIEVAL_TAG,
                })
            }
            RESULT_TAG => {
                let payload = interior
                    .split_once(FIELD_SEPARATOR)
                    .map(|(_, payload)| payload)
                    .unwrap_or_default();
                Marker::Result(payload.to_string())
            }
            "" => Marker::Malformed {
                raw: interior.to_string(),
                reason: Malformation::Empty,
            },
            other => Marker::Malformed {
                raw: interior.to_string(),
                reason: Malformation::UnknownTag(other.to_string()),
            },
        }
    }
}

/// A model response split into user-visible text and markers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Response with every marker removed, spaces collapsed and trimmed
    pub visible: String,
    /// Markers in the order they appeared
    pub markers: Vec<Marker>,
}

impl ParsedResponse {
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.markers.iter().filter_map(Marker::as_command)
    }

    pub fn retrievals(&self) -> impl Iterator<Item = &Command> {
        self.commands().filter(|c| c.is_retrieval)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Command> {
        self.commands().filter(|c| !c.is_retrieval)
    }

    pub fn has_retrieval(&self) -> bool {
        self.retrievals().next().is_some()
    }

    pub fn has_action(&self) -> bool {
        self.actions().next().is_some()
    }
}

/// Split a response into visible text and markers.
///
/// An unterminated `[` stops scanning and stays in the visible text.
pub fn parse(response: &str) -> ParsedResponse {
    let mut visible = String::with_capacity(response.len());
    let mut markers = Vec::new();
    let mut rest = response;

    while let Some(open) = rest.find(MARKER_OPEN) {
        let after_open = &rest[open + MARKER_OPEN.len_utf8()..];
        let Some(close) = after_open.find(MARKER_CLOSE) else {
            break;
        };
        visible.push_str(&rest[..open]);
        markers.push(Marker::parse(&after_open[..close]));
        rest = &after_open[close + MARKER_CLOSE.len_utf8()..];
    }
    visible.push_str(rest);

    ParsedResponse {
        visible: collapse_spaces(&visible),
        markers,
    }
}

/// Wrap a collaborator result as a single `RES` marker.
///
/// Brackets inside the payload become parentheses so the marker stays whole.
pub fn serialize_result(payload: &str) -> String {
    let payload: String = payload
        .chars()
        .map(|c| match c {
            MARKER_OPEN => '(',
            MARKER_CLOSE => ')',
            other => other,
        })
        .collect();
    format!("{}{}{}{}{}", MARKER_OPEN, RESULT_TAG, FIELD_SEPARATOR, payload, MARKER_CLOSE)
}

/// Normalize a raw model response: newlines become spaces, ends trimmed
pub fn normalize(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").trim().to_string()
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
