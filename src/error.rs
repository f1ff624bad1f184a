//! Error types for codecs, definitions and message data.
//!
//! Two classes of failure leave the engine:
//!
//! - **Definition errors** ([`PackError::Definition`]) come from the structural validator or the
//!   builder. They describe a broken layout and are fatal to that layout.
//! - **Data errors** (every other variant) come from a specific pack/unpack/set/get call against
//!   one message.
//!
//! Public entry points wrap failures in [`PackError::Context`], which carries the rendered value
//! dump and the full definition dump so a single message is enough to diagnose the problem.

use crate::validator::ValidationRule;

/// Failure inside a single codec strategy (body, length, tag or bitmap).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("{codec}: value {value} does not fit in {width} byte(s)")]
    Overflow {
        codec: &'static str,
        value: String,
        width: usize,
    },
    #[error("{codec}: invalid character {found:?} in {input:?}")]
    InvalidChar {
        codec: &'static str,
        found: char,
        input: String,
    },
    #[error("{codec}: need {needed} byte(s) at offset {offset}, only {available} available")]
    Truncated {
        codec: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{codec}: expected {expected} value, found {found}")]
    WrongKind {
        codec: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{codec}: field number {field} outside supported range {min}..={max}")]
    FieldOutOfRange {
        codec: &'static str,
        field: u32,
        min: u32,
        max: u32,
    },
    #[error("{codec}: invalid width {width}")]
    InvalidWidth { codec: &'static str, width: usize },
    #[error("{codec}: {message}")]
    Malformed { codec: &'static str, message: String },
}

impl CodecError {
    /// Bounds check shared by every decoder.
    pub(crate) fn check_available(
        codec: &'static str,
        bytes: &[u8],
        offset: usize,
        needed: usize,
    ) -> Result<(), CodecError> {
        let available = bytes.len().saturating_sub(offset);
        if offset > bytes.len() || available < needed {
            return Err(CodecError::Truncated {
                codec,
                offset,
                needed,
                available,
            });
        }
        Ok(())
    }
}

/// Error returned by the builder, validator, navigation and the pack/unpack engine.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("definition error at '{path}' [{rule}]: {message}")]
    Definition {
        path: String,
        rule: ValidationRule,
        message: String,
    },
    #[error("codec error at '{path}': {source}")]
    Field {
        path: String,
        #[source]
        source: CodecError,
    },
    #[error("data error at '{path}': {message}")]
    Data { path: String, message: String },
    #[error(
        "unpacked tag '{tag}' matches no sibling under '{path}'. Possible causes:\n{}",
        bullet_list(.causes)
    )]
    UnknownTag {
        tag: String,
        path: String,
        causes: Vec<String>,
    },
    #[error("navigation error at '{path}': {message}")]
    Navigation { path: String, message: String },
    #[error("layout error: {0}")]
    Layout(String),
    #[error("{message}: {source}\nvalue dump:\n{value_dump}\ndefinition dump:\n{definition_dump}")]
    Context {
        message: String,
        value_dump: String,
        definition_dump: String,
        #[source]
        source: Box<PackError>,
    },
}

impl PackError {
    pub(crate) fn data(path: impl Into<String>, message: impl Into<String>) -> Self {
        PackError::Data {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn field(path: impl Into<String>, source: CodecError) -> Self {
        PackError::Field {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn navigation(path: impl Into<String>, message: impl Into<String>) -> Self {
        PackError::Navigation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn definition(
        path: impl Into<String>,
        rule: ValidationRule,
        message: impl Into<String>,
    ) -> Self {
        PackError::Definition {
            path: path.into(),
            rule,
            message: message.into(),
        }
    }

    /// Wrap with dumps; an already wrapped error is returned unchanged.
    pub(crate) fn with_dumps(
        self,
        message: impl Into<String>,
        value_dump: String,
        definition_dump: String,
    ) -> Self {
        match self {
            e @ PackError::Context { .. } => e,
            other => PackError::Context {
                message: message.into(),
                value_dump,
                definition_dump,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through [`PackError::Context`] wrappers.
    pub fn root_cause(&self) -> &PackError {
        match self {
            PackError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for the definition-error class (broken layout, never retryable).
    pub fn is_definition_error(&self) -> bool {
        matches!(self.root_cause(), PackError::Definition { .. })
    }

    /// The violated rule, when this is a definition error.
    pub fn rule(&self) -> Option<ValidationRule> {
        match self.root_cause() {
            PackError::Definition { rule, .. } => Some(*rule),
            _ => None,
        }
    }

    /// The path the error was raised at, if it carries one.
    pub fn path(&self) -> Option<&str> {
        match self.root_cause() {
            PackError::Definition { path, .. }
            | PackError::Field { path, .. }
            | PackError::Data { path, .. }
            | PackError::UnknownTag { path, .. }
            | PackError::Navigation { path, .. } => Some(path),
            _ => None,
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|c| format!("  - {}", c))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T, E = PackError> = std::result::Result<T, E>;
