//! Error types for the lexing and assembly stages.
//!
//! Errors form a closed set classified into three [`ErrorKind`]s. Propagation
//! is strict: neither stage recovers locally, and a fatal error leaves the
//! instance unusable.

use core::fmt;

use crate::token::Position;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration or a configured limit was violated.
    Validation,
    /// The input data itself is malformed.
    Parse,
    /// The cancellation handle fired.
    Cancellation,
}

/// Optional diagnostics attached to an error: where in the input the fault
/// lies and which source it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub position: Option<Position>,
    pub row_number: Option<usize>,
    /// Label configured on the failing stage, rendered verbatim.
    pub source: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, " at {position}")?;
        }
        if let Some(row) = self.row_number {
            write!(f, " in row {row}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " of {source}")?;
        }
        Ok(())
    }
}

/// Errors raised by the lexer, the assembler, or their configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Rejected configuration, before any parser state exists.
    #[error("invalid option: {message}")]
    InvalidOption { message: String },

    /// The unprocessed buffer outgrew `max_buffer_size`. Guards against an
    /// unterminated quoted field whose value grows without bound.
    #[error("buffer limit exceeded: {size} characters buffered, maximum is {max}{context}")]
    BufferOverflow {
        size: usize,
        max: usize,
        context: ErrorContext,
    },

    /// A row accumulated more fields than `max_field_count` allows.
    #[error("field count limit exceeded: row has {count} fields, maximum is {max}{context}")]
    FieldCountOverflow {
        count: usize,
        max: usize,
        context: ErrorContext,
    },

    /// Input arrived after the stage was flushed.
    #[error("{stage} is already flushed and cannot accept further input")]
    AlreadyFlushed { stage: &'static str },

    /// The buffer ended inside a quoted field in flush mode.
    #[error("unexpected EOF while parsing quoted field{context}")]
    UnterminatedQuote { context: ErrorContext },

    /// The captured (or configured) header row had no fields.
    #[error("header row must not be empty{context}")]
    EmptyHeader { context: ErrorContext },

    /// The same name appeared twice in the header row.
    #[error("duplicate header field {name:?}{context}")]
    DuplicateHeader { name: String, context: ErrorContext },

    /// The cancellation handle fired between tokens.
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidOption { .. }
            | Error::BufferOverflow { .. }
            | Error::FieldCountOverflow { .. }
            | Error::AlreadyFlushed { .. } => ErrorKind::Validation,
            Error::UnterminatedQuote { .. }
            | Error::EmptyHeader { .. }
            | Error::DuplicateHeader { .. } => ErrorKind::Parse,
            Error::Cancelled { .. } => ErrorKind::Cancellation,
        }
    }

    fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::BufferOverflow { context, .. }
            | Error::FieldCountOverflow { context, .. }
            | Error::UnterminatedQuote { context }
            | Error::EmptyHeader { context }
            | Error::DuplicateHeader { context, .. } => Some(context),
            Error::InvalidOption { .. }
            | Error::AlreadyFlushed { .. }
            | Error::Cancelled { .. } => None,
        }
    }

    /// The input position the error points at, if known.
    pub fn position(&self) -> Option<Position> {
        self.context().and_then(|context| context.position)
    }

    /// The 1-based row the error points at, if known.
    pub fn row_number(&self) -> Option<usize> {
        self.context().and_then(|context| context.row_number)
    }

    /// The source label of the failing stage, if one was configured.
    pub fn source_label(&self) -> Option<&str> {
        self.context()
            .and_then(|context| context.source.as_deref())
    }
}
