//! Configuration for the lexing and assembly stages.
//!
//! Both stages validate their configuration before any parser state exists,
//! so a rejected option can never leave a half-constructed lexer or
//! assembler behind.
//!
//! # Resource Limits
//!
//! Untrusted input can attack the parser in two ways: an unterminated quoted
//! field makes the lexer buffer grow without bound, and a row with an absurd
//! number of delimiters makes the assembler's accumulator grow without bound.
//! Both caps default to attacker-resistant values and accept `usize::MAX` to
//! lift the limit for trusted input.
//!
//! | Setting | Default | Rationale |
//! |---------|---------|-----------|
//! | `max_buffer_size` | 10 MiB of characters | bounds lexer memory |
//! | `cleanup_threshold` | 4096 | amortizes prefix reclamation |
//! | `max_field_count` | 100 000 | bounds row accumulator |
//!
//! # Example
//!
//! ```
//! use csvflow_core::LexerConfig;
//!
//! let config = LexerConfig::new()
//!     .with_delimiter(';')
//!     .with_source("input.csv");
//! assert!(config.validate().is_ok());
//!
//! // CR and LF can never delimit fields.
//! assert!(LexerConfig::new().with_delimiter('\n').validate().is_err());
//! ```

use crate::cancel::CancelToken;
use crate::error::Error;

pub const DEFAULT_DELIMITER: char = ',';
pub const DEFAULT_QUOTATION: char = '"';
/// Default cap on unprocessed buffered characters.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;
/// Default consumed-prefix length that triggers buffer reclamation.
pub const DEFAULT_CLEANUP_THRESHOLD: usize = 4096;
/// Default cap on fields per record.
pub const DEFAULT_MAX_FIELD_COUNT: usize = 100_000;

/// Configuration for [`Lexer`](crate::Lexer).
#[derive(Debug, Clone)]
pub struct LexerConfig {
    /// Field delimiter. Must not be CR, LF, or equal to `quotation`.
    pub delimiter: char,
    /// Quotation character. Must not be CR, LF, or equal to `delimiter`.
    pub quotation: char,
    /// Maximum unprocessed characters the lexer may buffer. `usize::MAX`
    /// lifts the cap.
    pub max_buffer_size: usize,
    /// Consumed-prefix length past which buffer storage is reclaimed.
    /// 0 disables periodic reclamation.
    pub cleanup_threshold: usize,
    /// Label included verbatim in error messages.
    pub source: Option<String>,
    /// Cancellation handle checked at token boundaries.
    pub cancel: Option<CancelToken>,
}

impl Default for LexerConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LexerConfig {
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            quotation: DEFAULT_QUOTATION,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            cleanup_threshold: DEFAULT_CLEANUP_THRESHOLD,
            source: None,
            cancel: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quotation(mut self, quotation: char) -> Self {
        self.quotation = quotation;
        self
    }

    pub fn with_max_buffer_size(mut self, chars: usize) -> Self {
        self.max_buffer_size = chars;
        self
    }

    /// Lift the buffer cap. Only safe for trusted input.
    pub fn unlimited_buffer(self) -> Self {
        self.with_max_buffer_size(usize::MAX)
    }

    pub fn with_cleanup_threshold(mut self, chars: usize) -> Self {
        self.cleanup_threshold = chars;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Reject configurations the lexer cannot honor.
    ///
    /// The single-character contract on `delimiter` and `quotation` is
    /// carried by the `char` type; what remains dynamic is the newline
    /// exclusion, the distinctness of the two characters, and a positive
    /// buffer cap.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, ch) in [("delimiter", self.delimiter), ("quotation", self.quotation)] {
            if ch == '\r' || ch == '\n' {
                return Err(Error::InvalidOption {
                    message: format!("{name} must not be a carriage return or line feed"),
                });
            }
        }
        if self.delimiter == self.quotation {
            return Err(Error::InvalidOption {
                message: "delimiter and quotation must not be the same character".into(),
            });
        }
        if self.max_buffer_size == 0 {
            return Err(Error::InvalidOption {
                message: "max_buffer_size must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Configuration for [`RecordAssembler`](crate::RecordAssembler).
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum fields per record. `usize::MAX` lifts the cap.
    pub max_field_count: usize,
    /// Drop rows that produced no field between two record delimiters
    /// instead of emitting an all-empty record.
    pub skip_empty_lines: bool,
    /// Explicit header names. When present, the first record delimiter does
    /// not trigger header capture.
    pub header: Option<Vec<String>>,
    /// Label included verbatim in error messages.
    pub source: Option<String>,
    /// Cancellation handle checked between tokens.
    pub cancel: Option<CancelToken>,
}

impl Default for AssemblerConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl AssemblerConfig {
    pub fn new() -> Self {
        Self {
            max_field_count: DEFAULT_MAX_FIELD_COUNT,
            skip_empty_lines: false,
            header: None,
            source: None,
            cancel: None,
        }
    }

    pub fn with_max_field_count(mut self, count: usize) -> Self {
        self.max_field_count = count;
        self
    }

    pub fn skip_empty_lines(mut self, skip: bool) -> Self {
        self.skip_empty_lines = skip;
        self
    }

    pub fn with_header<I, S>(mut self, header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = Some(header.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_field_count == 0 {
            return Err(Error::InvalidOption {
                message: "max_field_count must be positive".into(),
            });
        }
        Ok(())
    }
}
