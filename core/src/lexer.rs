//! Incremental CSV lexer.
//!
//! [`Lexer`] consumes character chunks and produces located [`Token`]s
//! lazily. It accepts partial input: a token whose end cannot be determined
//! from the buffered characters alone is deferred until more input arrives
//! or the lexer is flushed. Lexing any chunk partition of a document yields
//! exactly the same token sequence as lexing it in one shot.

use crate::cancel::CancelToken;
use crate::config::LexerConfig;
use crate::error::{Error, ErrorContext};
use crate::token::{Location, Position, Token};

/// A chunk-in, token-out CSV lexer.
///
/// The lexer owns a single growable buffer with a read offset. Consumed
/// prefix storage is reclaimed once it grows past the configured threshold,
/// keeping steady-state memory near `cleanup_threshold` plus the size of the
/// token in progress. The unprocessed length is capped by `max_buffer_size`,
/// checked on every append.
///
/// # Example
///
/// ```
/// use csvflow_core::{Lexer, LexerConfig, Token};
///
/// let mut lexer = Lexer::new(LexerConfig::default())?;
///
/// // Streaming mode: a token that may extend into the next chunk is
/// // deferred rather than emitted early.
/// let first: Vec<Token> = lexer.feed("a,b")?.collect::<Result<_, _>>()?;
/// assert_eq!(first.len(), 2);
///
/// let rest: Vec<Token> = lexer.finish_with("c\n")?.collect::<Result<_, _>>()?;
/// assert_eq!(rest.len(), 1); // the deferred run becomes `bc`; the trailing newline is trimmed
/// assert_eq!(rest[0].value(), "bc");
/// # Ok::<(), csvflow_core::Error>(())
/// ```
#[derive(Debug)]
pub struct Lexer {
    delimiter: char,
    quotation: char,
    max_buffer_size: usize,
    cleanup_threshold: usize,
    source: Option<String>,
    cancel: Option<CancelToken>,

    buffer: String,
    /// Byte index of the first unread character in `buffer`.
    offset: usize,
    /// Characters consumed since the last reclamation; the char-count mirror
    /// of `offset`.
    consumed: usize,
    /// Characters remaining in `buffer[offset..]`.
    unread: usize,
    flushed: bool,
    cursor: Position,
    row_number: usize,
}

impl Lexer {
    /// Validates `config` and constructs the lexer. No state exists for a
    /// rejected configuration.
    pub fn new(config: LexerConfig) -> Result<Self, Error> {
        config.validate()?;
        let LexerConfig {
            delimiter,
            quotation,
            max_buffer_size,
            cleanup_threshold,
            source,
            cancel,
        } = config;
        Ok(Self {
            delimiter,
            quotation,
            max_buffer_size,
            cleanup_threshold,
            source,
            cancel,
            buffer: String::new(),
            offset: 0,
            consumed: 0,
            unread: 0,
            flushed: false,
            cursor: Position::START,
            row_number: 1,
        })
    }

    /// Append `chunk` and lex in streaming mode.
    ///
    /// The returned [`Tokens`] iterator borrows the lexer mutably, so it
    /// must be fully consumed (or dropped) before the next call.
    pub fn feed(&mut self, chunk: &str) -> Result<Tokens<'_>, Error> {
        self.lex(chunk, true)
    }

    /// Append a final `chunk`, then flush.
    pub fn finish_with(&mut self, chunk: &str) -> Result<Tokens<'_>, Error> {
        self.lex(chunk, false)
    }

    /// Flush without appending input.
    ///
    /// Flushing trims one trailing newline (a document ending with a newline
    /// does not produce a trailing empty record), turns deferral into
    /// emission for an unquoted run, and turns an open quoted field into a
    /// parse error. The lexer is terminal afterwards: only empty feeds are
    /// accepted.
    pub fn finish(&mut self) -> Result<Tokens<'_>, Error> {
        self.lex("", false)
    }

    /// Number of unprocessed characters currently buffered.
    pub fn buffered(&self) -> usize {
        self.unread
    }

    fn lex(&mut self, chunk: &str, stream: bool) -> Result<Tokens<'_>, Error> {
        if self.flushed && !chunk.is_empty() {
            return Err(Error::AlreadyFlushed { stage: "lexer" });
        }
        if !chunk.is_empty() {
            self.buffer.push_str(chunk);
            self.unread += chunk.chars().count();
            if self.unread > self.max_buffer_size {
                return Err(Error::BufferOverflow {
                    size: self.unread,
                    max: self.max_buffer_size,
                    context: self.context(),
                });
            }
        }
        if !stream && !self.flushed {
            self.flushed = true;
            self.trim_trailing_newline();
        }
        Ok(Tokens {
            lexer: self,
            done: false,
        })
    }

    fn context(&self) -> ErrorContext {
        ErrorContext {
            position: Some(self.cursor),
            row_number: Some(self.row_number),
            source: self.source.clone(),
        }
    }

    fn trim_trailing_newline(&mut self) {
        let rest = &self.buffer[self.offset..];
        let trim = if rest.ends_with("\r\n") {
            2
        } else if rest.ends_with('\n') {
            1
        } else {
            0
        };
        if trim > 0 {
            self.buffer.truncate(self.buffer.len() - trim);
            self.unread -= trim;
        }
    }

    /// Dispatch on the first unread character and produce one token, or
    /// `None` when the buffer is exhausted or the next token cannot be
    /// determined yet (deferral).
    fn next_token(&mut self) -> Result<Option<Token>, Error> {
        if let Some(cancel) = &self.cancel {
            cancel.check()?;
        }
        let rest = &self.buffer[self.offset..];
        if rest.is_empty() {
            return Ok(None);
        }
        if !self.flushed && (rest == "\n" || rest == "\r\n") {
            // A sole trailing newline is trimmed at flush; until then we
            // cannot tell whether this one terminates a record.
            return Ok(None);
        }
        if rest.starts_with("\r\n") {
            return Ok(Some(self.record_delimiter("\r\n")));
        }
        if rest.starts_with('\n') {
            return Ok(Some(self.record_delimiter("\n")));
        }
        if rest.starts_with(self.delimiter) {
            return Ok(Some(self.field_delimiter()));
        }
        if rest.starts_with(self.quotation) {
            return self.quoted_field();
        }
        self.unquoted_field()
    }

    fn record_delimiter(&mut self, value: &'static str) -> Token {
        let start = self.cursor;
        let mut end = start;
        for ch in value.chars() {
            end.advance(ch);
        }
        self.advance_to(end, value.len());
        let token = Token::RecordDelimiter {
            value: value.to_string(),
            location: Location {
                start,
                end,
                row_number: self.row_number,
            },
        };
        self.row_number += 1;
        self.maybe_reclaim();
        token
    }

    fn field_delimiter(&mut self) -> Token {
        let start = self.cursor;
        let mut end = start;
        end.advance(self.delimiter);
        self.advance_to(end, self.delimiter.len_utf8());
        let token = Token::FieldDelimiter {
            value: self.delimiter.to_string(),
            location: Location {
                start,
                end,
                row_number: self.row_number,
            },
        };
        self.maybe_reclaim();
        token
    }

    /// Maximal run not containing the delimiter, the quotation, CR, or LF.
    fn unquoted_field(&mut self) -> Result<Option<Token>, Error> {
        let rest = &self.buffer[self.offset..];
        let start = self.cursor;
        let mut end = start;
        let mut bytes = 0;
        let mut terminated = false;
        for ch in rest.chars() {
            if ch == self.delimiter || ch == self.quotation || ch == '\r' || ch == '\n' {
                terminated = true;
                break;
            }
            bytes += ch.len_utf8();
            end.advance(ch);
        }
        if bytes == 0 {
            // A bare carriage return matches no rule. In streaming mode a
            // following LF can still complete a CRLF, so wait.
            return Ok(None);
        }
        if !terminated && !self.flushed {
            // The run reaches the end of the buffer; more input may extend it.
            return Ok(None);
        }
        let value = rest[..bytes].to_string();
        self.advance_to(end, bytes);
        let token = Token::Field {
            value,
            location: Location {
                start,
                end,
                row_number: self.row_number,
            },
        };
        self.maybe_reclaim();
        Ok(Some(token))
    }

    /// Scan a quoted field with one character of lookahead.
    ///
    /// A doubled quotation is an escaped literal quote; a quotation followed
    /// by anything else (or by the end of the buffer in flush mode) closes
    /// the field. Newlines inside the quotes are part of the value.
    fn quoted_field(&mut self) -> Result<Option<Token>, Error> {
        let rest = &self.buffer[self.offset..];
        let start = self.cursor;
        let mut end = start;
        let mut value = String::new();
        let mut i = self.quotation.len_utf8();
        end.advance(self.quotation);
        loop {
            let Some(ch) = rest[i..].chars().next() else {
                if self.flushed {
                    return Err(Error::UnterminatedQuote {
                        context: self.context(),
                    });
                }
                return Ok(None);
            };
            if ch == self.quotation {
                let after = i + ch.len_utf8();
                match rest[after..].chars().next() {
                    Some(next) if next == self.quotation => {
                        value.push(self.quotation);
                        end.advance(ch);
                        end.advance(next);
                        i = after + next.len_utf8();
                    }
                    None if !self.flushed => {
                        // Cannot distinguish an escape from the closing
                        // quote until the next character arrives.
                        return Ok(None);
                    }
                    _ => {
                        end.advance(ch);
                        self.advance_to(end, after);
                        let token = Token::Field {
                            value,
                            location: Location {
                                start,
                                end,
                                row_number: self.row_number,
                            },
                        };
                        self.maybe_reclaim();
                        return Ok(Some(token));
                    }
                }
            } else {
                value.push(ch);
                end.advance(ch);
                i += ch.len_utf8();
            }
        }
    }

    fn advance_to(&mut self, cursor: Position, bytes: usize) {
        let chars = cursor.offset - self.cursor.offset;
        self.offset += bytes;
        self.consumed += chars;
        self.unread -= chars;
        self.cursor = cursor;
    }

    /// Reclaim consumed prefix storage once it grows past the threshold, so
    /// token emission stays O(1) amortized on arbitrarily long input.
    fn maybe_reclaim(&mut self) {
        if self.cleanup_threshold > 0 && self.consumed > self.cleanup_threshold {
            self.buffer.drain(..self.offset);
            self.offset = 0;
            self.consumed = 0;
        }
    }
}

/// Lazy token sequence over the lexer's current buffer state.
///
/// Produced by [`Lexer::feed`], [`Lexer::finish_with`], and
/// [`Lexer::finish`]. The mutable borrow enforces the protocol that every
/// produced token is consumed before the next call on the same lexer. The
/// iterator is fused: after deferral, exhaustion, or an error it keeps
/// returning `None`.
#[derive(Debug)]
pub struct Tokens<'a> {
    lexer: &'a mut Lexer,
    done: bool,
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.lexer.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
