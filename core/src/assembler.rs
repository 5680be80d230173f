//! Record assembly from the token stream.

use std::collections::HashSet;

use crate::cancel::CancelToken;
use crate::config::AssemblerConfig;
use crate::error::{Error, ErrorContext};
use crate::token::{Record, Token};

/// Folds located tokens into records keyed by the header row.
///
/// The first record delimiter captures the accumulated row as the header
/// unless an explicit header was configured; the header is immutable once
/// known. Records are emitted lazily, one per terminated dirty row, plus one
/// final record for an unterminated last line at flush.
///
/// # Example
///
/// ```
/// use csvflow_core::{AssemblerConfig, Lexer, LexerConfig, RecordAssembler};
///
/// let mut lexer = Lexer::new(LexerConfig::default())?;
/// let mut assembler = RecordAssembler::new(AssemblerConfig::default())?;
///
/// let tokens: Vec<_> = lexer
///     .finish_with("name,city\nAlice,Lisbon")?
///     .collect::<Result<_, _>>()?;
/// let records: Vec<_> = assembler.finish_with(tokens).collect::<Result<_, _>>()?;
///
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0]["name"], "Alice");
/// assert_eq!(records[0]["city"], "Lisbon");
/// # Ok::<(), csvflow_core::Error>(())
/// ```
#[derive(Debug)]
pub struct RecordAssembler {
    max_field_count: usize,
    skip_empty_lines: bool,
    source: Option<String>,
    cancel: Option<CancelToken>,

    header: Option<Vec<String>>,
    field_index: usize,
    /// Per-row accumulator indexed by column; unassigned slots read as the
    /// empty string, which is how a delimiter with no field between counts
    /// as an empty field.
    row: Vec<String>,
    dirty: bool,
    row_number: usize,
    flushed: bool,
}

impl RecordAssembler {
    /// Validates `config` and constructs the assembler. An explicit header
    /// bypasses capture but is subject to the same checks as a captured one.
    pub fn new(config: AssemblerConfig) -> Result<Self, Error> {
        config.validate()?;
        let AssemblerConfig {
            max_field_count,
            skip_empty_lines,
            header,
            source,
            cancel,
        } = config;
        let mut assembler = Self {
            max_field_count,
            skip_empty_lines,
            source,
            cancel,
            header: None,
            field_index: 0,
            row: Vec::new(),
            dirty: false,
            row_number: 1,
            flushed: false,
        };
        if let Some(header) = header {
            assembler.set_header(header)?;
        }
        Ok(assembler)
    }

    /// Assemble in streaming mode: partial-row state is retained across
    /// calls. `tokens` may be a single `Option<Token>`, a vector, or any
    /// other token iterable.
    pub fn feed<I>(&mut self, tokens: I) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Token>,
    {
        self.assemble(tokens, true)
    }

    /// Process `tokens`, then finalize: a dirty row with a captured header
    /// becomes one last record. The assembler is terminal afterwards.
    pub fn finish_with<I>(&mut self, tokens: I) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Token>,
    {
        self.assemble(tokens, false)
    }

    /// Finalize without new input.
    pub fn finish(&mut self) -> Records<'_, std::iter::Empty<Token>> {
        self.assemble(std::iter::empty(), false)
    }

    /// The captured (or configured) header, once known.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    fn assemble<I>(&mut self, tokens: I, stream: bool) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Token>,
    {
        Records {
            assembler: self,
            tokens: tokens.into_iter(),
            stream,
            done: false,
        }
    }

    fn context(&self) -> ErrorContext {
        ErrorContext {
            position: None,
            row_number: Some(self.row_number),
            source: self.source.clone(),
        }
    }

    fn set_header(&mut self, header: Vec<String>) -> Result<(), Error> {
        if header.is_empty() {
            return Err(Error::EmptyHeader {
                context: self.context(),
            });
        }
        if header.len() > self.max_field_count {
            return Err(Error::FieldCountOverflow {
                count: header.len(),
                max: self.max_field_count,
                context: self.context(),
            });
        }
        let mut seen = HashSet::with_capacity(header.len());
        for name in &header {
            if !seen.insert(name.as_str()) {
                return Err(Error::DuplicateHeader {
                    name: name.clone(),
                    context: self.context(),
                });
            }
        }
        self.header = Some(header);
        Ok(())
    }

    fn process(&mut self, token: Token) -> Result<Option<Record>, Error> {
        self.row_number = token.location().row_number;
        match token {
            Token::FieldDelimiter { .. } => {
                self.field_index += 1;
                if self.field_index + 1 > self.max_field_count {
                    return Err(Error::FieldCountOverflow {
                        count: self.field_index + 1,
                        max: self.max_field_count,
                        context: self.context(),
                    });
                }
                self.dirty = true;
                Ok(None)
            }
            Token::Field { value, .. } => {
                if self.row.len() <= self.field_index {
                    self.row.resize(self.field_index + 1, String::new());
                }
                self.row[self.field_index] = value;
                self.dirty = true;
                Ok(None)
            }
            Token::RecordDelimiter { .. } => {
                let record = if self.header.is_none() {
                    let header = std::mem::take(&mut self.row);
                    self.set_header(header)?;
                    None
                } else if self.dirty {
                    Some(self.take_record())
                } else if !self.skip_empty_lines {
                    Some(self.empty_record())
                } else {
                    None
                };
                self.reset_row();
                Ok(record)
            }
        }
    }

    /// Zip header names with the accumulated row. Missing trailing values
    /// read as the empty string; values past the header length are dropped.
    fn take_record(&mut self) -> Record {
        let Self { header, row, .. } = self;
        let names = header.as_deref().unwrap_or_default();
        let mut record = Record::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let value = row.get_mut(index).map(std::mem::take).unwrap_or_default();
            record.insert(name.clone(), value);
        }
        record
    }

    fn empty_record(&self) -> Record {
        let names = self.header.as_deref().unwrap_or_default();
        names
            .iter()
            .map(|name| (name.clone(), String::new()))
            .collect()
    }

    fn reset_row(&mut self) {
        self.field_index = 0;
        self.row.clear();
        self.dirty = false;
    }

    fn flush_record(&mut self) -> Option<Record> {
        if self.dirty && self.header.is_some() {
            let record = self.take_record();
            self.reset_row();
            Some(record)
        } else {
            None
        }
    }
}

/// Lazy record sequence over incoming tokens.
///
/// Produced by [`RecordAssembler::feed`], [`RecordAssembler::finish_with`],
/// and [`RecordAssembler::finish`]. Fused after exhaustion or an error.
#[derive(Debug)]
pub struct Records<'a, I> {
    assembler: &'a mut RecordAssembler,
    tokens: I,
    stream: bool,
    done: bool,
}

impl<I> Iterator for Records<'_, I>
where
    I: Iterator<Item = Token>,
{
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(cancel) = &self.assembler.cancel {
                if let Err(err) = cancel.check() {
                    self.done = true;
                    return Some(Err(err));
                }
            }
            match self.tokens.next() {
                Some(token) => {
                    if self.assembler.flushed {
                        self.done = true;
                        return Some(Err(Error::AlreadyFlushed {
                            stage: "assembler",
                        }));
                    }
                    match self.assembler.process(token) {
                        Ok(Some(record)) => return Some(Ok(record)),
                        Ok(None) => {}
                        Err(err) => {
                            self.done = true;
                            return Some(Err(err));
                        }
                    }
                }
                None => {
                    self.done = true;
                    if !self.stream && !self.assembler.flushed {
                        self.assembler.flushed = true;
                        return self.assembler.flush_record().map(Ok);
                    }
                    return None;
                }
            }
        }
    }
}
