//! Backpressure-aware stream adapters over the lexer and assembler.
//!
//! The core stages are synchronous and pull-based; this module maps them
//! onto chunked, back-pressured pipelines:
//!
//! - **Source** feeds chunks to the lexer stage, which emits tokens
//! - the assembler stage folds tokens and emits records to the **Consumer**
//!
//! # Features
//!
//! - **Backpressure**: bounded channels suspend a stage when its consumer
//!   lags (`tokio_impl`); `Stream` adapters pull on demand (`futures_impl`)
//! - **Cooperative scheduling**: the channel stages yield to the scheduler
//!   every [`StreamConfig::check_interval`] tokens so sibling tasks sharing
//!   the thread make progress
//! - **Cancellation**: the stages observe the [`CancelToken`] at token
//!   boundaries; a closed downstream channel terminates a stage cleanly
//!
//! # Example
//!
//! ```ignore
//! use csvflow_core::async_stream::tokio_impl::{AssemblerStream, LexerStream};
//!
//! async fn parse_network_data(mut rx: tokio::sync::mpsc::Receiver<String>) {
//!     let (token_tx, token_rx) = tokio::sync::mpsc::channel(1024);
//!     let (record_tx, mut record_rx) = tokio::sync::mpsc::channel(256);
//!
//!     tokio::spawn(async move {
//!         let mut stage = LexerStream::new(lexer, token_tx);
//!         while let Some(chunk) = rx.recv().await {
//!             stage.feed(&chunk).await?;
//!         }
//!         stage.finish().await?;
//!     });
//!
//!     tokio::spawn(async move {
//!         AssemblerStream::new(assembler, record_tx).run(token_rx).await?;
//!     });
//!
//!     while let Some(record) = record_rx.recv().await {
//!         process(record);
//!     }
//! }
//! ```

use crate::error::Error;

/// Error type for streaming pipeline stages.
///
/// Core errors convert the stage into its errored state immediately; no
/// further tokens or records are forwarded. The underlying [`Error`] stays
/// reachable through `std::error::Error::source`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The downstream consumer went away.
    #[error("channel closed unexpectedly")]
    ChannelClosed,
    /// The lexer or assembler failed.
    #[error(transparent)]
    Csv(#[from] Error),
}

/// Tuning for the streaming adapters.
///
/// The queue sizes are the pipeline's high-water marks: a stage suspends
/// once that many items are in flight. The chunk channel feeding the lexer
/// stage belongs to the caller, so its bound plays the input-side role.
/// `check_interval` bounds how many tokens a stage forwards before yielding
/// to the scheduler, which prevents a fast producer from starving sibling
/// tasks on the same thread.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Bound of the token channel. Default: 1024.
    pub token_queue_size: usize,
    /// Bound of the record channel. Default: 256.
    pub record_queue_size: usize,
    /// Tokens forwarded between cooperative yields. 0 disables yielding.
    /// Default: 100.
    pub check_interval: usize,
}

impl Default for StreamConfig {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl StreamConfig {
    /// Default configuration, usable in const contexts.
    pub const DEFAULT: Self = Self {
        token_queue_size: 1024,
        record_queue_size: 256,
        check_interval: 100,
    };

    #[inline]
    pub const fn new() -> Self {
        Self::DEFAULT
    }

    /// Configuration for low-memory pipelines over small inputs.
    pub const fn small() -> Self {
        Self {
            token_queue_size: 128,
            record_queue_size: 32,
            check_interval: 100,
        }
    }

    #[inline]
    pub const fn with_token_queue_size(mut self, size: usize) -> Self {
        self.token_queue_size = size;
        self
    }

    #[inline]
    pub const fn with_record_queue_size(mut self, size: usize) -> Self {
        self.record_queue_size = size;
        self
    }

    #[inline]
    pub const fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval;
        self
    }
}

#[cfg(feature = "tokio")]
pub mod tokio_impl {
    //! Tokio-based pipeline stages.

    use super::*;
    use crate::assembler::{RecordAssembler, Records};
    use crate::cancel::CancelToken;
    use crate::lexer::{Lexer, Tokens};
    use crate::token::{Record, Token};
    use ::tokio::sync::mpsc;

    /// Lexer stage: feeds chunks, emits tokens into a bounded channel.
    pub struct LexerStream {
        lexer: Lexer,
        token_tx: mpsc::Sender<Token>,
        config: StreamConfig,
        since_yield: usize,
    }

    impl LexerStream {
        pub fn new(lexer: Lexer, token_tx: mpsc::Sender<Token>) -> Self {
            Self::with_config(lexer, token_tx, StreamConfig::default())
        }

        pub fn with_config(
            lexer: Lexer,
            token_tx: mpsc::Sender<Token>,
            config: StreamConfig,
        ) -> Self {
            Self {
                lexer,
                token_tx,
                config,
                since_yield: 0,
            }
        }

        /// Lex `chunk` in streaming mode and forward every produced token.
        ///
        /// A full channel suspends this stage until the consumer catches up.
        pub async fn feed(&mut self, chunk: &str) -> Result<(), StreamError> {
            let tokens = self.lexer.feed(chunk)?;
            forward_tokens(
                tokens,
                &self.token_tx,
                self.config.check_interval,
                &mut self.since_yield,
            )
            .await
        }

        /// Flush the lexer and forward the remaining tokens.
        ///
        /// Consumes the stage; dropping the sender afterwards signals
        /// upstream completion to the assembler stage.
        pub async fn finish(mut self) -> Result<(), StreamError> {
            let tokens = self.lexer.finish()?;
            forward_tokens(
                tokens,
                &self.token_tx,
                self.config.check_interval,
                &mut self.since_yield,
            )
            .await
        }
    }

    async fn forward_tokens(
        tokens: Tokens<'_>,
        tx: &mpsc::Sender<Token>,
        check_interval: usize,
        since_yield: &mut usize,
    ) -> Result<(), StreamError> {
        for token in tokens {
            let token = token?;
            tx.send(token)
                .await
                .map_err(|_| StreamError::ChannelClosed)?;
            *since_yield += 1;
            if check_interval > 0 && *since_yield >= check_interval {
                *since_yield = 0;
                ::tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    /// Assembler stage: consumes tokens, emits records into a bounded
    /// channel.
    pub struct AssemblerStream {
        assembler: RecordAssembler,
        record_tx: mpsc::Sender<Record>,
        config: StreamConfig,
    }

    impl AssemblerStream {
        pub fn new(assembler: RecordAssembler, record_tx: mpsc::Sender<Record>) -> Self {
            Self::with_config(assembler, record_tx, StreamConfig::default())
        }

        pub fn with_config(
            assembler: RecordAssembler,
            record_tx: mpsc::Sender<Record>,
            config: StreamConfig,
        ) -> Self {
            Self {
                assembler,
                record_tx,
                config,
            }
        }

        /// Run until the token channel closes, then flush.
        pub async fn run(mut self, mut token_rx: mpsc::Receiver<Token>) -> Result<(), StreamError> {
            let mut since_yield = 0;
            while let Some(token) = token_rx.recv().await {
                let records = self.assembler.feed(Some(token));
                forward_records(
                    records,
                    &self.record_tx,
                    self.config.check_interval,
                    &mut since_yield,
                )
                .await?;
            }
            let records = self.assembler.finish();
            forward_records(
                records,
                &self.record_tx,
                self.config.check_interval,
                &mut since_yield,
            )
            .await
        }
    }

    async fn forward_records<I>(
        records: Records<'_, I>,
        tx: &mpsc::Sender<Record>,
        check_interval: usize,
        since_yield: &mut usize,
    ) -> Result<(), StreamError>
    where
        I: Iterator<Item = Token>,
    {
        for record in records {
            let record = record?;
            tx.send(record)
                .await
                .map_err(|_| StreamError::ChannelClosed)?;
            *since_yield += 1;
            if check_interval > 0 && *since_yield >= check_interval {
                *since_yield = 0;
                ::tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    /// Express a timeout through the cancellation handle: after `duration`
    /// the handle fires, and both stages fail with the cancellation error at
    /// their next token boundary.
    pub async fn cancel_after(cancel: CancelToken, duration: std::time::Duration) {
        ::tokio::time::sleep(duration).await;
        cancel.cancel("deadline elapsed");
    }
}

#[cfg(feature = "futures")]
pub mod futures_impl {
    //! Runtime-agnostic `Stream` adapters.

    use super::*;
    use crate::assembler::{RecordAssembler, Records};
    use crate::lexer::{Lexer, Tokens};
    use crate::token::{Record, Token};
    use core::pin::Pin;
    use core::task::{Context, Poll};
    use futures_core::Stream;
    use std::collections::VecDeque;

    /// Adapts a stream of chunks into a stream of tokens.
    ///
    /// Tokens lexed from each chunk are buffered and drained before the next
    /// chunk is polled; when the inner stream ends the lexer is flushed
    /// once. Fused after an error.
    pub struct TokenStream<S> {
        inner: S,
        lexer: Lexer,
        pending: VecDeque<Token>,
        flushed: bool,
        errored: bool,
    }

    impl<S> TokenStream<S> {
        pub fn new(inner: S, lexer: Lexer) -> Self {
            Self {
                inner,
                lexer,
                pending: VecDeque::new(),
                flushed: false,
                errored: false,
            }
        }
    }

    impl<S> Stream for TokenStream<S>
    where
        S: Stream<Item = String> + Unpin,
    {
        type Item = Result<Token, StreamError>;

        fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let this = self.get_mut();
            loop {
                if this.errored {
                    return Poll::Ready(None);
                }
                if let Some(token) = this.pending.pop_front() {
                    return Poll::Ready(Some(Ok(token)));
                }
                if this.flushed {
                    return Poll::Ready(None);
                }
                match Pin::new(&mut this.inner).poll_next(cx) {
                    Poll::Ready(Some(chunk)) => {
                        if let Err(err) = buffer_tokens(this.lexer.feed(&chunk), &mut this.pending)
                        {
                            this.errored = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                    Poll::Ready(None) => {
                        this.flushed = true;
                        if let Err(err) = buffer_tokens(this.lexer.finish(), &mut this.pending) {
                            this.errored = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }
        }
    }

    fn buffer_tokens(
        tokens: Result<Tokens<'_>, Error>,
        pending: &mut VecDeque<Token>,
    ) -> Result<(), StreamError> {
        for token in tokens? {
            pending.push_back(token?);
        }
        Ok(())
    }

    /// Adapts a stream of tokens into a stream of records. Mirror of
    /// [`TokenStream`] over the assembler.
    pub struct RecordStream<S> {
        inner: S,
        assembler: RecordAssembler,
        pending: VecDeque<Record>,
        flushed: bool,
        errored: bool,
    }

    impl<S> RecordStream<S> {
        pub fn new(inner: S, assembler: RecordAssembler) -> Self {
            Self {
                inner,
                assembler,
                pending: VecDeque::new(),
                flushed: false,
                errored: false,
            }
        }
    }

    impl<S> Stream for RecordStream<S>
    where
        S: Stream<Item = Token> + Unpin,
    {
        type Item = Result<Record, StreamError>;

        fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let this = self.get_mut();
            loop {
                if this.errored {
                    return Poll::Ready(None);
                }
                if let Some(record) = this.pending.pop_front() {
                    return Poll::Ready(Some(Ok(record)));
                }
                if this.flushed {
                    return Poll::Ready(None);
                }
                match Pin::new(&mut this.inner).poll_next(cx) {
                    Poll::Ready(Some(token)) => {
                        if let Err(err) =
                            buffer_records(this.assembler.feed(Some(token)), &mut this.pending)
                        {
                            this.errored = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                    Poll::Ready(None) => {
                        this.flushed = true;
                        if let Err(err) =
                            buffer_records(this.assembler.finish(), &mut this.pending)
                        {
                            this.errored = true;
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }
        }
    }

    fn buffer_records<I>(
        records: Records<'_, I>,
        pending: &mut VecDeque<Record>,
    ) -> Result<(), StreamError>
    where
        I: Iterator<Item = Token>,
    {
        for record in records {
            pending.push_back(record?);
        }
        Ok(())
    }
}
