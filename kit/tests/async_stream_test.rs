//! Tests for the streaming pipeline adapters.
//!
//! Covers the tokio channel stages (backpressure, error propagation, channel
//! closure, cancellation) and the runtime-agnostic `Stream` adapters.

#![cfg(feature = "tokio")]

use csvflow::async_stream::tokio_impl::{AssemblerStream, LexerStream, cancel_after};
use csvflow::async_stream::{StreamConfig, StreamError};
use csvflow::{
    AssemblerConfig, CancelToken, Error, Lexer, LexerConfig, Record, RecordAssembler, Token,
};
use std::time::Duration;
use tokio::sync::mpsc;

fn lexer() -> Lexer {
    Lexer::new(LexerConfig::default()).unwrap()
}

fn assembler() -> RecordAssembler {
    RecordAssembler::new(AssemblerConfig::default()).unwrap()
}

#[tokio::test]
async fn full_pipeline_chunks_to_records() {
    let (token_tx, token_rx) = mpsc::channel::<Token>(1024);
    let (record_tx, mut record_rx) = mpsc::channel::<Record>(256);

    let lexer_handle = tokio::spawn(async move {
        let mut stage = LexerStream::new(lexer(), token_tx);
        for chunk in ["name,city\n", "Alice,Lis", "bon\nBob,Porto\n"] {
            stage.feed(chunk).await?;
        }
        stage.finish().await
    });
    let assembler_handle =
        tokio::spawn(AssemblerStream::new(assembler(), record_tx).run(token_rx));

    let mut records = Vec::new();
    while let Some(record) = record_rx.recv().await {
        records.push(record);
    }

    lexer_handle.await.unwrap().unwrap();
    assembler_handle.await.unwrap().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["name"], "Alice");
    assert_eq!(records[0]["city"], "Lisbon");
    assert_eq!(records[1]["name"], "Bob");
    assert_eq!(records[1]["city"], "Porto");
}

#[tokio::test]
async fn backpressure_with_tiny_queues() {
    let (token_tx, token_rx) = mpsc::channel::<Token>(1);
    let (record_tx, mut record_rx) = mpsc::channel::<Record>(1);
    let config = StreamConfig::small().with_check_interval(1);

    let lexer_handle = tokio::spawn(async move {
        let mut stage = LexerStream::with_config(lexer(), token_tx, config);
        stage.feed("a,b\n").await?;
        for row in 0..100 {
            stage.feed(&format!("{row},{row}\n")).await?;
        }
        stage.finish().await
    });
    let assembler_handle = tokio::spawn(
        AssemblerStream::with_config(assembler(), record_tx, config).run(token_rx),
    );

    let mut count = 0;
    while record_rx.recv().await.is_some() {
        count += 1;
    }

    lexer_handle.await.unwrap().unwrap();
    assembler_handle.await.unwrap().unwrap();
    assert_eq!(count, 100);
}

#[tokio::test]
async fn lexer_errors_convert_the_stage() {
    let (token_tx, mut token_rx) = mpsc::channel::<Token>(16);

    let mut stage = LexerStream::new(lexer(), token_tx);
    stage.feed("a,\"open").await.unwrap();
    let err = stage.finish().await.unwrap_err();

    assert!(matches!(
        err,
        StreamError::Csv(Error::UnterminatedQuote { .. })
    ));
    // Tokens produced before the fault were forwarded; nothing after it.
    let mut forwarded = Vec::new();
    while let Ok(token) = token_rx.try_recv() {
        forwarded.push(token);
    }
    assert_eq!(forwarded.len(), 2);
}

#[tokio::test]
async fn dropped_consumer_surfaces_as_channel_closed() {
    let (token_tx, token_rx) = mpsc::channel::<Token>(16);
    let (record_tx, record_rx) = mpsc::channel::<Record>(16);
    drop(record_rx);

    let assembler_handle =
        tokio::spawn(AssemblerStream::new(assembler(), record_tx).run(token_rx));

    // The only record appears at flush, after every token was delivered, so
    // the lexer stage itself never races the dying assembler.
    let mut stage = LexerStream::new(lexer(), token_tx);
    stage.feed("a\n1").await.unwrap();
    stage.finish().await.unwrap();

    let result = assembler_handle.await.unwrap();
    assert_eq!(result, Err(StreamError::ChannelClosed));
}

#[tokio::test]
async fn cancellation_reason_aborts_the_stage() {
    let cancel = CancelToken::new();
    let (token_tx, _token_rx) = mpsc::channel::<Token>(16);

    let config = LexerConfig::new().with_cancel(cancel.clone());
    let mut stage = LexerStream::new(Lexer::new(config).unwrap(), token_tx);

    stage.feed("a,b\n").await.unwrap();
    cancel.cancel("caller timed out");
    let err = stage.feed("1,2\n").await.unwrap_err();

    assert!(matches!(
        err,
        StreamError::Csv(Error::Cancelled { ref reason }) if reason == "caller timed out"
    ));
}

#[tokio::test]
async fn cancel_after_fires_the_handle() {
    let cancel = CancelToken::new();
    cancel_after(cancel.clone(), Duration::from_millis(5)).await;
    assert!(cancel.is_cancelled());
    assert_eq!(cancel.reason(), Some("deadline elapsed"));
}

#[cfg(feature = "futures")]
mod futures_tests {
    use super::*;
    use csvflow::async_stream::futures_impl::{RecordStream, TokenStream};
    use futures_core::Stream;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    struct Scripted<T> {
        items: Vec<T>,
        index: usize,
    }

    impl<T> Scripted<T> {
        fn new(items: Vec<T>) -> Self {
            Self { items, index: 0 }
        }
    }

    impl<T: Clone + Unpin> Stream for Scripted<T> {
        type Item = T;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            if self.index < self.items.len() {
                let item = self.items[self.index].clone();
                self.index += 1;
                Poll::Ready(Some(item))
            } else {
                Poll::Ready(None)
            }
        }
    }

    async fn collect_stream<S: Stream + Unpin>(mut stream: S) -> Vec<S::Item> {
        let mut items = Vec::new();
        std::future::poll_fn(|cx| {
            loop {
                match Pin::new(&mut stream).poll_next(cx) {
                    Poll::Ready(Some(item)) => items.push(item),
                    Poll::Ready(None) => return Poll::Ready(()),
                    Poll::Pending => return Poll::Pending,
                }
            }
        })
        .await;
        items
    }

    #[tokio::test]
    async fn token_stream_flushes_after_the_last_chunk() {
        let chunks = Scripted::new(vec!["a,b\n1,".to_string(), "2".to_string()]);
        let tokens = collect_stream(TokenStream::new(chunks, lexer())).await;

        let values: Vec<String> = tokens
            .into_iter()
            .map(|token| token.unwrap().value().to_string())
            .collect();
        assert_eq!(values, ["a", ",", "b", "\n", "1", ",", "2"]);
    }

    #[tokio::test]
    async fn record_stream_over_scripted_tokens() {
        let tokens: Vec<Token> = {
            let mut lexer = lexer();
            lexer
                .finish_with("a,b\n1,2\n3,4")
                .unwrap()
                .map(|token| token.unwrap())
                .collect()
        };
        let records = collect_stream(RecordStream::new(Scripted::new(tokens), assembler())).await;

        let records: Vec<Record> = records.into_iter().map(|record| record.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], "1");
        assert_eq!(records[1]["b"], "4");
    }

    #[tokio::test]
    async fn token_stream_is_fused_after_an_error() {
        let chunks = Scripted::new(vec!["a,\"open".to_string()]);
        let results = collect_stream(TokenStream::new(chunks, lexer())).await;

        // Two good tokens, one terminal error, nothing afterwards.
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(StreamError::Csv(Error::UnterminatedQuote { .. }))
        ));
    }
}
