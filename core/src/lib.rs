#![deny(
    unsafe_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

pub mod config;
mod assembler;
mod cancel;
mod error;
mod lexer;
mod token;

#[cfg(any(feature = "tokio", feature = "futures"))]
pub mod async_stream;

pub use assembler::{RecordAssembler, Records};
pub use cancel::CancelToken;
pub use config::{AssemblerConfig, LexerConfig};
pub use error::{Error, ErrorContext, ErrorKind};
pub use lexer::{Lexer, Tokens};
pub use token::{Location, Position, Record, Token};
