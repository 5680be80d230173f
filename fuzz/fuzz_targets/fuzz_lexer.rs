#![no_main]

use csvflow::{Error, Lexer, LexerConfig, Token};
use libfuzzer_sys::fuzz_target;

fn lex_chunks(chunks: &[&str]) -> Vec<Result<Token, Error>> {
    let mut lexer = Lexer::new(LexerConfig::default()).unwrap();
    let mut out = Vec::new();
    for chunk in chunks {
        match lexer.feed(chunk) {
            Ok(tokens) => out.extend(tokens),
            Err(err) => {
                out.push(Err(err));
                return out;
            }
        }
    }
    match lexer.finish() {
        Ok(tokens) => out.extend(tokens),
        Err(err) => out.push(Err(err)),
    }
    out
}

// Single-shot lexing and split lexing must produce identical token
// sequences, including any trailing error.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let single = lex_chunks(&[text]);

        let mid = text
            .char_indices()
            .map(|(index, _)| index)
            .nth(text.chars().count() / 2)
            .unwrap_or(0);
        let halves = lex_chunks(&[&text[..mid], &text[mid..]]);
        assert_eq!(single, halves);

        for token in single.into_iter().flatten() {
            let location = token.location();
            assert!(location.end.offset > location.start.offset);
            assert!(location.row_number >= 1);
        }
    }
});
