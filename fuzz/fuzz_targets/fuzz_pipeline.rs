#![no_main]

use arbitrary::Arbitrary;
use csvflow::{AssemblerConfig, Lexer, LexerConfig, RecordAssembler, Token};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct PipelineInput {
    text: String,
    chunk_size: u8,
    skip_empty_lines: bool,
}

// Drive the full lexer + assembler pipeline over arbitrarily chunked input.
// Every emitted record must have exactly the captured header's keys.
fuzz_target!(|input: PipelineInput| {
    let chunk_size = usize::from(input.chunk_size % 7) + 1;
    let chars: Vec<char> = input.text.chars().collect();

    let mut lexer = Lexer::new(LexerConfig::default()).unwrap();
    let config = AssemblerConfig::new().skip_empty_lines(input.skip_empty_lines);
    let mut assembler = RecordAssembler::new(config).unwrap();
    let mut records = Vec::new();

    for chunk in chars.chunks(chunk_size) {
        let chunk: String = chunk.iter().collect();
        let Ok(tokens) = lexer.feed(&chunk) else {
            return;
        };
        let Ok(chunk_tokens) = tokens.collect::<Result<Vec<Token>, _>>() else {
            return;
        };
        for record in assembler.feed(chunk_tokens) {
            match record {
                Ok(record) => records.push(record),
                Err(_) => return,
            }
        }
    }
    let Ok(tokens) = lexer.finish() else { return };
    let Ok(tail) = tokens.collect::<Result<Vec<Token>, _>>() else {
        return;
    };
    for record in assembler.finish_with(tail) {
        match record {
            Ok(record) => records.push(record),
            Err(_) => return,
        }
    }

    if let Some(header) = assembler.header() {
        for record in &records {
            assert_eq!(record.len(), header.len());
            for (key, name) in record.keys().zip(header) {
                assert_eq!(key, name);
            }
        }
    } else {
        assert!(records.is_empty());
    }
});
