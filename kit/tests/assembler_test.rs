//! Record assembly: header capture, empty-line policy, limits, flush.

use csvflow::{
    AssemblerConfig, Error, ErrorKind, Lexer, LexerConfig, Record, RecordAssembler, Token,
};
use test_case::test_case;

fn tokens(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(LexerConfig::default()).unwrap();
    lexer
        .finish_with(input)
        .unwrap()
        .map(|token| token.unwrap())
        .collect()
}

fn parse(input: &str) -> Vec<Record> {
    parse_with(input, AssemblerConfig::default())
}

fn parse_with(input: &str, config: AssemblerConfig) -> Vec<Record> {
    let mut assembler = RecordAssembler::new(config).unwrap();
    assembler
        .finish_with(tokens(input))
        .map(|record| record.unwrap())
        .collect()
}

fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn single_data_row() {
    assert_eq!(
        parse("a,b,c\n1,2,3"),
        [record(&[("a", "1"), ("b", "2"), ("c", "3")])]
    );
}

#[test]
fn empty_field_between_delimiters() {
    assert_eq!(
        parse("a,b,c\n1,,3"),
        [record(&[("a", "1"), ("b", ""), ("c", "3")])]
    );
}

#[test]
fn trailing_newline_emits_no_phantom_record() {
    assert_eq!(
        parse("a,b,c\n1,2,3\n"),
        [record(&[("a", "1"), ("b", "2"), ("c", "3")])]
    );
}

#[test]
fn blank_line_becomes_an_empty_record_by_default() {
    assert_eq!(
        parse("a,b,c\n\n1,2,3"),
        [
            record(&[("a", ""), ("b", ""), ("c", "")]),
            record(&[("a", "1"), ("b", "2"), ("c", "3")]),
        ]
    );
}

#[test]
fn skip_empty_lines_drops_blank_rows() {
    let config = AssemblerConfig::new().skip_empty_lines(true);
    assert_eq!(
        parse_with("a,b,c\n\n\n1,2,3\n\n", config),
        [record(&[("a", "1"), ("b", "2"), ("c", "3")])]
    );
}

#[test]
fn quoted_header_with_embedded_newline() {
    assert_eq!(
        parse("\"fie\nld\"\n\"Hello\nWorld\""),
        [record(&[("fie\nld", "Hello\nWorld")])]
    );
}

#[test]
fn short_rows_pad_with_empty_strings() {
    assert_eq!(
        parse("a,b,c\n1\n"),
        [record(&[("a", "1"), ("b", ""), ("c", "")])]
    );
}

#[test]
fn long_rows_drop_values_past_the_header() {
    assert_eq!(
        parse("a,b\n1,2,3\n"),
        [record(&[("a", "1"), ("b", "2")])]
    );
}

#[test]
fn key_order_follows_the_header_row() {
    let records = parse("c,a,b\n3,1,2");
    let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, ["c", "a", "b"]);
}

#[test]
fn header_only_documents_yield_no_records() {
    assert!(parse("a,b,c\n").is_empty());
    assert!(parse("a,b,c").is_empty());
}

#[test]
fn explicit_header_turns_the_first_row_into_data() {
    let config = AssemblerConfig::new().with_header(["x", "y"]);
    assert_eq!(
        parse_with("1,2\n3,4", config),
        [
            record(&[("x", "1"), ("y", "2")]),
            record(&[("x", "3"), ("y", "4")]),
        ]
    );
}

#[test]
fn one_field_with_explicit_header_is_one_record() {
    let config = AssemblerConfig::new().with_header(["h"]);
    assert_eq!(parse_with("a", config), [record(&[("h", "a")])]);
}

#[test]
fn dunder_proto_is_an_inert_key() {
    let records = parse("__proto__,b\nx,y");
    assert_eq!(records[0]["__proto__"], "x");
    assert_eq!(records[0]["b"], "y");
}

#[test_case(&["a", "a"]; "explicit duplicate")]
#[test_case(&[]; "explicit empty")]
fn invalid_explicit_headers_fail_at_construction(header: &[&str]) {
    let config = AssemblerConfig::new().with_header(header.iter().copied());
    let err = RecordAssembler::new(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn captured_duplicate_header_is_a_parse_error() {
    let mut assembler = RecordAssembler::new(AssemblerConfig::default()).unwrap();
    let results: Vec<_> = assembler.finish_with(tokens("a,a\n1,2")).collect();
    assert!(matches!(
        &results[0],
        Err(Error::DuplicateHeader { name, .. }) if name == "a"
    ));
}

#[test]
fn empty_leading_line_cannot_become_a_header() {
    let mut assembler = RecordAssembler::new(AssemblerConfig::default()).unwrap();
    let results: Vec<_> = assembler.finish_with(tokens("\n1,2")).collect();
    assert!(matches!(results[0], Err(Error::EmptyHeader { .. })));
}

#[test]
fn field_count_limit_is_enforced_mid_row() {
    let config = AssemblerConfig::new().with_max_field_count(2);
    let mut assembler = RecordAssembler::new(config).unwrap();
    let results: Vec<_> = assembler.finish_with(tokens("a,b,c\n")).collect();

    let err = results[0].clone().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.row_number(), Some(1));
    assert!(matches!(
        err,
        Error::FieldCountOverflow { count: 3, max: 2, .. }
    ));
}

#[test]
fn explicit_header_respects_the_field_count_limit() {
    let config = AssemblerConfig::new()
        .with_max_field_count(2)
        .with_header(["a", "b", "c"]);
    assert!(matches!(
        RecordAssembler::new(config),
        Err(Error::FieldCountOverflow { count: 3, max: 2, .. })
    ));
}

#[test]
fn streaming_pipeline_retains_partial_rows() {
    let mut lexer = Lexer::new(LexerConfig::default()).unwrap();
    let mut assembler = RecordAssembler::new(AssemblerConfig::default()).unwrap();

    let mut records = Vec::new();
    for chunk in ["a,b\n1,", "2\n3", ",4"] {
        let chunk_tokens: Vec<Token> = lexer
            .feed(chunk)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        records.extend(assembler.feed(chunk_tokens).map(|record| record.unwrap()));
    }
    let tail: Vec<Token> = lexer.finish().unwrap().collect::<Result<_, _>>().unwrap();
    records.extend(
        assembler
            .finish_with(tail)
            .map(|record| record.unwrap()),
    );

    assert_eq!(
        records,
        [
            record(&[("a", "1"), ("b", "2")]),
            record(&[("a", "3"), ("b", "4")]),
        ]
    );
}

#[test]
fn cancellation_propagates_between_tokens() {
    let cancel = csvflow::CancelToken::new();
    let config = AssemblerConfig::new().with_cancel(cancel.clone());
    let mut assembler = RecordAssembler::new(config).unwrap();

    let input = tokens("a,b\n1,2\n");
    cancel.cancel("shutting down");
    let results: Vec<_> = assembler.finish_with(input).collect();

    assert_eq!(results.len(), 1);
    assert!(matches!(
        &results[0],
        Err(Error::Cancelled { reason }) if reason == "shutting down"
    ));
}
