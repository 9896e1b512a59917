// Document syntax error paths
// Directive-free inputs that must be rejected by the document parser

use confc::{resolve_str, ResolveError, ResolveOptions};

fn syntax_error(source: &str) -> ResolveError {
    let result = resolve_str(source, "test.js", &ResolveOptions::default());
    match result {
        Ok(resolution) => panic!("Should fail, got {}", resolution.to_value()),
        Err(err) => {
            assert!(
                matches!(err, ResolveError::Syntax { .. }),
                "Expected a syntax error, got {:?}",
                err
            );
            err
        }
    }
}

#[test]
fn test_parser_error_missing_closing_brace() {
    syntax_error("{ \"key\": 123");
}

#[test]
fn test_parser_error_missing_closing_bracket() {
    syntax_error("{ \"arr\": [1, 2, 3 }");
}

#[test]
fn test_parser_error_missing_colon() {
    let err = syntax_error("{ \"key\" 123 }");
    assert!(err.to_string().contains("`:`"), "{}", err);
}

#[test]
fn test_parser_error_missing_comma() {
    syntax_error("{ \"a\": 1 \"b\": 2 }");
}

#[test]
fn test_parser_error_unexpected_eof() {
    syntax_error("{ \"key\": ");
}

#[test]
fn test_parser_error_empty_document() {
    syntax_error("");
    syntax_error("  /* only a comment */  ");
}

#[test]
fn test_parser_error_trailing_content() {
    syntax_error("{} {}");
    syntax_error("[1] ]");
}

#[test]
fn test_parser_error_numeric_key() {
    syntax_error("{ 1: \"one\" }");
}

#[test]
fn test_parser_error_double_comma() {
    syntax_error("[1,, 2]");
    syntax_error("{ \"a\": 1,, }");
}

#[test]
fn test_parser_error_leading_comma() {
    syntax_error("[, 1]");
}

#[test]
fn test_parser_error_invalid_number() {
    syntax_error("{ \"n\": 0x1F }");
    syntax_error("{ \"n\": 1.2.3 }");
}

#[test]
fn test_parser_error_minus_without_number() {
    syntax_error("{ \"n\": - \"x\" }");
}

#[test]
fn test_parser_error_stray_operator() {
    syntax_error("{ \"a\": * }");
    syntax_error("{ \"a\": ( }");
}

#[test]
fn test_parser_error_line_after_directives() {
    let err = syntax_error("#define A 1\n\n{\n  \"a\": A\n  \"b\": 2\n}");
    assert_eq!(err.line(), 5);
}

#[test]
fn test_parser_error_deep_nesting() {
    let levels = 100_000;
    let source = format!("{{\"a\": {}{}}}", "[".repeat(levels), "]".repeat(levels));
    let err = syntax_error(&source);
    assert!(err.to_string().contains("nested deeper than 128"), "{}", err);
}
