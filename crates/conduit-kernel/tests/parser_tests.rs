//! Parser tests using rstest for parameterization and insta for snapshots.

use conduit_kernel::parser::{ParseError, parse};
use conduit_testutil::format_tree;
use insta::assert_snapshot;
use rstest::rstest;

/// Parse and render, panicking with the input on failure.
fn tree_of(input: &str) -> String {
    let tree = parse(input).unwrap_or_else(|e| panic!("parse error for {input:?}: {e}"));
    format_tree(&tree)
}

// =============================================================================
// LINES
// =============================================================================

#[test]
fn parser_empty() {
    assert_snapshot!(tree_of(""), @"(block)");
}

#[test]
fn parser_single_command() {
    assert_snapshot!(tree_of("echo hello world"), @"(block (cmd echo hello world))");
}

#[test]
fn parser_newline_separates_statements() {
    assert_snapshot!(tree_of("a\nb"), @"(block (cmd a) (cmd b))");
}

#[test]
fn parser_terminator() {
    assert_snapshot!(tree_of("a; b"), @"(block (cmd a) (;) (cmd b))");
}

#[test]
fn parser_quoted_word() {
    assert_snapshot!(tree_of(r#"echo "hello world""#), @r#"(block (cmd echo "hello world"))"#);
}

// =============================================================================
// PIPES
// =============================================================================

#[test]
fn parser_bare_pipe() {
    assert_snapshot!(tree_of("echo hi | grep h"), @"(block (cmd echo hi) (pipe -1.1>+1.0) (cmd grep h))");
}

#[test]
fn parser_cork() {
    assert_snapshot!(tree_of("a |.2> b"), @"(block (cmd a) (pipe -1.2>cork) (cmd b))");
}

#[test]
fn parser_fan_out() {
    assert_snapshot!(
        tree_of("a |>+1,>+2 b\nc"),
        @"(block (cmd a) (pipe -1.1>+1.0 -1.1>+2.0) (cmd b) (cmd c))"
    );
}

#[test]
fn parser_labels() {
    assert_snapshot!(
        tree_of("build: make |build.2>test.0 test: check"),
        @"(block (cmd build: make) (pipe build.2>test.0) (cmd test: check))"
    );
}

#[test]
fn parser_backward_route() {
    assert_snapshot!(tree_of("|sink<src.2"), @"(block (pipe src.2>sink.0))");
}

#[test]
fn parser_gt_shorthand() {
    assert_snapshot!(tree_of(">out"), @"(block (pipe -1.1>out.0))");
}

// =============================================================================
// BLOCKS
// =============================================================================

#[test]
fn parser_substitution() {
    assert_snapshot!(tree_of("echo {echo inner}"), @"(block (cmd echo (block (cmd echo inner))))");
}

#[test]
fn parser_semicolon_inside_block_is_literal() {
    assert_snapshot!(tree_of("{ a; b }"), @"(block (cmd (block (cmd a; b))))");
}

#[test]
fn parser_empty_block() {
    assert_snapshot!(tree_of("x {} y"), @"(block (cmd x (block) y))");
}

#[test]
fn parser_multiline_block() {
    assert_snapshot!(
        tree_of("{\n  echo a\n  echo b | cat\n}"),
        @"(block (cmd (block (cmd echo a) (cmd echo b) (pipe -1.1>+1.0) (cmd cat))))"
    );
}

// =============================================================================
// ROUND TRIPS
// =============================================================================

#[rstest]
#[case::pipe("echo hi | grep h")]
#[case::terminator("a; b")]
#[case::block_with_semicolon("echo { a; b } c")]
#[case::quoting(r#"echo "x y" "" "q\"uote""#)]
#[case::cork_then_newline("a |.2> b\nc")]
#[case::nested("x { y { z } }")]
#[case::labels("build: make |build.2>test.0 test: check")]
#[case::escaped_brace(r"echo \{x")]
#[case::multiline_block("{\n echo a\n echo b\n}")]
fn display_round_trips(#[case] input: &str) {
    let tree = parse(input).expect("parse failed");
    let rendered = tree.to_string();
    let reparsed = parse(&rendered).unwrap_or_else(|e| panic!("{rendered:?} did not reparse: {e}"));
    assert_eq!(reparsed, tree, "rendered as {rendered:?}");
}

// =============================================================================
// ERRORS
// =============================================================================

#[rstest]
#[case::stray_close("a }", false)]
#[case::unclosed_block("echo { a", true)]
#[case::unclosed_nested("{ { a }", true)]
#[case::unterminated_string(r#"echo "abc"#, true)]
#[case::dangling_escape(r"echo \", true)]
#[case::bad_fd("a |.9 b", false)]
#[case::double_marker("a |x>y>z b", false)]
fn parser_errors(#[case] input: &str, #[case] incomplete: bool) {
    let err = parse(input).expect_err("expected a parse error");
    assert_eq!(err.is_incomplete(), incomplete, "{input:?}: {err}");
}

#[test]
fn route_error_names_the_token() {
    let err = parse("a |.9 b").unwrap_err();
    let ParseError::Route { source, .. } = &err else {
        panic!("expected route error, got {err:?}");
    };
    assert_eq!(source.token, "|.9");
}
