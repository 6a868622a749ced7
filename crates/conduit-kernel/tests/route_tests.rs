//! Pipe-route token tests.

use conduit_kernel::route::parse_route;
use rstest::rstest;

fn routes_of(token: &str) -> String {
    let pipe = parse_route(token).unwrap_or_else(|e| panic!("{token:?}: {e}"));
    pipe.routes
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[rstest]
#[case::bare("|", "-1.1>+1.0")]
#[case::stderr("|.2", "-1.2>+1.0")]
#[case::stdin_tee("|.0", "-1.0>+1.0")]
#[case::cork_stderr("|.2>", "-1.2>")]
#[case::cork_stdin("|>", "-1.0>")]
#[case::labels("|build.2>test.0", "build.2>test.0")]
#[case::fan_out("|>+1,>+2", "-1.1>+1.0,-1.1>+2.0")]
#[case::backward("|a<b", "b.1>a.0")]
#[case::gt_shorthand(">out", "-1.1>out.0")]
#[case::explicit_offsets("|-2.1>+1", "-2.1>+1.0")]
#[case::zero_offsets("|0>0", "0.1>0.0")]
#[case::mixed("|.2>,>+1", "-1.2>,-1.1>+1.0")]
fn route_defaults(#[case] token: &str, #[case] expected: &str) {
    assert_eq!(routes_of(token), expected);
}

#[rstest]
#[case::fd_too_big("|.3")]
#[case::fd_not_a_number("|.x")]
#[case::two_markers("|a>b>c")]
#[case::not_a_pipe("echo")]
fn route_errors(#[case] token: &str) {
    let err = parse_route(token).expect_err("expected a route error");
    assert_eq!(err.token, token);
}

#[test]
fn route_error_mentions_token() {
    let err = parse_route("|.7").unwrap_err();
    assert!(err.to_string().contains("`|.7`"), "{err}");
}
