//! Pipe-route parser.
//!
//! A pipe token addresses streams between statements:
//!
//! ```text
//! |                 previous stdout -> next stdin
//! |.2               previous stderr -> next stdin
//! |.2>              previous stderr, discarded (corked)
//! |build.2>test.0   stderr of `build` -> stdin of `test`
//! |>+1,>+2          previous stdout -> next two statements
//! |a<b              stdout of `b` -> stdin of `a`
//! >out              same as |>out
//! ```
//!
//! Each comma-separated spec is `endpoint [marker [endpoint]]` with
//! `endpoint = index[.fd]`. A marker with nothing after it corks the source.

use chumsky::prelude::*;
use thiserror::Error;

use crate::ast::{Endpoint, Fd, Index, PipeDescriptor, Route};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pipe route `{token}`: {message}")]
pub struct RouteError {
    pub token: String,
    pub message: String,
}

/// An endpoint as written, before defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawEndpoint<'a> {
    index: &'a str,
    fd: Option<Fd>,
}

impl RawEndpoint<'_> {
    fn is_empty(&self) -> bool {
        self.index.is_empty() && self.fd.is_none()
    }

    fn resolve(&self, default_index: i64, default_fd: Fd) -> Endpoint {
        let index = if self.index.is_empty() {
            Index::Offset(default_index)
        } else {
            match self.index.parse::<i64>() {
                Ok(offset) => Index::Offset(offset),
                Err(_) => Index::Label(self.index.to_string()),
            }
        };
        Endpoint::new(index, self.fd.unwrap_or(default_fd))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Marker {
    Forward,
    Backward,
}

type RawSpec<'a> = (RawEndpoint<'a>, Option<(Marker, RawEndpoint<'a>)>);

fn spec_parser<'a>() -> impl Parser<'a, &'a str, Vec<RawSpec<'a>>, extra::Err<Rich<'a, char>>> {
    let fd = just('.')
        .ignore_then(text::int(10))
        .try_map(|digits: &str, span| {
            digits
                .parse::<u32>()
                .ok()
                .and_then(Fd::from_number)
                .ok_or_else(|| Rich::custom(span, format!("fd must be 0, 1 or 2, got {digits}")))
        });

    let endpoint = none_of(".,<>|")
        .repeated()
        .to_slice()
        .then(fd.or_not())
        .map(|(index, fd)| RawEndpoint { index, fd });

    let marker = choice((
        just('>').to(Marker::Forward),
        just('<').to(Marker::Backward),
    ));

    endpoint
        .clone()
        .then(marker.then(endpoint).or_not())
        .separated_by(just(','))
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(end())
}

fn build_route(spec: RawSpec<'_>) -> Route {
    match spec {
        (source, None) => Route::Connect {
            from: source.resolve(-1, Fd::Stdout),
            to: Endpoint::new(Index::Offset(1), Fd::Stdin),
        },
        (source, Some((_, rest))) if rest.is_empty() => Route::Cork {
            from: source.resolve(-1, Fd::Stdin),
        },
        (left, Some((Marker::Forward, right))) => Route::Connect {
            from: left.resolve(-1, Fd::Stdout),
            to: right.resolve(1, Fd::Stdin),
        },
        (left, Some((Marker::Backward, right))) => Route::Connect {
            from: right.resolve(-1, Fd::Stdout),
            to: left.resolve(1, Fd::Stdin),
        },
    }
}

/// Parse one pipe token (`|...`, or `>...` as shorthand for `|>...`).
pub fn parse_route(token: &str) -> Result<PipeDescriptor, RouteError> {
    let body = if let Some(rest) = token.strip_prefix('|') {
        rest
    } else if token.starts_with('>') {
        token
    } else {
        return Err(RouteError {
            token: token.to_string(),
            message: "expected `|` or `>`".to_string(),
        });
    };

    let specs = spec_parser().parse(body).into_result().map_err(|errors| RouteError {
        token: token.to_string(),
        message: errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "),
    })?;

    Ok(PipeDescriptor {
        text: token.to_string(),
        routes: specs.into_iter().map(build_route).collect(),
    })
}
