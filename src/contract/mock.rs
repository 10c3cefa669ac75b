//! Purpose: Short-lived mock provider driven by contract interactions.
//! Exports: `MockServer`.
//! Role: Lets a consumer test its real HTTP client without the real provider.
//! Invariants: A request is served by the first interaction whose method, path, and
//! request-body matcher all accept it; anything else is recorded as unexpected.
//! Invariants: `verify` fails unless every interaction was exercised and nothing unexpected arrived.
#![allow(clippy::result_large_err)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

use super::matcher::match_body;
use super::model::Interaction;
use crate::core::error::{Error, ErrorKind};
use crate::serve::{BackgroundServer, error_response_with_status};

pub struct MockServer {
    state: Arc<MockState>,
    server: BackgroundServer,
}

struct MockState {
    interactions: Vec<Interaction>,
    hits: Mutex<Vec<usize>>,
    unexpected: Mutex<Vec<String>>,
}

impl MockServer {
    pub fn start(interactions: Vec<Interaction>) -> Result<Self, Error> {
        let hits = vec![0; interactions.len()];
        let state = Arc::new(MockState {
            interactions,
            hits: Mutex::new(hits),
            unexpected: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .fallback(handle_request)
            .with_state(Arc::clone(&state));
        let bind = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = BackgroundServer::start(app, bind)?;
        tracing::debug!(addr = %server.addr(), "mock provider listening");
        Ok(Self { state, server })
    }

    pub fn url(&self) -> String {
        self.server.base_url()
    }

    pub fn verify(&self) -> Result<(), Error> {
        let mut problems = Vec::new();
        {
            let hits = self.state.hits.lock();
            for (interaction, count) in self.state.interactions.iter().zip(hits.iter()) {
                if *count == 0 {
                    problems.push(format!("not received: {}", interaction.description));
                }
            }
        }
        for request in self.state.unexpected.lock().iter() {
            problems.push(format!("unexpected request: {request}"));
        }
        if problems.is_empty() {
            return Ok(());
        }
        Err(Error::new(ErrorKind::Mismatch)
            .with_message(problems.join("; "))
            .with_hint("The consumer did not issue exactly the requests its contract describes."))
    }
}

async fn handle_request(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let matched = state.interactions.iter().position(|interaction| {
        interaction.request.method.eq_ignore_ascii_case(method.as_str())
            && interaction.request.path == path
            && match_body(interaction.request.body.as_ref(), &body).is_empty()
    });

    let Some(index) = matched else {
        let summary = format!("{method} {path}");
        tracing::warn!(request = %summary, "mock provider received an unexpected request");
        state.unexpected.lock().push(summary.clone());
        return error_response_with_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            Error::new(ErrorKind::Mismatch)
                .with_message(format!("no interaction matches {summary}")),
        );
    };
    state.hits.lock()[index] += 1;

    let response = &state.interactions[index].response;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match &response.body {
        Some(matcher) => {
            let mut reply = (status, matcher.example().to_string()).into_response();
            reply.headers_mut().insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            reply
        }
        None => status.into_response(),
    }
}
