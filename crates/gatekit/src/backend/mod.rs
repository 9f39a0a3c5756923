//! The [`Gate`] trait and its implementations.
//!
//! [`http::HttpGate`] talks to a real Gate service over HTTP. [`MockGate`]
//! replays scripted responses and records every request, which makes it the
//! tool of choice for tests:
//!
//! ```
//! use gatekit::{Gate, GateRequest, Method, MockGate};
//!
//! let mock = MockGate::new();
//! mock.on(Method::Get, "/applications/demo", 200, r#"{"name": "demo"}"#);
//!
//! let response = mock.send(&GateRequest::get("/applications/demo")).unwrap();
//! assert_eq!(response.status, 200);
//! assert_eq!(mock.call_count(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{GateRequest, Method, RawResponse};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A pre-authenticated handle to the Gate API.
///
/// Implementations must be shareable across threads; a single handle is used
/// read-only by every concurrent reconciliation.
pub trait Gate: Send + Sync {
    /// Send a request and return the raw response.
    ///
    /// Any HTTP status is a successful return. Only failures that prevent a
    /// response from being read are errors.
    fn send(&self, request: &GateRequest) -> Result<RawResponse>;
}

impl<G: Gate + ?Sized> Gate for &G {
    fn send(&self, request: &GateRequest) -> Result<RawResponse> {
        (**self).send(request)
    }
}

impl<G: Gate + ?Sized> Gate for Box<G> {
    fn send(&self, request: &GateRequest) -> Result<RawResponse> {
        (**self).send(request)
    }
}

impl<G: Gate + ?Sized> Gate for Arc<G> {
    fn send(&self, request: &GateRequest) -> Result<RawResponse> {
        (**self).send(request)
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Response(RawResponse),
    TransportError(String),
}

type RouteKey = (Method, String);

/// In-memory Gate for tests.
///
/// Replies are scripted per method and path. Each route holds a queue; the
/// last reply of a queue is sticky and repeats for every further call.
/// Unscripted routes answer `404` with an empty body.
#[derive(Debug, Clone, Default)]
pub struct MockGate {
    routes: Arc<Mutex<HashMap<RouteKey, VecDeque<MockReply>>>>,
    calls: Arc<Mutex<Vec<GateRequest>>>,
}

impl MockGate {
    /// Create a mock with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a route.
    pub fn on(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, MockReply::Response(RawResponse::new(status, body)));
        self
    }

    /// Queue a JSON response for a route.
    pub fn on_json(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: &serde_json::Value,
    ) -> &Self {
        self.on(method, path, status, &body.to_string())
    }

    /// Queue a transport failure for a route.
    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, MockReply::TransportError(message.to_string()));
        self
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<GateRequest> {
        lock(&self.calls).clone()
    }

    /// Requests received for one route.
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<GateRequest> {
        lock(&self.calls)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of non-`GET` requests received.
    pub fn mutation_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|r| r.method != Method::Get)
            .count()
    }

    fn push(&self, method: Method, path: &str, reply: MockReply) {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<MockReply> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Gate for MockGate {
    fn send(&self, request: &GateRequest) -> Result<RawResponse> {
        lock(&self.calls).push(request.clone());

        match self.next_reply(request.method, &request.path) {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::TransportError(message)) => {
                Err(Error::transport(format!("mock://{}", request.path), message))
            }
            None => Ok(RawResponse::new(404, "")),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
