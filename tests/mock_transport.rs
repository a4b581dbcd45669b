#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use turnos_load::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    NetworkError,
    HarnessError,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Status(200, body.to_string())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new())
    }
}

struct Route {
    method: HttpMethod,
    prefix: String,
    replies: VecDeque<Reply>,
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub method: HttpMethod,
    pub path: String,
    pub name: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
    pub at: Instant,
}

impl Sent {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Script {
    routes: Vec<Route>,
    sent: Vec<Sent>,
}

/// Answers requests from a script keyed by method and path prefix. Each
/// route replays its replies in order and then repeats the last one.
/// Unscripted requests get a 404. Clones share the script and the log.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: HttpMethod, prefix: &str, replies: Vec<Reply>) -> Self {
        self.script.lock().unwrap().routes.push(Route {
            method,
            prefix: prefix.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn count(&self, method: HttpMethod, prefix: &str) -> usize {
        self.sent()
            .iter()
            .filter(|s| s.method == method && s.path.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.sent.push(Sent {
            method: request.method,
            path: request.path.clone(),
            name: request.name,
            headers: request.headers.clone(),
            body: request.body.clone(),
            at: Instant::now(),
        });

        let reply = script
            .routes
            .iter_mut()
            .find(|r| r.method == request.method && request.path.starts_with(&r.prefix))
            .and_then(|route| {
                if route.replies.len() > 1 {
                    route.replies.pop_front()
                } else {
                    route.replies.front().cloned()
                }
            })
            .unwrap_or_else(|| Reply::status(404));

        match reply {
            Reply::Status(status, body) => Ok(HttpResponse { status, body }),
            Reply::NetworkError => Err(TransportError::Network("connection refused".into())),
            Reply::HarnessError => Err(TransportError::Harness("bad url".into())),
        }
    }
}
