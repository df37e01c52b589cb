//! Scripted in-process transport for tests.
//!
//! Routes match on method and path suffix; the most recently registered
//! route wins. Unmatched requests get a 404. Every request is recorded.

use crate::{HttpRequest, HttpResponse, HttpTransport, TransportError, TransportResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

type Responder = Arc<dyn Fn(&HttpRequest) -> TransportResult<HttpResponse> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    delay: Option<Duration>,
    responder: Responder,
}

/// Transport answering from registered routes.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `method path` with `responder`.
    pub fn on<F>(&self, method: Method, path: &str, responder: F) -> &Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.register(method, path, None, Arc::new(move |req: &HttpRequest| Ok(responder(req))))
    }

    /// Like [`on`](Self::on), but the response is held back for `delay`.
    pub fn on_delayed<F>(&self, method: Method, path: &str, delay: Duration, responder: F) -> &Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.register(
            method,
            path,
            Some(delay),
            Arc::new(move |req: &HttpRequest| Ok(responder(req))),
        )
    }

    /// Fail `method path` at the transport level.
    pub fn on_error(&self, method: Method, path: &str, error: TransportError) -> &Self {
        self.register(method, path, None, Arc::new(move |_: &HttpRequest| Err(error.clone())))
    }

    /// Answer with `responses` in order, repeating the last one.
    pub fn on_sequence(&self, method: Method, path: &str, responses: Vec<HttpResponse>) -> &Self {
        let queue = Mutex::new(VecDeque::from(responses));
        self.on(method, path, move |_| {
            let mut queue = queue.lock();
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_else(|| HttpResponse::empty(404))
            } else {
                queue
                    .front()
                    .cloned()
                    .unwrap_or_else(|| HttpResponse::empty(404))
            }
        })
    }

    fn register(
        &self,
        method: Method,
        path: &str,
        delay: Option<Duration>,
        responder: Responder,
    ) -> &Self {
        self.routes.lock().push(Route {
            method,
            path: normalize(path),
            delay,
            responder,
        });
        self
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose path ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        let path = normalize(path);
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path().ends_with(&path))
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        self.requests.lock().push(request.clone());

        let matched = self
            .routes
            .lock()
            .iter()
            .rev()
            .find(|route| route.method == request.method && request.path().ends_with(&route.path))
            .map(|route| (route.delay, route.responder.clone()));

        match matched {
            Some((delay, responder)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                responder(&request)
            }
            None => Ok(HttpResponse::empty(404)),
        }
    }
}
