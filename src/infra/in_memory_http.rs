use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse, Method};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Reply = std::result::Result<HttpResponse, String>;

struct Route {
    method: Method,
    url_prefix: String,
    body_contains: Option<String>,
    replies: VecDeque<Reply>,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        self.method == request.method
            && request.url.starts_with(&self.url_prefix)
            && self
                .body_contains
                .as_ref()
                .map_or(true, |needle| request.body_text().contains(needle.as_str()))
    }

    /// Replies are consumed in order; the last one repeats forever.
    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_else(|| Err("no reply".into()))
        } else {
            self.replies
                .front()
                .cloned()
                .unwrap_or_else(|| Err("no reply".into()))
        }
    }
}

/// Scripted in-memory transport used by the unit and integration tests.
///
/// Routes are matched most-recently-registered first, by method, URL prefix and
/// (optionally) a substring of the request body. Unmatched requests get a 404.
#[derive(Default)]
pub struct InMemoryHttp {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl InMemoryHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, url_prefix: &str, replies: Vec<HttpResponse>) {
        self.push_route(method, url_prefix, None, replies.into_iter().map(Ok).collect());
    }

    /// Route a destination GraphQL operation by name, e.g. `"searchEvents"`.
    pub fn on_graphql(&self, endpoint: &str, operation: &str, data: serde_json::Value) {
        let reply = HttpResponse::json(200, serde_json::json!({ "data": data }));
        self.push_route(Method::Post, endpoint, Some(operation), vec![Ok(reply)]);
    }

    pub fn on_graphql_replies(&self, endpoint: &str, operation: &str, replies: Vec<HttpResponse>) {
        self.push_route(
            Method::Post,
            endpoint,
            Some(operation),
            replies.into_iter().map(Ok).collect(),
        );
    }

    /// Every matching request fails at the transport level.
    pub fn fail(&self, method: Method, url_prefix: &str, message: &str) {
        self.push_route(method, url_prefix, None, vec![Err(message.to_string())]);
    }

    fn push_route(
        &self,
        method: Method,
        url_prefix: &str,
        body_contains: Option<&str>,
        replies: Vec<Reply>,
    ) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(Route {
                method,
                url_prefix: url_prefix.to_string(),
                body_contains: body_contains.map(str::to_string),
                replies: replies.into(),
            });
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn count(&self, method: Method, url_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.url.starts_with(url_prefix))
            .count()
    }

    /// Number of GraphQL (or multipart) requests whose body mentions `operation`.
    pub fn count_operation(&self, operation: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == Method::Post && r.body_text().contains(operation))
            .count()
    }

    pub fn clear_log(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }
}

#[async_trait]
impl HttpClientPort for InMemoryHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }
        let reply = {
            let mut routes = self
                .routes
                .lock()
                .map_err(|_| BotError::Transport("route table poisoned".into()))?;
            routes
                .iter_mut()
                .rev()
                .find(|route| route.matches(&request))
                .map(Route::next_reply)
        };
        match reply {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(message)) => Err(BotError::Transport(message)),
            None => Ok(HttpResponse::new(404, "not found")),
        }
    }
}
