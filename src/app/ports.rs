use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
        }
    }
}

/// File part of a multipart upload.
#[derive(Clone, Debug)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub file: FilePart,
}

#[derive(Clone, Debug)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Multipart(MultipartBody),
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, url).with_body(RequestBody::Json(body))
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self::new(Method::Post, url).with_body(RequestBody::Form(fields))
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set a header, replacing any previous value (names compare case-insensitively).
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Searchable text rendering of the body, used for logging and request matching.
    pub fn body_text(&self) -> String {
        match &self.body {
            RequestBody::Empty => String::new(),
            RequestBody::Json(value) => value.to_string(),
            RequestBody::Form(fields) => fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
            RequestBody::Multipart(multipart) => multipart
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .chain(std::iter::once(format!(
                    "{}@{}",
                    multipart.file.field, multipart.file.file_name
                )))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Declared `Content-Length`, which HEAD responses carry without a body.
    pub content_length: Option<u64>,
}

impl HttpResponse {
    pub fn new(status: u16, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            status,
            content_length: Some(bytes.len() as u64),
            bytes,
            content_type: String::new(),
        }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_content_type("application/json")
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }

    /// MIME type without parameters, lowercased.
    pub fn mime(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Outbound HTTP. Transport failures come back as `Err`; any HTTP status is `Ok`.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Source of the bearer token used against the destination server.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> String;
    async fn refresh(&self) -> Result<()>;
}

/// Operator interaction during the device flow.
#[async_trait]
pub trait Prompt: Send + Sync {
    fn show(&self, message: &str);
    async fn wait_for_confirmation(&self) -> Result<()>;
}

/// Token provider for unauthenticated calls and tests.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    fn access_token(&self) -> String {
        self.0.clone()
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}
