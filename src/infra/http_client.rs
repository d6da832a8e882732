use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse, Method, RequestBody};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};

/// `HttpClientPort` backed by a shared `reqwest::Client`.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttp {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(multipart) => {
                let mut form = Form::new();
                for (name, value) in multipart.fields {
                    form = form.text(name, value);
                }
                let part = Part::bytes(multipart.file.bytes).file_name(multipart.file.file_name);
                builder.multipart(form.part(multipart.file.field, part))
            }
        };
        builder
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        let resp = self
            .build(request)
            .send()
            .await
            .map_err(|e| BotError::Transport(format!("{url}: {e}")))?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BotError::Transport(format!("{url}: {e}")))?
            .to_vec();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .or_else(|| (!bytes.is_empty()).then_some(bytes.len() as u64));
        Ok(HttpResponse {
            status,
            bytes,
            content_type,
            content_length,
        })
    }
}
