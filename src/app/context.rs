use crate::app::ports::{HttpClientPort, TokenProvider};
use crate::graphql::MobilizonClient;
use crate::infra::retry::{RetryPolicy, RetryingHttp};
use std::sync::Arc;

/// Collaborators shared by every component of a run.
///
/// `plain_http` talks to third parties (upstream API, geocoder, event pages);
/// `api_http` talks to the destination and carries the bearer token.
#[derive(Clone)]
pub struct BotContext {
    pub base_url: String,
    pub plain_http: Arc<dyn HttpClientPort>,
    pub api_http: Arc<dyn HttpClientPort>,
    pub graphql: Arc<MobilizonClient>,
    pub tokens: Arc<dyn TokenProvider>,
}

impl BotContext {
    pub fn new(
        plain_http: Arc<dyn HttpClientPort>,
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self::with_policy(plain_http, base_url, tokens, RetryPolicy::default())
    }

    pub fn with_policy(
        plain_http: Arc<dyn HttpClientPort>,
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        policy: RetryPolicy,
    ) -> Self {
        let api_http: Arc<dyn HttpClientPort> = Arc::new(RetryingHttp::with_policy(
            plain_http.clone(),
            tokens.clone(),
            policy,
        ));
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            graphql: Arc::new(MobilizonClient::new(api_http.clone(), base_url)),
            plain_http,
            api_http,
            tokens,
        }
    }
}
