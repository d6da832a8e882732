use crate::app::ports::{HttpClientPort, HttpRequest, Prompt, TokenProvider};
use crate::constants::{
    APP_NAME, APP_REDIRECT_URI, APP_WEBSITE, CLIENT_ID_ENV, DEVICE_CODE_GRANT, SCOPES,
};
use crate::error::{BotError, Result};
use crate::graphql::MobilizonClient;
use crate::storage::write_private_json;
use crate::types::AuthState;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_POLL_INTERVAL: u64 = 5;
const SLOW_DOWN_STEP: u64 = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeviceCodeGrant {
    device_code: String,
    expires_in: u64,
    interval: u64,
    user_code: String,
    verification_uri: String,
    error: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Registration {
    client_id: String,
    error: String,
}

/// Owns the OAuth2 token pair for the destination server.
///
/// Refreshes go through the unauthenticated transport so that a refresh can
/// never recurse into another refresh.
pub struct AuthManager {
    http: Arc<dyn HttpClientPort>,
    graphql: MobilizonClient,
    base_url: String,
    auth_file: PathBuf,
    client_id: Option<String>,
    state: Mutex<AuthState>,
}

impl AuthManager {
    pub fn new(
        http: Arc<dyn HttpClientPort>,
        base_url: &str,
        auth_file: impl Into<PathBuf>,
        client_id: Option<String>,
    ) -> Self {
        Self {
            graphql: MobilizonClient::new(http.clone(), base_url),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_file: auth_file.into(),
            client_id,
            state: Mutex::new(AuthState::default()),
        }
    }

    pub fn auth_file(&self) -> &Path {
        &self.auth_file
    }

    pub fn state(&self) -> AuthState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn set_state(&self, state: AuthState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    fn load(&self) -> Result<AuthState> {
        let data = std::fs::read_to_string(&self.auth_file)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn persist(&self, state: AuthState) -> Result<()> {
        write_private_json(&self.auth_file, &state)?;
        self.set_state(state);
        Ok(())
    }

    /// Trade the persisted refresh token for a fresh pair and rewrite the auth file.
    #[instrument(skip(self), fields(file = %self.auth_file.display()))]
    pub async fn refresh(&self) -> Result<()> {
        let mut state = self.load()?;
        if state.refresh_token.is_empty() {
            return Err(BotError::Auth("no refresh token on file".into()));
        }
        let pair = self.graphql.refresh_token(&state.refresh_token).await.map_err(|e| {
            warn!(error = %e, "Failed auth token renewal");
            e
        })?;
        state.access_token = pair.access_token;
        state.refresh_token = pair.refresh_token;
        self.persist(state)?;
        info!("auth token renewed");
        Ok(())
    }

    /// Make sure a usable bearer token is loaded.
    ///
    /// Without a prompt only a refresh is attempted; the device flow needs an
    /// operator and runs only when one is supplied.
    pub async fn ensure_authorized(&self, prompt: Option<&dyn Prompt>) -> Result<()> {
        let refresh_error = match self.refresh().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        match prompt {
            Some(prompt) => {
                debug!(error = %refresh_error, "refresh failed, starting device flow");
                self.device_flow(prompt).await
            }
            None => Err(BotError::Auth(format!(
                "token refresh failed ({refresh_error}); run again with --authorize"
            ))),
        }
    }

    fn client_id(&self) -> Result<&str> {
        self.client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BotError::Config(format!("{CLIENT_ID_ENV} is not set; run --register first")))
    }

    /// OAuth2 device authorization grant (RFC 8628).
    #[instrument(skip(self, prompt))]
    pub async fn device_flow(&self, prompt: &dyn Prompt) -> Result<()> {
        let client_id = self.client_id()?.to_string();
        let request = HttpRequest::post_form(
            format!("{}/login/device/code", self.base_url),
            vec![
                ("client_id".into(), client_id.clone()),
                ("scope".into(), SCOPES.into()),
            ],
        );
        let grant: DeviceCodeGrant = self.http.execute(request).await?.parse_json()?;
        if !grant.error.is_empty() {
            return Err(BotError::Auth(format!(
                "error getting verification URI: {}",
                grant.error
            )));
        }
        if grant.device_code.is_empty() {
            return Err(BotError::MissingField("device_code".into()));
        }

        prompt.show(&format!(
            "Please visit this URL and enter the code below {}\n\n{}\n\nThen press Enter to continue.",
            grant.verification_uri, grant.user_code
        ));
        prompt.wait_for_confirmation().await?;

        let state = self.poll_for_token(&client_id, &grant).await?;
        self.persist(state)?;
        info!(file = %self.auth_file.display(), "bot authorized");
        Ok(())
    }

    async fn poll_for_token(&self, client_id: &str, grant: &DeviceCodeGrant) -> Result<AuthState> {
        let mut interval = if grant.interval == 0 {
            DEFAULT_POLL_INTERVAL
        } else {
            grant.interval
        };
        let deadline = (grant.expires_in > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(grant.expires_in));

        loop {
            let request = HttpRequest::post_form(
                format!("{}/oauth/token", self.base_url),
                vec![
                    ("client_id".into(), client_id.to_string()),
                    ("device_code".into(), grant.device_code.clone()),
                    ("grant_type".into(), DEVICE_CODE_GRANT.into()),
                ],
            );
            let body: serde_json::Value = self.http.execute(request).await?.parse_json()?;
            match body.get("error").and_then(|e| e.as_str()) {
                None => {
                    let state: AuthState = serde_json::from_value(body)?;
                    if state.access_token.is_empty() {
                        return Err(BotError::MissingField("access_token".into()));
                    }
                    return Ok(state);
                }
                Some("authorization_pending") => {}
                Some("slow_down") => interval += SLOW_DOWN_STEP,
                Some(other) => return Err(BotError::Auth(format!("device flow failed: {other}"))),
            }

            let wait = Duration::from_secs(interval);
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() + wait > deadline {
                    return Err(BotError::Auth("device code expired before authorization".into()));
                }
            }
            debug!(interval, "authorization pending");
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl TokenProvider for AuthManager {
    fn access_token(&self) -> String {
        self.state
            .lock()
            .map(|s| s.access_token.clone())
            .unwrap_or_default()
    }

    async fn refresh(&self) -> Result<()> {
        AuthManager::refresh(self).await
    }
}

/// Register the bot as an OAuth2 application and return its client id.
pub async fn register_app(http: &dyn HttpClientPort, base_url: &str) -> Result<String> {
    let request = HttpRequest::post_form(
        format!("{}/apps", base_url.trim_end_matches('/')),
        vec![
            ("name".into(), APP_NAME.into()),
            ("redirect_uri".into(), APP_REDIRECT_URI.into()),
            ("website".into(), APP_WEBSITE.into()),
            ("scope".into(), SCOPES.into()),
        ],
    );
    let registration: Registration = http.execute(request).await?.parse_json()?;
    if !registration.error.is_empty() {
        return Err(BotError::Auth(registration.error));
    }
    if registration.client_id.is_empty() {
        return Err(BotError::MissingField("client_id".into()));
    }
    Ok(registration.client_id)
}

/// Console prompt for the device flow.
pub struct StdinPrompt;

#[async_trait]
impl Prompt for StdinPrompt {
    fn show(&self, message: &str) {
        println!("{message}");
    }

    async fn wait_for_confirmation(&self) -> Result<()> {
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| ())
        })
        .await
        .map_err(|e| BotError::Auth(format!("prompt interrupted: {e}")))??;
        Ok(())
    }
}
