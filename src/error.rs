use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Gave up on {url} after {retries} retries")]
    RetriesExhausted { retries: u32, url: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl BotError {
    /// True when the destination rejected our bearer token: an HTTP 401, or
    /// a GraphQL error carrying the `token_expired` code or a `(401)` status.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            BotError::Status { status, .. } => *status == 401,
            BotError::GraphQl(message) => {
                message.contains("token_expired") || message.contains("(401)")
            }
            _ => false,
        }
    }

    /// Errors that end the whole run rather than a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::RetriesExhausted { .. } | BotError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
