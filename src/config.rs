use crate::apis::concertcloud::EventQuery;
use crate::app::reconcile_use_case::ReconcileOptions;
use crate::app::variables::PublishSettings;
use crate::constants::{
    AUTH_FILE, CLIENT_ID_ENV, CONFIG_DIR_NAME, CONFIG_FILE, DEFAULT_IMAGE_URL,
    DEFAULT_MOBILIZON_URL, DEFAULT_OPT_OUT, DEFAULT_TIMEZONE, LOG_DIR, NO_CITY,
};
use crate::error::{BotError, Result};
use clap::Parser;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mobilizon-bot")]
#[command(about = "Republish ConcertCloud events on a Mobilizon instance")]
#[command(version)]
pub struct Cli {
    /// Your Mobilizon base URL
    #[arg(long = "mobilizonurl")]
    pub mobilizon_url: Option<String>,

    /// The ConcertCloud API param 'city' (X matches nothing)
    #[arg(long, default_value = NO_CITY)]
    pub city: String,

    /// The ConcertCloud API param 'country'
    #[arg(long)]
    pub country: Option<String>,

    /// The ConcertCloud API param 'limit'
    #[arg(long)]
    pub limit: Option<String>,

    /// The ConcertCloud API param 'page'
    #[arg(long)]
    pub page: Option<String>,

    /// The ConcertCloud API param 'radius'
    #[arg(long)]
    pub radius: Option<String>,

    /// The ConcertCloud API param 'date'
    #[arg(long)]
    pub date: Option<String>,

    /// Read events from this JSON file instead of ConcertCloud
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Authorization token file (default: <config>/auth.json)
    #[arg(long)]
    pub authconfig: Option<PathBuf>,

    /// Configuration directory (default: $XDG_CONFIG_HOME/mobilizon)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Mobilizon actor ID used as the event organizer
    #[arg(long)]
    pub actor: Option<String>,

    /// Mobilizon group ID the events are attributed to
    #[arg(long)]
    pub group: Option<String>,

    /// Timezone shown with the events
    #[arg(long)]
    pub timezone: Option<String>,

    /// Gather everything and report on it, but do not create events
    #[arg(long)]
    pub noop: bool,

    /// Register this bot, print the client id and quit
    #[arg(long)]
    pub register: bool,

    /// Authorize this bot interactively and quit
    #[arg(long)]
    pub authorize: bool,

    /// Create events as drafts
    #[arg(long)]
    pub draft: bool,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Optional `config.toml` inside the config directory.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub mobilizon_url: Option<String>,
    pub actor: Option<String>,
    pub group: Option<String>,
    pub timezone: Option<String>,
    pub opt_out: Option<Vec<String>>,
    pub default_image_url: Option<String>,
}

impl FileConfig {
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            BotError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            BotError::Config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Register,
    Authorize,
    Run,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub mode: Mode,
    pub mobilizon_url: String,
    pub config_dir: PathBuf,
    pub auth_file: PathBuf,
    pub client_id: Option<String>,
    pub query: EventQuery,
    pub file: Option<PathBuf>,
    pub noop: bool,
    pub debug: bool,
    pub opt_out: Vec<Regex>,
    pub settings: PublishSettings,
    pub default_image_url: String,
}

impl BotConfig {
    /// Load `.env`, prepare the config directory and merge CLI, file and defaults.
    pub fn load(cli: Cli) -> Result<Self> {
        dotenv::dotenv().ok();
        let config_dir = match &cli.config {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .map(|d| d.join(CONFIG_DIR_NAME))
                .ok_or_else(|| BotError::Config("User config dir not found".into()))?,
        };
        ensure_config_dir(&config_dir)?;
        let file = FileConfig::load(&config_dir)?;
        let client_id = std::env::var(CLIENT_ID_ENV).ok().filter(|id| !id.is_empty());
        Self::resolve(cli, file, config_dir, client_id)
    }

    /// CLI flags win over file values, file values over built-in defaults.
    pub fn resolve(
        cli: Cli,
        file: FileConfig,
        config_dir: PathBuf,
        client_id: Option<String>,
    ) -> Result<Self> {
        let mode = if cli.register {
            Mode::Register
        } else if cli.authorize {
            Mode::Authorize
        } else {
            Mode::Run
        };
        let patterns = file
            .opt_out
            .unwrap_or_else(|| DEFAULT_OPT_OUT.iter().map(|p| p.to_string()).collect());
        let opt_out = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| BotError::Config(format!("invalid opt_out pattern '{p}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mobilizon_url = cli
            .mobilizon_url
            .or(file.mobilizon_url)
            .unwrap_or_else(|| DEFAULT_MOBILIZON_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            mode,
            auth_file: cli.authconfig.unwrap_or_else(|| config_dir.join(AUTH_FILE)),
            mobilizon_url,
            client_id,
            query: EventQuery {
                city: cli.city,
                country: cli.country,
                limit: cli.limit,
                page: cli.page,
                radius: cli.radius,
                date: cli.date,
            },
            file: cli.file,
            noop: cli.noop,
            debug: cli.debug,
            opt_out,
            settings: PublishSettings {
                actor_id: cli.actor.or(file.actor).unwrap_or_default(),
                group_id: cli.group.or(file.group).unwrap_or_default(),
                timezone: cli
                    .timezone
                    .or(file.timezone)
                    .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
                draft: cli.draft,
            },
            default_image_url: file
                .default_image_url
                .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            config_dir,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.config_dir.join(LOG_DIR)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            noop: self.noop,
            opt_out: self.opt_out.clone(),
            settings: self.settings.clone(),
            default_image_url: self.default_image_url.clone(),
        }
    }
}

/// Create the config directory, private to the user, if it is missing.
pub fn ensure_config_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .map_err(|e| BotError::Config(format!("Error creating directory '{}': {}", dir.display(), e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
