//! Endpoints, limits and fixed GraphQL enum values shared across the bot.
use std::time::Duration;

// Upstream and external services
pub const CONCERTCLOUD_EVENTS_URL: &str = "https://api.concertcloud.live/api/events";
pub const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_MOBILIZON_URL: &str = "https://mobilisons.ch";
pub const DEFAULT_IMAGE_URL: &str = "https://mobilisons.ch/img/mobilizon_default_card.png";

/// Sent when no city is requested so the upstream answers with nothing.
pub const NO_CITY: &str = "X";
pub const DEFAULT_TIMEZONE: &str = "Europe/Zurich";

// Persisted files inside the config directory
pub const CONFIG_DIR_NAME: &str = "mobilizon";
pub const AUTH_FILE: &str = "auth.json";
pub const ADDRS_FILE: &str = "addrs.json";
pub const EXISTS_FILE: &str = "exists.json";
pub const CONFIG_FILE: &str = "config.toml";
pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "bot.log";

// OAuth2
pub const CLIENT_ID_ENV: &str = "GRAPHQL_CLIENT_ID";
pub const SCOPES: &str = "write:event:create write:event:update write:media:upload";
pub const APP_NAME: &str = "Concert Cloud Bot";
pub const APP_WEBSITE: &str = "https://concertcloud.live";
pub const APP_REDIRECT_URI: &str = "https://login.microsoftonline.com/common/oauth2/nativeclient";
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

// Retry policy for the destination server
pub const SERVER_CRASH_WAIT: Duration = Duration::from_secs(60);
pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(10 * 60);
pub const MAX_RETRIES: u32 = 120;
pub const ADDRESS_SEARCH_PAUSE: Duration = Duration::from_secs(3);

// Images
pub const MAX_IMAGE_SIZE: u64 = 1024 * 800;
pub const IMAGE_RESIZE_WIDTH: u32 = 600;
pub const TEMP_IMAGE_PREFIX: &str = "cc2mob.";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";
pub const BOT_USER_AGENT: &str = concat!("mobilizon-bot/", env!("CARGO_PKG_VERSION"));

// Event publication
pub const PROMO_TAGLINE: &str =
    "Help promote your favourite venues with: https://concertcloud.live/contribute";
pub const DEFAULT_OPT_OUT: &[&str] = &[r"bejazz\.ch"];
pub const DEFAULT_CATEGORY: &str = "MUSIC";
pub const EVENT_DURATION_HOURS: i64 = 2;
pub const MIN_TITLE_CHARS: usize = 3;
pub const TITLE_PADDING: &str = " ...";

pub const VISIBILITY_PUBLIC: &str = "PUBLIC";
pub const JOIN_EXTERNAL: &str = "EXTERNAL";
pub const COMMENTS_ALLOW_ALL: &str = "ALLOW_ALL";

/// Geocoder place types that look like a venue.
pub const VENUE_PLACE_TYPES: &[&str] = &[
    "nightclub",
    "bar",
    "restaurant",
    "theatre",
    "cinema",
    "arts_centre",
];

/// Event categories accepted by Mobilizon's `EventCategory` enum.
pub const EVENT_CATEGORIES: &[&str] = &[
    "ARTS",
    "AUTO_BOAT_AIR",
    "BOOK_CLUBS",
    "BUSINESS",
    "CAUSES",
    "COMEDY",
    "COMMUNITY",
    "CRAFTS",
    "FAMILY_EDUCATION",
    "FASHION_BEAUTY",
    "FILM_MEDIA",
    "FOOD_DRINK",
    "GAMES",
    "HEALTH",
    "LANGUAGE_CULTURE",
    "LEARNING",
    "LGBTQ",
    "MEETING",
    "MOVEMENTS_POLITICS",
    "MUSIC",
    "NETWORKING",
    "OUTDOORS_ADVENTURE",
    "PARTY",
    "PERFORMING_VISUAL_ARTS",
    "PETS",
    "PHOTOGRAPHY",
    "SCIENCE_TECH",
    "SPIRITUALITY_RELIGION_BELIEFS",
    "SPORTS",
    "THEATRE",
];

/// Map a free-text source category onto the Mobilizon enum.
pub fn category_for(source_type: &str) -> &str {
    if EVENT_CATEGORIES.contains(&source_type) {
        source_type
    } else {
        DEFAULT_CATEGORY
    }
}
