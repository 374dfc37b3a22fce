//! eventfeed configuration.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `EVENTFEED__*` environment variables (`EVENTFEED__SOURCE__MAX_PAGES=5`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{EventFeedError, EventFeedResult};
use crate::ics::FeedMetadata;

static DEFAULT_DATA_DIR: &str = "~/.local/share/eventfeed";
static LOCAL_CONFIG_FILE: &str = "eventfeed.toml";

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_duration() -> String {
    "2h".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_base_url() -> String {
    "https://www.buchloe.de".to_string()
}

fn default_listing_path() -> String {
    "/freizeit-tourismus/veranstaltungen/seite/".to_string()
}

fn default_max_pages() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_user_agent() -> String {
    concat!("eventfeed/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// IANA zone the source publishes local times in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Duration of timed events without an end, in humantime syntax.
    #[serde(default = "default_duration")]
    pub default_duration: String,

    /// Where snapshots and the published feed live. `~` is expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Publish even when a scrape yields no valid events.
    #[serde(default)]
    pub allow_empty: bool,

    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub feed: FeedSettings,
}

/// Where and how to fetch the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Listing path; the page number and a trailing slash are appended.
    #[serde(default = "default_listing_path")]
    pub listing_path: String,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Fetch each event's detail page for the long description.
    #[serde(default = "default_true")]
    pub fetch_details: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Calendar-level feed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub prodid: String,
    pub name: String,
    pub description: String,
    pub uid_domain: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timezone: default_timezone(),
            default_duration: default_duration(),
            data_dir: default_data_dir(),
            allow_empty: false,
            source: SourceSettings::default(),
            feed: FeedSettings::default(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            max_pages: default_max_pages(),
            fetch_details: true,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        let meta = FeedMetadata::default();
        FeedSettings {
            prodid: meta.prodid,
            name: meta.name,
            description: meta.description,
            uid_domain: meta.uid_domain,
        }
    }
}

impl Settings {
    /// User-level config file at ~/.config/eventfeed/config.toml
    pub fn config_path() -> EventFeedResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EventFeedError::Config("Could not determine config directory".into()))?
            .join("eventfeed");

        Ok(config_dir.join("config.toml"))
    }

    /// Load settings from `explicit` if given, else from `./eventfeed.toml`,
    /// else from the user config file. Environment variables override files.
    pub fn load(explicit: Option<&Path>) -> EventFeedResult<Self> {
        let file = match explicit {
            Some(path) => Some(File::from(path).required(true)),
            None => Self::discover().map(|path| File::from(path).required(false)),
        };

        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("EVENTFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EventFeedError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| EventFeedError::Config(e.to_string()))?;

        settings.validate()?;
        tracing::debug!(?explicit, timezone = %settings.timezone, "Loaded settings");
        Ok(settings)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::config_path().ok().filter(|p| p.exists())
    }

    /// Check every value that is stored as text but has a typed meaning.
    pub fn validate(&self) -> EventFeedResult<()> {
        self.timezone()?;
        self.default_duration()?;
        self.request_timeout()?;
        if self.source.max_pages == 0 {
            return Err(EventFeedError::Config("source.max_pages must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timezone(&self) -> EventFeedResult<Tz> {
        self.timezone
            .parse()
            .map_err(|_| EventFeedError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn default_duration(&self) -> EventFeedResult<Duration> {
        parse_duration("default_duration", &self.default_duration)
    }

    pub fn request_timeout(&self) -> EventFeedResult<Duration> {
        parse_duration("source.request_timeout", &self.source.request_timeout)
    }

    /// Data directory with `~` and environment variables expanded.
    pub fn data_path(&self) -> PathBuf {
        let raw = self.data_dir.to_string_lossy();
        let expanded = shellexpand::full(&raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&raw).into_owned());

        PathBuf::from(expanded)
    }

    pub fn feed_metadata(&self) -> FeedMetadata {
        FeedMetadata {
            prodid: self.feed.prodid.clone(),
            name: self.feed.name.clone(),
            description: self.feed.description.clone(),
            timezone: self.timezone.clone(),
            uid_domain: self.feed.uid_domain.clone(),
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> EventFeedResult<()> {
        let defaults = Settings::default();
        let contents = format!(
            "\
# eventfeed configuration

# Timezone the source lists local times in:
# timezone = \"{timezone}\"

# Duration of events that have no end time:
# default_duration = \"{duration}\"

# Where snapshots and the published feed are stored:
# data_dir = \"{data_dir}\"

# Publish even if a scrape yields no valid events:
# allow_empty = false

[source]
# base_url = \"{base_url}\"
# listing_path = \"{listing_path}\"
# max_pages = {max_pages}
# fetch_details = true
# request_timeout = \"{timeout}\"

[feed]
# prodid = \"{prodid}\"
# name = \"{name}\"
# description = \"{description}\"
# uid_domain = \"{uid_domain}\"
",
            timezone = defaults.timezone,
            duration = defaults.default_duration,
            data_dir = DEFAULT_DATA_DIR,
            base_url = defaults.source.base_url,
            listing_path = defaults.source.listing_path,
            max_pages = defaults.source.max_pages,
            timeout = defaults.source.request_timeout,
            prodid = defaults.feed.prodid,
            name = defaults.feed.name,
            description = defaults.feed.description,
            uid_domain = defaults.feed.uid_domain,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;

        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> EventFeedResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| EventFeedError::Config(format!("Invalid duration for {key} '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(settings.default_duration().unwrap(), Duration::from_secs(7200));
        assert_eq!(settings.request_timeout().unwrap(), Duration::from_secs(30));
        assert!(settings.source.fetch_details);
        assert_eq!(settings.feed_metadata(), FeedMetadata::default());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventfeed.toml");
        std::fs::write(
            &path,
            "default_duration = \"90m\"\n\n[source]\nmax_pages = 3\n\n[feed]\nprodid = \"-//Test//DE\"\nname = \"Test\"\ndescription = \"Test\"\nuid_domain = \"example.org\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.default_duration().unwrap(), Duration::from_secs(90 * 60));
        assert_eq!(settings.source.max_pages, 3);
        assert_eq!(settings.source.base_url, "https://www.buchloe.de");
        assert_eq!(settings.feed.uid_domain, "example.org");
        assert_eq!(settings.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(EventFeedError::Config(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let settings = Settings {
            timezone: "Mars/Olympus".into(),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(EventFeedError::UnknownTimezone(_))
        ));

        let settings = Settings {
            default_duration: "zwei Stunden".into(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(EventFeedError::Config(_))));
    }

    #[test]
    fn test_default_config_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Settings::create_default_config(&path).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.timezone, Settings::default().timezone);
        assert_eq!(settings.source, SourceSettings::default());
    }
}
