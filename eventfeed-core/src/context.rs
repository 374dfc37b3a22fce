//! Per-invocation run context.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::config::Settings;
use crate::error::EventFeedResult;
use crate::ics::FeedMetadata;
use crate::normalize::Normalizer;

/// Everything a pipeline run needs, resolved once from [`Settings`].
#[derive(Debug, Clone)]
pub struct RunContext {
    pub timezone: Tz,
    pub default_duration: Duration,
    pub feed: FeedMetadata,
    /// Timestamp of this run, recorded on the snapshot and the feed stamp.
    pub captured_at: DateTime<Utc>,
    pub allow_empty: bool,
}

impl RunContext {
    pub fn new(timezone: Tz, captured_at: DateTime<Utc>) -> Self {
        RunContext {
            timezone,
            default_duration: Duration::from_secs(2 * 3600),
            feed: FeedMetadata {
                timezone: timezone.name().to_string(),
                ..FeedMetadata::default()
            },
            captured_at,
            allow_empty: false,
        }
    }

    pub fn from_settings(settings: &Settings, captured_at: DateTime<Utc>) -> EventFeedResult<Self> {
        Ok(RunContext {
            timezone: settings.timezone()?,
            default_duration: settings.default_duration()?,
            feed: settings.feed_metadata(),
            captured_at,
            allow_empty: settings.allow_empty,
        })
    }

    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.timezone, self.default_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_settings_resolves_typed_values() {
        let settings = Settings {
            timezone: "Europe/Vienna".into(),
            default_duration: "90m".into(),
            allow_empty: true,
            ..Default::default()
        };
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 6, 0, 0).unwrap();
        let ctx = RunContext::from_settings(&settings, at).unwrap();

        assert_eq!(ctx.timezone, chrono_tz::Europe::Vienna);
        assert_eq!(ctx.default_duration, Duration::from_secs(5400));
        assert_eq!(ctx.feed.timezone, "Europe/Vienna");
        assert!(ctx.allow_empty);
        assert_eq!(ctx.normalizer().timezone(), chrono_tz::Europe::Vienna);
    }

    #[test]
    fn test_from_settings_rejects_unknown_zone() {
        let settings = Settings {
            timezone: "Nowhere".into(),
            ..Default::default()
        };
        assert!(RunContext::from_settings(&settings, Utc::now()).is_err());
    }
}
