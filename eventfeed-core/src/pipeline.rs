//! The normalize, detect and generate pipeline.

use tracing::{info, warn};

use crate::context::RunContext;
use crate::diff::{DeltaReport, detect_changes};
use crate::error::{EventFeedError, EventFeedResult};
use crate::ics::{FeedStamp, generate_feed};
use crate::normalize::Rejected;
use crate::raw::RawRecord;
use crate::snapshot::Snapshot;

/// The snapshot a run compares against.
#[derive(Debug, Clone)]
pub enum PriorSnapshot {
    /// No snapshot has been stored yet.
    Missing,
    Loaded(Snapshot),
    /// A stored snapshot exists but could not be read or verified.
    Unreadable(String),
}

impl PriorSnapshot {
    /// Classify the raw contents of a stored snapshot, if any.
    pub fn from_json(json: Option<&str>) -> Self {
        match json {
            None => PriorSnapshot::Missing,
            Some(json) => match Snapshot::from_json(json) {
                Ok(snapshot) => PriorSnapshot::Loaded(snapshot),
                Err(e) => PriorSnapshot::Unreadable(e.to_string()),
            },
        }
    }
}

/// Everything a run produces. Nothing has been written anywhere yet.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub snapshot: Snapshot,
    pub report: DeltaReport,
    pub feed: String,
    pub stamp: FeedStamp,
    pub rejected: Vec<Rejected>,
}

/// Run all three stages over one batch of raw records.
pub fn run(ctx: &RunContext, records: &[RawRecord], prior: PriorSnapshot) -> EventFeedResult<RunOutput> {
    let normalized = ctx.normalizer().normalize(records);

    if normalized.events.is_empty() && !ctx.allow_empty {
        return Err(EventFeedError::EmptyScrape {
            rejected: normalized.rejected.len(),
        });
    }

    let previous = match prior {
        PriorSnapshot::Missing => {
            info!("No previous snapshot, treating as first run");
            None
        }
        PriorSnapshot::Loaded(snapshot) => Some(snapshot),
        PriorSnapshot::Unreadable(reason) => {
            warn!(%reason, "Previous snapshot is unreadable, treating as first run");
            None
        }
    };

    let current = Snapshot::new(ctx.captured_at, normalized.events);
    let (report, snapshot) = detect_changes(previous.as_ref(), current);

    let counts = report.counts();
    info!(
        added = counts.added,
        removed = counts.removed,
        unchanged = counts.unchanged,
        modified = counts.modified,
        rejected = normalized.rejected.len(),
        "Detected changes"
    );

    let feed = generate_feed(&snapshot.events, &ctx.feed)?;
    let stamp = FeedStamp::new(&feed, snapshot.len(), ctx.captured_at);

    Ok(RunOutput {
        snapshot,
        report,
        feed,
        stamp,
        rejected: normalized.rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ctx() -> RunContext {
        RunContext::new(
            chrono_tz::Europe::Berlin,
            Utc.with_ymd_and_hms(2025, 6, 20, 6, 0, 0).unwrap(),
        )
    }

    fn record(title: &str, start: &str) -> RawRecord {
        RawRecord {
            title: Some(title.into()),
            start: Some(start.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_scrape_is_an_error_unless_allowed() {
        let records = vec![RawRecord::default()];
        let err = run(&ctx(), &records, PriorSnapshot::Missing).unwrap_err();
        assert!(matches!(err, EventFeedError::EmptyScrape { rejected: 1 }));

        let output = run(&ctx().with_allow_empty(true), &records, PriorSnapshot::Missing).unwrap();
        assert!(output.snapshot.is_empty());
        assert_eq!(output.rejected.len(), 1);
    }

    #[test]
    fn test_unreadable_prior_is_a_first_run() {
        let records = vec![record("Sommerfest", "2025-07-01 18:00")];
        let output = run(&ctx(), &records, PriorSnapshot::from_json(Some("garbage"))).unwrap();
        assert_eq!(output.report.counts().added, 1);
    }

    #[test]
    fn test_second_identical_run_is_unchanged() {
        let records = vec![record("Sommerfest", "2025-07-01 18:00"), record("Markt", "2025-07-02")];
        let first = run(&ctx(), &records, PriorSnapshot::Missing).unwrap();
        let json = first.snapshot.to_json().unwrap();

        let second = run(&ctx(), &records, PriorSnapshot::from_json(Some(&json))).unwrap();
        assert!(!second.report.has_changes());
        assert_eq!(first.feed, second.feed);
        assert_eq!(first.stamp.etag, second.stamp.etag);
    }

    #[test]
    fn test_prior_with_repeated_identity_is_a_first_run() {
        let records = vec![record("Sommerfest", "2025-07-01 18:00")];
        let mut prior = run(&ctx(), &records, PriorSnapshot::Missing).unwrap().snapshot;
        prior.events.push(prior.events[0].clone());
        let json = prior.to_json().unwrap();

        let output = run(&ctx(), &records, PriorSnapshot::from_json(Some(&json))).unwrap();
        assert_eq!(output.report.entries.len(), 1);
        assert_eq!(output.report.counts().added, 1);
    }

    #[test]
    fn test_prior_from_json_variants() {
        assert!(matches!(PriorSnapshot::from_json(None), PriorSnapshot::Missing));
        assert!(matches!(
            PriorSnapshot::from_json(Some("{}")),
            PriorSnapshot::Unreadable(_)
        ));
    }
}
