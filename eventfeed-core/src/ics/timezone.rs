//! VTIMEZONE components computed from the tz database.

use chrono::{DateTime, Duration, NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, OffsetName, Tz};

/// Offset state of a zone at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observance {
    utc_offset: i32,
    is_dst: bool,
    name: Option<String>,
}

/// Change from one observance to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Transition {
    at: DateTime<Utc>,
    from: Observance,
    to: Observance,
}

/// Content lines of a VTIMEZONE for `tz`, covering `first_year..=last_year`.
///
/// The first sub-component describes the offset in effect on January 1st of
/// `first_year`; every transition inside the range follows as its own
/// STANDARD or DAYLIGHT block.
pub fn vtimezone_lines(tz: Tz, first_year: i32, last_year: i32) -> Vec<String> {
    let range_start = year_start(first_year);
    let range_end = year_start(last_year.max(first_year) + 1);

    let initial = observance_at(tz, range_start);
    let mut lines = vec!["BEGIN:VTIMEZONE".to_string(), format!("TZID:{}", tz.name())];

    push_observance(
        &mut lines,
        range_start + Duration::seconds(initial.utc_offset as i64),
        &initial,
        &initial,
    );
    for transition in transitions(tz, range_start, range_end) {
        let local_onset = transition.at + Duration::seconds(transition.from.utc_offset as i64);
        push_observance(&mut lines, local_onset, &transition.from, &transition.to);
    }

    lines.push("END:VTIMEZONE".to_string());
    lines
}

fn push_observance(lines: &mut Vec<String>, local_onset: DateTime<Utc>, from: &Observance, to: &Observance) {
    let kind = if to.is_dst { "DAYLIGHT" } else { "STANDARD" };
    lines.push(format!("BEGIN:{}", kind));
    // Local wall time of the onset, written without a zone
    lines.push(format!("DTSTART:{}", local_onset.format("%Y%m%dT%H%M%S")));
    lines.push(format!("TZOFFSETFROM:{}", format_offset(from.utc_offset)));
    lines.push(format!("TZOFFSETTO:{}", format_offset(to.utc_offset)));
    if let Some(name) = &to.name {
        lines.push(format!("TZNAME:{}", name));
    }
    lines.push(format!("END:{}", kind));
}

fn transitions(tz: Tz, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Transition> {
    let mut found = Vec::new();
    let mut cursor = from;
    let mut current = observance_at(tz, cursor);

    while cursor < to {
        let next = (cursor + Duration::days(1)).min(to);
        let observed = observance_at(tz, next);
        if observed != current {
            let at = bisect(tz, cursor, next, &current);
            found.push(Transition {
                at,
                from: current,
                to: observed.clone(),
            });
            current = observed;
        }
        cursor = next;
    }
    found
}

/// First instant in `(lo, hi]` whose observance differs from `before`.
fn bisect(tz: Tz, mut lo: DateTime<Utc>, mut hi: DateTime<Utc>, before: &Observance) -> DateTime<Utc> {
    while hi - lo > Duration::seconds(1) {
        let mid = lo + (hi - lo) / 2;
        if observance_at(tz, mid) == *before {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

fn observance_at(tz: Tz, instant: DateTime<Utc>) -> Observance {
    let offset = tz.offset_from_utc_datetime(&instant.naive_utc());
    Observance {
        utc_offset: offset.fix().local_minus_utc(),
        is_dst: !offset.dst_offset().is_zero(),
        name: offset.abbreviation().map(String::from),
    }
}

fn year_start(year: i32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
}

fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    let (h, m, s) = (abs / 3600, (abs % 3600) / 60, abs % 60);
    if s == 0 {
        format!("{}{:02}{:02}", sign, h, m)
    } else {
        format!("{}{:02}{:02}{:02}", sign, h, m, s)
    }
}
