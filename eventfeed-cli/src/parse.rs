//! HTML parsing of the listing and detail pages.

use std::sync::LazyLock;

use eventfeed_core::RawRecord;
use scraper::{ElementRef, Html, Selector};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid css selector")
}

static WRAPPER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("a.article"));
static ARTICLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("article"));
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("h2"));
static DAY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.day"));
static MONTH_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.month"));
static YEAR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.year"));
static STILL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.still"));
static TIME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.time"));
static LOCATION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.location"));
static DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("div.description"));
static CONTENTTABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("table.contenttable"));
static SPAN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("span"));

/// Parse every event article on a listing page.
///
/// Articles wrapped in `<a class="article">` carry their detail link in the
/// wrapper's `href`. Pages without wrappers fall back to bare `<article>`
/// elements.
pub fn parse_listing(html: &str, base: &Url) -> Vec<RawRecord> {
    let document = Html::parse_document(html);

    let wrapped: Vec<RawRecord> = document
        .select(&WRAPPER_SELECTOR)
        .filter_map(|wrapper| {
            let article = wrapper.select(&ARTICLE_SELECTOR).next()?;
            let url = wrapper
                .value()
                .attr("href")
                .and_then(|href| absolute_url(base, href));
            Some(parse_article(&article, url))
        })
        .collect();

    if !wrapped.is_empty() {
        return wrapped;
    }

    document
        .select(&ARTICLE_SELECTOR)
        .map(|article| parse_article(&article, None))
        .collect()
}

/// Long description from an event detail page.
///
/// The spans of `table.contenttable` are joined with blank lines; without
/// spans the whole table text is used.
pub fn parse_detail(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let table = document.select(&CONTENTTABLE_SELECTOR).next()?;

    let parts: Vec<String> = table
        .select(&SPAN_SELECTOR)
        .map(inner_text)
        .filter(|text| !text.is_empty())
        .collect();

    let description = if parts.is_empty() {
        inner_text(table)
    } else {
        parts.join("\n\n")
    };

    (!description.is_empty()).then_some(description)
}

fn parse_article(article: &ElementRef<'_>, url: Option<String>) -> RawRecord {
    let (start_time, end_time) = first_text(article, &TIME_SELECTOR)
        .map(|text| split_time_range(&text))
        .unwrap_or_default();

    let date = article_date(article);
    let ongoing = first_text(article, &STILL_SELECTOR)
        .is_some_and(|text| text.to_lowercase().contains("noch bis"));
    if ongoing {
        // Only the last day is listed; it is used as the start date
        tracing::debug!(?date, "Ongoing event");
    }

    let start = date.map(|date| match &start_time {
        Some(time) => format!("{} {}", date, time),
        None => date,
    });

    RawRecord {
        title: first_text(article, &TITLE_SELECTOR),
        start,
        end: end_time,
        location: first_text(article, &LOCATION_SELECTOR)
            .map(|text| strip_label(&text, "Veranstaltungsort:"))
            .filter(|text| !text.is_empty()),
        description: first_text(article, &DESCRIPTION_SELECTOR)
            .map(|text| strip_label(&text, "Beschreibung:"))
            .filter(|text| !text.is_empty()),
        url,
        recurrence: None,
    }
}

/// Date of an article as `14. Sept 2025`, if day, month and year are present.
fn article_date(article: &ElementRef<'_>) -> Option<String> {
    let day = first_text(article, &DAY_SELECTOR)?;
    let month = first_text(article, &MONTH_SELECTOR)?;
    let year = first_text(article, &YEAR_SELECTOR)?;

    Some(format!(
        "{}. {} {}",
        day.trim_end_matches('.'),
        month.trim_end_matches('.'),
        year
    ))
}

/// Split `Uhrzeit: 19:00 bis 22:00 Uhr` into start and end time strings.
fn split_time_range(text: &str) -> (Option<String>, Option<String>) {
    let text = strip_label(text, "Uhrzeit:");
    let clean = |part: &str| {
        let part = part.trim();
        let part = part.strip_suffix("Uhr").unwrap_or(part).trim();
        (!part.is_empty()).then(|| part.to_string())
    };

    match text.split_once(" bis ").or_else(|| text.split_once(" - ")) {
        Some((start, end)) => (clean(start), clean(end)),
        None => (clean(&text), None),
    }
}

fn strip_label(text: &str, label: &str) -> String {
    text.replace(label, "").trim().to_string()
}

fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

fn inner_text(element: ElementRef<'_>) -> String {
    eventfeed_core::text::collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn absolute_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.buchloe.de").unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
        <a class="article" href="/freizeit-tourismus/veranstaltungen/detail/sommerfest/">
            <article>
                <div class="col date eventdates">
                    <div class="dayname">Dienstag</div>
                    <div class="table">
                        <div class="col"><div class="day">1</div></div>
                        <div class="col">
                            <div class="month">Juli</div>
                            <div class="year">2025</div>
                        </div>
                    </div>
                </div>
                <h2>Sommerfest</h2>
                <div class="time">Uhrzeit: 18:00 Uhr bis 22:00 Uhr</div>
                <div class="location">Veranstaltungsort: Stadtpark</div>
                <div class="description">Beschreibung: Musik und Essen</div>
            </article>
        </a>
        <a class="article" href="https://www.buchloe.de/ausstellung/">
            <article>
                <div class="still">Noch bis</div>
                <div class="dayname">Sonntag</div>
                <div class="day">14</div>
                <div class="month">Sept.</div>
                <div class="year">2025</div>
                <h2>Ausstellung</h2>
            </article>
        </a>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing_with_wrappers() {
        let records = parse_listing(LISTING, &base());
        assert_eq!(records.len(), 2);

        let fest = &records[0];
        assert_eq!(fest.title.as_deref(), Some("Sommerfest"));
        assert_eq!(fest.start.as_deref(), Some("1. Juli 2025 18:00"));
        assert_eq!(fest.end.as_deref(), Some("22:00"));
        assert_eq!(fest.location.as_deref(), Some("Stadtpark"));
        assert_eq!(fest.description.as_deref(), Some("Musik und Essen"));
        assert_eq!(
            fest.url.as_deref(),
            Some("https://www.buchloe.de/freizeit-tourismus/veranstaltungen/detail/sommerfest/")
        );

        let exhibition = &records[1];
        assert_eq!(exhibition.start.as_deref(), Some("14. Sept 2025"));
        assert_eq!(exhibition.end, None);
        assert_eq!(exhibition.location, None);
        assert_eq!(exhibition.url.as_deref(), Some("https://www.buchloe.de/ausstellung/"));
    }

    #[test]
    fn test_parsed_records_normalize() {
        let records = parse_listing(LISTING, &base());
        let settings = eventfeed_core::Settings::default();
        let normalized = eventfeed_core::normalize(
            &records,
            settings.timezone().unwrap(),
            settings.default_duration().unwrap(),
        );
        assert_eq!(normalized.events.len(), 2);
        assert!(normalized.rejected.is_empty());
    }

    #[test]
    fn test_parse_listing_without_wrappers() {
        let html = r#"
            <article>
                <div class="day">17</div><div class="month">Juni</div><div class="year">2025</div>
                <h2>Stadtratssitzung</h2>
            </article>
        "#;
        let records = parse_listing(html, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Stadtratssitzung"));
        assert_eq!(records[0].url, None);
    }

    #[test]
    fn test_article_without_title_is_kept_for_diagnostics() {
        let html = r#"<article><div class="day">17</div><div class="month">Juni</div><div class="year">2025</div></article>"#;
        let records = parse_listing(html, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, None);
        assert_eq!(records[0].start.as_deref(), Some("17. Juni 2025"));
    }

    #[test]
    fn test_split_time_range() {
        assert_eq!(
            split_time_range("Uhrzeit: 19:00 Uhr"),
            (Some("19:00".to_string()), None)
        );
        assert_eq!(
            split_time_range("Uhrzeit: 19 Uhr bis 23 Uhr"),
            (Some("19".to_string()), Some("23".to_string()))
        );
        assert_eq!(split_time_range("Uhrzeit:"), (None, None));
    }

    #[test]
    fn test_parse_detail_joins_spans() {
        let html = r#"
            <table class="contenttable"><tbody><tr><td>
                <span>First paragraph text.</span>
                <br><br>
                <span>Second paragraph text.</span>
            </td></tr></tbody></table>
        "#;
        assert_eq!(
            parse_detail(html).as_deref(),
            Some("First paragraph text.\n\nSecond paragraph text.")
        );
    }

    #[test]
    fn test_parse_detail_without_spans_uses_table_text() {
        let html = r#"<table class="contenttable"><tr><td>Nur   Text</td></tr></table>"#;
        assert_eq!(parse_detail(html).as_deref(), Some("Nur Text"));
    }

    #[test]
    fn test_parse_detail_without_table() {
        assert_eq!(parse_detail("<div>Keine Tabelle</div>"), None);
    }
}
