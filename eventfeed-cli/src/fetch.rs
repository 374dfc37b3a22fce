//! Fetching the paginated event listing.

use std::time::Duration;

use anyhow::{Context, Result};
use eventfeed_core::RawRecord;
use eventfeed_core::config::SourceSettings;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::parse;
use crate::utils::tui::create_spinner;

pub struct Fetcher {
    client: Client,
    base: Url,
    listing_path: String,
    max_pages: u32,
    fetch_details: bool,
}

impl Fetcher {
    pub fn new(source: &SourceSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&source.user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        let base = Url::parse(&source.base_url)
            .with_context(|| format!("Invalid source.base_url '{}'", source.base_url))?;

        Ok(Fetcher {
            client,
            base,
            listing_path: source.listing_path.clone(),
            max_pages: source.max_pages,
            fetch_details: source.fetch_details,
        })
    }

    /// URL of listing page `page` (1-based).
    pub fn page_url(&self, page: u32) -> Result<Url> {
        let path = format!("{}/{}/", self.listing_path.trim_end_matches('/'), page);
        self.base
            .join(&path)
            .with_context(|| format!("Invalid listing path '{path}'"))
    }

    /// Scrape listing pages until one fails, comes back empty or repeats the
    /// previous page.
    pub async fn scrape(&self) -> Result<Vec<RawRecord>> {
        let spinner = create_spinner("Scraping listing".to_string());
        let mut records = Vec::new();
        let mut previous: Vec<RawRecord> = Vec::new();

        for page in 1..=self.max_pages {
            spinner.set_message(format!("Scraping page {page}"));
            let url = self.page_url(page)?;

            let Some(html) = self.fetch_page(&url).await? else {
                break;
            };

            let page_records = parse::parse_listing(&html, &self.base);
            if page_records.is_empty() {
                tracing::debug!(page, "Listing page has no events");
                break;
            }
            if page_records == previous {
                tracing::info!(page, "Listing page repeats the previous page, stopping");
                break;
            }

            tracing::debug!(page, events = page_records.len(), "Parsed listing page");
            records.extend(page_records.iter().cloned());
            previous = page_records;

            if page == self.max_pages {
                tracing::warn!(max_pages = self.max_pages, "Stopped at the page limit");
            }
        }

        if self.fetch_details {
            spinner.set_message("Fetching event details".to_string());
            self.fill_descriptions(&mut records).await;
        }

        spinner.finish_and_clear();
        tracing::info!(records = records.len(), "Scraped listing");
        Ok(records)
    }

    /// Listing page body, or `None` once the site answers with a non-success
    /// status.
    async fn fetch_page(&self, url: &Url) -> Result<Option<String>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request failed for {url}"))?;

        let status = response.status();
        if !status.is_success() {
            if status != StatusCode::NOT_FOUND {
                tracing::warn!(%url, %status, "Listing page returned non-success status");
            }
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Unable to read response body for {url}"))?;
        Ok(Some(body))
    }

    async fn fetch_detail(&self, url: &str) -> Result<Option<String>> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed for {url}"))?
            .error_for_status()
            .with_context(|| format!("Non-success status for {url}"))?
            .text()
            .await
            .with_context(|| format!("Unable to read response body for {url}"))?;

        Ok(parse::parse_detail(&body))
    }

    /// Replace listing teasers with the detail page text. Failures keep the
    /// teaser.
    async fn fill_descriptions(&self, records: &mut [RawRecord]) {
        for record in records.iter_mut() {
            let Some(url) = record.url.clone() else {
                continue;
            };

            match self.fetch_detail(&url).await {
                Ok(Some(description)) => record.description = Some(description),
                Ok(None) => tracing::debug!(%url, "Detail page has no content table"),
                Err(e) => tracing::warn!(%url, error = %e, "Could not fetch detail page"),
            }
        }
    }
}
