use crate::extract::locate_events;
use crate::table::{TableBackend, TableSource};
use crate::types::{DateRange, StockingEvent};

use chrono::Local;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

// The schedule page serves a stripped-down page to non-browser agents.
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub backend: TableBackend,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            url: crate::SCHEDULE_URL.to_string(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            backend: TableBackend::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    url: String,
    tables: Arc<dyn TableSource>,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(ScraperConfig::default())
    }

    pub fn with_config(config: ScraperConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            url: config.url,
            tables: config.backend.source(),
        })
    }

    /// Fetches the schedule and extracts its stocking events.
    ///
    /// A ranged request that fails is retried once without the range. Only a
    /// failure to fetch the page at all is an error; a page without a usable
    /// table yields an empty list.
    pub async fn scrape(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<StockingEvent>, ScraperError> {
        let html = match range {
            Some(range) => {
                let url = self.ranged_url(&range);
                log::info!(
                    "Fetching stocking schedule from {} to {}...",
                    range.start(),
                    range.end()
                );
                match self.get_html(&url).await {
                    Ok(html) => html,
                    Err(e) => {
                        log::warn!("Ranged request failed ({}), retrying without a range", e);
                        self.get_html(&self.url).await?
                    }
                }
            }
            None => {
                log::info!("Fetching stocking schedule...");
                self.get_html(&self.url).await?
            }
        };

        Ok(self.scrape_html(&html))
    }

    /// Recent corrections and upcoming stockings, see [`DateRange::recent`].
    pub async fn scrape_recent(&self) -> Result<Vec<StockingEvent>, ScraperError> {
        self.scrape(Some(DateRange::recent(Local::now().date_naive())))
            .await
    }

    /// Everything the page will return, see [`DateRange::backfill`].
    pub async fn scrape_backfill(&self) -> Result<Vec<StockingEvent>, ScraperError> {
        self.scrape(Some(DateRange::backfill(Local::now().date_naive())))
            .await
    }

    /// Extracts events from an already fetched schedule page.
    pub fn scrape_html(&self, html: &str) -> Vec<StockingEvent> {
        let tables = self.tables.tables(html);
        log::debug!("Found {} table(s) using {:?}", tables.len(), self.tables);
        locate_events(&tables)
    }

    fn ranged_url(&self, range: &DateRange) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, range.query_string())
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scraper(url: &str, backend: TableBackend) -> WebScraper {
        WebScraper::with_config(ScraperConfig {
            url: url.to_string(),
            backend,
            ..Default::default()
        })
        .expect("client")
    }

    #[test]
    fn test_ranged_url() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap();

        let plain = scraper("https://example.org/schedule/", TableBackend::Dom);
        assert_eq!(
            plain.ranged_url(&range),
            "https://example.org/schedule/?start_date=January+1%2C+2024&end_date=December+31%2C+2024"
        );

        let with_query = scraper("https://example.org/schedule/?view=list", TableBackend::Dom);
        assert!(
            with_query
                .ranged_url(&range)
                .starts_with("https://example.org/schedule/?view=list&start_date=")
        );
    }

    #[test]
    fn test_scrape_html_with_either_backend() {
        let html = r#"
            <table>
              <tr><th>Date</th><th>Water Body</th><th>County</th><th>Species</th></tr>
              <tr><td>June 1, 2024</td><td>Smith Creek</td><td>Bath</td><td>Rainbow Trout</td></tr>
            </table>
        "#;

        for backend in [TableBackend::Dom, TableBackend::Regex] {
            let events = scraper("https://example.org/", backend).scrape_html(html);
            assert_eq!(events.len(), 1, "backend {:?}", backend);
            assert_eq!(events[0].county, "Bath");
        }
    }

    #[test]
    fn test_scrape_html_without_tables_is_empty() {
        let events = scraper("https://example.org/", TableBackend::Dom)
            .scrape_html("<html><body><p>Maintenance</p></body></html>");
        assert!(events.is_empty());
    }
}
