use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rmcp::{
    ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{ErrorData as McpError, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use troutstock::utils::{EventFilter, group_by_water_body};
use troutstock::{Cache, CacheStatus, StockingEvent, WebScraper};

pub const RECENT_KEY: &str = "stocking:recent";
pub const BACKFILL_KEY: &str = "stocking:backfill";

const CACHE_TTL_ENV: &str = "TROUTSTOCK_CACHE_TTL_SECS";

pub type EventCache = Cache<Arc<Vec<StockingEvent>>>;

/// One cache for the whole process, TTL taken from `TROUTSTOCK_CACHE_TTL_SECS`
/// when set.
pub fn cache_from_env() -> Arc<EventCache> {
    let ttl = std::env::var(CACHE_TTL_ENV)
        .ok()
        .and_then(|secs| {
            secs.parse::<u64>()
                .inspect_err(|e| log::warn!("Ignoring {CACHE_TTL_ENV}={secs}: {e}"))
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(troutstock::cache::DEFAULT_TTL);

    log::info!("Caching stocking schedules for {:?}", ttl);
    Arc::new(EventCache::new(ttl))
}

fn cache_key(history: bool) -> &'static str {
    if history { BACKFILL_KEY } else { RECENT_KEY }
}

fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, McpError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|e| {
                McpError::invalid_params(
                    format!("Invalid {name} '{v}', expected YYYY-MM-DD: {e}"),
                    None,
                )
            })
        })
        .transpose()
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, McpError> {
    serde_json::to_string_pretty(value)
        .inspect_err(|e| log::error!("Serialization error: {e:?}"))
        .map_err(|e| McpError::internal_error(format!("Failed to serialize {what}: {e}"), None))
}

#[derive(Debug, Clone)]
pub struct McpServer {
    scraper: WebScraper,
    cache: Arc<EventCache>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl McpServer {
    pub fn new(cache: Arc<EventCache>) -> Result<Self, anyhow::Error> {
        Ok(Self {
            scraper: WebScraper::new()?,
            cache,
            tool_router: Self::tool_router(),
        })
    }

    /// Cached events for the window, scraping the page on a miss.
    async fn events(&self, history: bool) -> Result<Arc<Vec<StockingEvent>>, McpError> {
        let key = cache_key(history);
        if let Some(events) = self.cache.get(key) {
            return Ok(events);
        }

        let scraped = if history {
            self.scraper.scrape_backfill().await
        } else {
            self.scraper.scrape_recent().await
        };
        let events = scraped
            .inspect_err(|e| log::error!("Failed to scrape stocking schedule: {e}"))
            .map_err(|e| {
                McpError::internal_error(format!("Failed to fetch stocking schedule: {e}"), None)
            })?;

        let events = Arc::new(events);
        self.cache.set(key, Arc::clone(&events));
        Ok(events)
    }

    #[tool(
        name = "list_stocking_events",
        description = "List Virginia trout stocking events from the DWR stocking schedule. Supports filtering by date range (YYYY-MM-DD), county, species, water body, limit and offset. Set `history` to true to search the full history instead of the last 60 days and the coming year."
    )]
    pub async fn list_stocking_events(
        &self,
        Parameters(params): Parameters<ListEventsParams>,
    ) -> Result<String, McpError> {
        let filter = EventFilter {
            start_date: parse_date_param("start_date", params.start_date.as_deref())?,
            end_date: parse_date_param("end_date", params.end_date.as_deref())?,
            county: params.county,
            species: params.species,
            water_body: params.water_body,
            limit: params.limit,
            offset: params.offset,
        }
        .validate()
        .inspect_err(|e| log::error!("Invalid params: {e:?}"))
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let events = self.events(params.history).await?;
        let events = filter.apply(Vec::clone(&events));
        to_json(&events, "stocking events")
    }

    #[tool(
        name = "group_stocking_by_water_body",
        description = "Stocking events grouped by water body, optionally limited to a date range (YYYY-MM-DD). Set `history` to true to search the full history."
    )]
    pub async fn group_stocking_by_water_body(
        &self,
        Parameters(params): Parameters<GroupParams>,
    ) -> Result<String, McpError> {
        let filter = EventFilter {
            start_date: parse_date_param("start_date", params.start_date.as_deref())?,
            end_date: parse_date_param("end_date", params.end_date.as_deref())?,
            ..Default::default()
        }
        .validate()
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let events = self.events(params.history).await?;
        let groups = group_by_water_body(&filter.apply(Vec::clone(&events)));
        to_json(&groups, "grouped stocking events")
    }

    #[tool(
        name = "stocking_cache_status",
        description = "Report whether the recent and historical stocking schedules are cached, when they were fetched and when they expire."
    )]
    pub async fn stocking_cache_status(&self) -> Result<String, McpError> {
        let status: BTreeMap<&str, CacheStatus> = [RECENT_KEY, BACKFILL_KEY]
            .into_iter()
            .map(|key| (key, self.cache.status(key)))
            .collect();
        to_json(&status, "cache status")
    }

    #[tool(
        name = "refresh_stocking_cache",
        description = "Drop the cached stocking schedule and fetch it again from the DWR website. Set `history` to true to refresh the full history."
    )]
    pub async fn refresh_stocking_cache(
        &self,
        Parameters(params): Parameters<RefreshParams>,
    ) -> Result<String, McpError> {
        let key = cache_key(params.history);
        self.cache.clear(key);

        let events = self.events(params.history).await?;
        log::info!("Refreshed '{}' with {} events", key, events.len());
        to_json(&self.cache.status(key), "cache status")
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListEventsParams {
    start_date: Option<String>,
    end_date: Option<String>,
    county: Option<String>,
    species: Option<String>,
    water_body: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    #[serde(default)]
    history: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GroupParams {
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    history: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RefreshParams {
    #[serde(default)]
    history: bool,
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(include_str!("./instructions.md").to_string()),
            ..Default::default()
        }
    }
}
