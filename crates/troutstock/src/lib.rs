pub mod cache;
pub mod extract;
pub mod normalize;
pub mod scraper;
pub mod table;
pub mod types;
pub mod utils;

pub use cache::{Cache, CacheStatus};
pub use scraper::{ScraperConfig, ScraperError, WebScraper};
pub use types::{DateRange, StockingEvent};

pub(crate) const SCHEDULE_URL: &str = "https://dwr.virginia.gov/fishing/trout-stocking-schedule/";
