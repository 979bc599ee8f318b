mod mcp;

pub use mcp::{BACKFILL_KEY, EventCache, McpServer, RECENT_KEY, cache_from_env};
