//! Fetch pipeline.
//!
//! - `WorkerPool`: shared workers, one fetch session each
//! - `Throttle`: jitter plus the process-wide in-flight cap
//! - `SearchService`: paginated search with early stop
//! - `DetailFetcher`: allow-listed single page fetches

pub mod details;
pub mod pool;
pub mod search;
pub mod throttle;

pub use details::DetailFetcher;
pub use pool::{TaskHandle, WorkerPool};
pub use search::{PageOutcome, SearchService, normalize_query, search_url};
pub use throttle::{Jitter, Throttle};
