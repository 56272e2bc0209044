//! 抓取与缓存模块
//!
//! 通过 HTTP 获取 JSON 文档并缓存到磁盘，支持有并发上限的批量抓取。

pub mod cache;
pub mod failure;
pub mod fetcher;

pub use cache::CacheStore;
pub use failure::{FetchCause, FetchFailure};
pub use fetcher::{DEFAULT_MAX_CONCURRENCY, DocumentFetcher, Fetcher};
