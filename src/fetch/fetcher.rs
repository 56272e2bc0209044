//! 带缓存的批量抓取
//!
//! `fetch_one` 优先读缓存，`fetch_many` 按并发上限分批执行，
//! 每批内部并发，整批完成后再开始下一批，结果顺序与输入一致。
//! 任一抓取失败时取消同批其余任务并整体失败，不保留部分结果。

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::config::CacheConfig;
use crate::error::{AppError, Result};
use crate::fetch::cache::{CacheStore, STALE_TEMP_AGE};
use crate::fetch::failure::{FetchCause, FetchFailure};
use crate::observability::FetchMetrics;

/// 默认每批并发数
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// 文档抓取接口
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// 抓取单个 URL 的 JSON 文档
    async fn fetch_one(&self, url: &str, force_fresh: bool) -> Result<Value>;

    /// 按输入顺序抓取多个 URL
    async fn fetch_many(&self, urls: &[String], force_fresh: bool) -> Result<Vec<Value>>;
}

/// 基于 reqwest 和磁盘缓存的抓取器
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    cache: CacheStore,
    max_concurrency: usize,
    metrics: FetchMetrics,
}

impl Fetcher {
    /// 使用默认并发上限、无客户端超时创建
    pub fn new(cache: CacheStore) -> Result<Self> {
        Ok(Self {
            client: build_client(None)?,
            cache,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            metrics: FetchMetrics::default(),
        })
    }

    /// 从缓存配置创建
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let timeout = (config.request_timeout_secs > 0)
            .then(|| Duration::from_secs(config.request_timeout_secs));
        Ok(Self {
            client: build_client(timeout)?,
            cache: CacheStore::new(&config.dir),
            max_concurrency: config.max_concurrency.max(1),
            metrics: FetchMetrics::default(),
        })
    }

    /// 设置每批并发上限
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// 设置单次抓取超时
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(Some(timeout))?;
        Ok(self)
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn metrics(&self) -> &FetchMetrics {
        &self.metrics
    }

    /// 抓取单个 URL
    ///
    /// 非强制刷新且缓存命中时不访问网络；否则发起 GET，
    /// 200 时解析并写入缓存，其他情况返回 [`FetchFailure`]，不重试。
    pub async fn fetch_one(&self, url: &str, force_fresh: bool) -> Result<Value> {
        if url.is_empty() {
            return Err(AppError::invalid("Invalid URL"));
        }

        if !force_fresh {
            if let Some(doc) = self.cache.read(url).await {
                tracing::info!("Using cached data for {}", url);
                self.metrics.record_cache_hit();
                return Ok(doc);
            }
        }

        tracing::debug!("Fetching {}", url);
        self.metrics.record_request();

        match self.request(url).await {
            Ok(doc) => {
                // 缓存只是顺带的，写入失败不影响本次结果
                match self.cache.write(url, &doc).await {
                    Ok(path) => {
                        self.metrics.record_cache_write();
                        tracing::debug!("Cached {} at {}", url, path.display());
                    }
                    Err(e) => tracing::warn!("Could not cache {}: {}", url, e),
                }
                Ok(doc)
            }
            Err(cause) => {
                self.metrics.record_failure();
                tracing::error!("Failed to fetch {}: {}", url, cause);
                Err(FetchFailure::new(url, cause).into())
            }
        }
    }

    async fn request(&self, url: &str) -> std::result::Result<Value, FetchCause> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchCause::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchCause::Parse(e.to_string()))
    }

    /// 按批并发抓取多个 URL，结果顺序与输入一致
    pub async fn fetch_many(&self, urls: &[String], force_fresh: bool) -> Result<Vec<Value>> {
        if urls.is_empty() {
            return Err(AppError::invalid(
                "Invalid URLs. Please provide a list of URLs.",
            ));
        }

        if let Err(e) = self.cache.sweep_stale_temp_files(STALE_TEMP_AGE).await {
            tracing::warn!("Failed to sweep stale cache temp files: {}", e);
        }

        let batch_count = urls.len().div_ceil(self.max_concurrency);
        let mut results = Vec::with_capacity(urls.len());

        for (batch_no, batch) in urls.chunks(self.max_concurrency).enumerate() {
            let docs = self.fetch_batch(batch, force_fresh).await?;
            results.extend(docs);
            self.metrics.record_batch();
            tracing::info!(
                "Fetched batch {}/{} ({} documents)",
                batch_no + 1,
                batch_count,
                batch.len()
            );
        }

        Ok(results)
    }

    async fn fetch_batch(&self, batch: &[String], force_fresh: bool) -> Result<Vec<Value>> {
        let mut join_set = JoinSet::new();
        for (offset, url) in batch.iter().enumerate() {
            let fetcher = self.clone();
            let url = url.clone();
            join_set.spawn(async move { (offset, fetcher.fetch_one(&url, force_fresh).await) });
        }

        let mut slots: Vec<Option<Value>> = vec![None; batch.len()];
        while let Some(joined) = join_set.join_next().await {
            let outcome = match joined {
                Ok((offset, Ok(doc))) => {
                    slots[offset] = Some(doc);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) => AppError::Internal(format!("fetch task failed: {}", e)),
            };

            let in_flight = join_set.len();
            join_set.abort_all();
            tracing::warn!(
                "Aborting batch after failure; cancelled {} in-flight fetches",
                in_flight
            );
            return Err(outcome);
        }

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| AppError::Internal("fetch result missing".into())))
            .collect()
    }
}

#[async_trait]
impl DocumentFetcher for Fetcher {
    async fn fetch_one(&self, url: &str, force_fresh: bool) -> Result<Value> {
        Fetcher::fetch_one(self, url, force_fresh).await
    }

    async fn fetch_many(&self, urls: &[String], force_fresh: bool) -> Result<Vec<Value>> {
        Fetcher::fetch_many(self, urls, force_fresh).await
    }
}

fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))
}
