//! 可观测性模块
//!
//! 提供抓取指标和结构化日志初始化。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::config::LoggingConfig;

// ===== Fetch Metrics =====

/// 抓取指标
#[derive(Clone, Default, Debug)]
pub struct FetchMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub cache_hits: Arc<AtomicU64>,
    pub cache_writes: Arc<AtomicU64>,
    pub failures_total: Arc<AtomicU64>,
    pub batches_total: Arc<AtomicU64>,
}

impl FetchMetrics {
    /// 记录一次网络请求
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录缓存命中
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录缓存写入
    pub fn record_cache_write(&self) {
        self.cache_writes.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录失败
    pub fn record_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::SeqCst);
    }

    /// 记录一个完成的批次
    pub fn record_batch(&self) {
        self.batches_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn requests(&self) -> u64 {
        self.requests_total.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }

    /// 生成 Prometheus 格式指标
    pub fn gather(&self) -> String {
        format!(
            r#"# HELP pid_fetch_requests_total Network fetches issued
# TYPE pid_fetch_requests_total counter
pid_fetch_requests_total {}
# HELP pid_fetch_cache_hits_total Fetches served from the on-disk cache
# TYPE pid_fetch_cache_hits_total counter
pid_fetch_cache_hits_total {}
# HELP pid_fetch_cache_writes_total Documents written to the cache
# TYPE pid_fetch_cache_writes_total counter
pid_fetch_cache_writes_total {}
# HELP pid_fetch_failures_total Failed fetches
# TYPE pid_fetch_failures_total counter
pid_fetch_failures_total {}
# HELP pid_fetch_batches_total Completed fetch batches
# TYPE pid_fetch_batches_total counter
pid_fetch_batches_total {}
"#,
            self.requests_total.load(Ordering::SeqCst),
            self.cache_hits.load(Ordering::SeqCst),
            self.cache_writes.load(Ordering::SeqCst),
            self.failures_total.load(Ordering::SeqCst),
            self.batches_total.load(Ordering::SeqCst),
        )
    }
}

// ===== Structured Logging =====

/// 初始化结构化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了 `log_dir` 时同时写入按天滚动的文件，
/// 返回的 guard 需要在进程生命周期内保持存活。
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},pidkit={}", config.level, config.level)));

    let (file_writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pidkit.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.structured {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .with(file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w)))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }

    guard
}
