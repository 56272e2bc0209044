use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 远端 PID 服务（Typed PID Maker）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 服务地址，不含 `/api/v1/...` 路径
    pub base_url: String,
    /// 单次请求超时（秒），0 表示不设上限
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".into(),
            timeout_secs: 0,
        }
    }
}

/// 抓取缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存目录
    pub dir: PathBuf,
    /// 每批最大并发抓取数
    pub max_concurrency: usize,
    /// 单次抓取超时（秒），0 表示只依赖传输层自身行为
    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./cache"),
            max_concurrency: 100,
            request_timeout_secs: 0,
        }
    }
}

/// 记录处理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// 是否把看起来像 JSON 的字符串值解析为结构化值
    pub coerce_json_values: bool,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            coerce_json_values: true,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录，按天滚动
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            structured: false,
            log_dir: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 远端服务配置
    pub service: ServiceConfig,
    /// 缓存配置
    pub cache: CacheConfig,
    /// 记录配置
    pub records: RecordConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}
