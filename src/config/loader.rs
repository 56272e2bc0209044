use crate::config::config::{AppConfig, CacheConfig};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 环境变量前缀，嵌套字段用 `__` 分隔，例如 `PIDKIT_CACHE__DIR`
const ENV_PREFIX: &str = "PIDKIT_";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 优先级（后者覆盖前者）：
    /// 1. 内置默认值
    /// 2. ./pidkit.toml
    /// 3. 环境变量
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// 只加载缓存配置
    pub fn load_cache_config() -> Result<CacheConfig, figment::Error> {
        Self::figment(&default_config_path())
            .focus("cache")
            .extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.service.base_url.is_empty() {
            return Err(ConfigValidationError::MissingServiceUrl);
        }

        if config.cache.max_concurrency == 0 {
            return Err(ConfigValidationError::InvalidConcurrency);
        }

        if config.cache.dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::InvalidPath(
                "cache.dir must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("PID 服务地址未配置")]
    MissingServiceUrl,

    #[error("并发上限无效，必须大于 0")]
    InvalidConcurrency,

    #[error("配置路径无效: {0}")]
    InvalidPath(String),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("pidkit.toml")
}
