//! 服务模块

pub mod tpm;

use std::sync::Arc;
use std::time::Duration;

pub use tpm::TpmClient;

use crate::config::config::AppConfig;
use crate::error::Result;
use crate::fetch::{DocumentFetcher, Fetcher};
use crate::models::ValueCoercion;

/// 根据配置创建 PID 服务客户端及其使用的抓取器
pub fn create_tpm_client(config: &AppConfig) -> Result<(TpmClient, Arc<Fetcher>)> {
    let fetcher = Arc::new(Fetcher::from_config(&config.cache)?);
    let mut client = TpmClient::new(
        &config.service.base_url,
        fetcher.clone() as Arc<dyn DocumentFetcher>,
    )?
    .with_coercion(ValueCoercion::from_flag(config.records.coerce_json_values));

    if config.service.timeout_secs > 0 {
        client = client.with_timeout(Duration::from_secs(config.service.timeout_secs))?;
    }

    Ok((client, fetcher))
}
