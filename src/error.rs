//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::failure::FetchFailure;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 参数前置条件不满足（缺少 pid/key/value、合并时 pid 不一致等）
    #[error("参数无效: {0}")]
    InvalidArgument(String),

    /// 单个抓取失败，携带 URL、原因和时间戳
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    /// 远端服务返回了非预期状态
    #[error("远端服务错误 ({status}): {message}")]
    Remote { status: u16, message: String },

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),
}

impl AppError {
    /// 构造参数错误
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidArgument(message.into())
    }

    /// 是否为参数错误
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, AppError::InvalidArgument(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Remote {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

/// 错误响应
///
/// CLI 在失败时以 JSON 形式输出到 stderr。
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 相关 URL（仅抓取失败时存在）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let code = match err {
            AppError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AppError::Fetch(_) => "FETCH_FAILURE",
            AppError::Remote { .. } => "REMOTE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        };
        let url = match err {
            AppError::Fetch(failure) => Some(failure.url.clone()),
            _ => None,
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
            url,
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::failure::FetchCause;

    #[test]
    fn test_error_response_codes() {
        let err = AppError::invalid("PID must not be empty");
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "INVALID_ARGUMENT");
        assert!(response.url.is_none());
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_fetch_failure_carries_url() {
        let err: AppError =
            FetchFailure::new("https://bad.example/404", FetchCause::Status(404)).into();
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "FETCH_FAILURE");
        assert_eq!(response.url.as_deref(), Some("https://bad.example/404"));
        assert!(response.message.contains("404"));
    }
}
