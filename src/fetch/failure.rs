//! 抓取失败类型

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// 抓取失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// 非 200 状态码
    Status(u16),
    /// 传输层错误（连接失败、TLS 等）
    Transport(String),
    /// 响应体不是合法 JSON
    Parse(String),
    /// 超过客户端超时
    Timeout,
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCause::Status(code) => write!(f, "HTTP status {}", code),
            FetchCause::Transport(msg) => write!(f, "transport error: {}", msg),
            FetchCause::Parse(msg) => write!(f, "invalid JSON body: {}", msg),
            FetchCause::Timeout => write!(f, "request timed out"),
        }
    }
}

impl From<reqwest::Error> for FetchCause {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchCause::Timeout
        } else if e.is_decode() {
            FetchCause::Parse(e.to_string())
        } else {
            FetchCause::Transport(e.to_string())
        }
    }
}

/// 单个 URL 抓取失败
///
/// 携带 URL、底层原因和捕获时间，不做重试。
#[derive(Error, Debug, Clone)]
#[error("抓取 {url} 失败: {cause} (at {at})")]
pub struct FetchFailure {
    pub url: String,
    pub cause: FetchCause,
    pub at: DateTime<Utc>,
}

impl FetchFailure {
    pub fn new(url: &str, cause: FetchCause) -> Self {
        Self {
            url: url.to_string(),
            cause,
            at: Utc::now(),
        }
    }
}
