//! pidkit - PID 记录客户端库
//!
//! 为 FAIR Digital Object 管理 PID 记录：带去重和合并语义的记录模型，
//! 以及有并发上限、带磁盘缓存的批量抓取器。

pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod observability;
pub mod services;
