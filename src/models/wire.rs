//! 与远端 PID 服务交换的 JSON 形状
//!
//! ```json
//! {"pid": "...", "entries": {"<key>": [{"key": "...", "value": "...", "name": "..."}]}}
//! ```
//!
//! 读取时所有字段都是可选的，缺失字段由记录层决定跳过还是报错。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 线上条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WireEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// 发送时总是字符串；读取时接受任意 JSON 值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 线上记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WireRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<BTreeMap<String, Vec<WireEntry>>>,
}
