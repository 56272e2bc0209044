//! 简单记录格式
//!
//! `{"pid": "...", "record": [{"key": "...", "value": ...}]}`，
//! 不携带 `name`，用于轻量构造和对外导出。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::entry::ValueCoercion;
use crate::models::record::Record;

/// 键值对
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimplePair {
    pub key: String,
    pub value: Value,
}

/// 简单格式记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SimpleRecord {
    /// 待创建的记录可以没有 PID，由服务分配
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default)]
    pub record: Vec<SimplePair>,
}

impl SimpleRecord {
    /// 转换为完整记录
    pub fn to_record(&self) -> Result<Record> {
        self.to_record_with(ValueCoercion::default())
    }

    /// 转换为完整记录，使用指定的规范化策略
    ///
    /// 空 key 的键值对会被跳过。
    pub fn to_record_with(&self, coercion: ValueCoercion) -> Result<Record> {
        let pid = self
            .pid
            .as_deref()
            .ok_or_else(|| AppError::invalid("simple record has no PID"))?;
        let mut record = Record::with_coercion(pid, coercion)?;
        for pair in self.record.iter().filter(|p| !p.key.is_empty()) {
            record.add_entry(&pair.key, pair.value.clone(), None)?;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_record_to_record() {
        let simple: SimpleRecord = serde_json::from_value(json!({
            "pid": "a",
            "record": [
                {"key": "21.T11148/d0773859091aeb451528", "value": "b"},
                {"key": "21.T11148/d0773859091aeb451528", "value": "b"},
                {"key": "", "value": "ignored"}
            ]
        }))
        .unwrap();

        let record = simple.to_record().unwrap();
        assert_eq!(record.pid(), "a");
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_simple_record_without_pid() {
        let simple: SimpleRecord = serde_json::from_value(json!({
            "record": [{"key": "21.T11148/c692273deb2772da307f", "value": "1.0.0"}]
        }))
        .unwrap();

        assert!(simple.pid.is_none());
        assert!(simple.to_record().unwrap_err().is_invalid_argument());
    }
}
