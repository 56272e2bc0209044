//! PID 记录条目
//!
//! 一个条目是关于某个 PID 的一条事实：`(key, value, name?)`。
//! 构造后不可变，更新在记录层面以“先删后加”实现。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{AppError, Result};
use crate::models::wire::WireEntry;

/// 值规范化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCoercion {
    /// 尝试将字符串解析为 JSON，成功则保存结构化结果，否则保留原字符串。
    ///
    /// 注意 `"42"` 会被保存为数字 `42`，而 `"1.0.0"` 保持为字符串。
    #[default]
    SniffJson,
    /// 字符串原样保存
    Verbatim,
}

impl ValueCoercion {
    /// 从配置开关构造
    pub fn from_flag(coerce_json_values: bool) -> Self {
        if coerce_json_values {
            ValueCoercion::SniffJson
        } else {
            ValueCoercion::Verbatim
        }
    }
}

/// 规范化条目值
///
/// `null` 和空字符串会被拒绝；解析后才变为空字符串的输入（如 `"\"\""`）同样拒绝。
/// 数字、布尔值不是预期的输入类型，仍然接受但会记录警告。
pub fn normalize_value(key: &str, value: Value, coercion: ValueCoercion) -> Result<Value> {
    match value {
        Value::Null => Err(AppError::invalid(format!(
            "value must not be null (key: {})",
            key
        ))),
        Value::String(s) if s.is_empty() => Err(AppError::invalid(format!(
            "value must not be empty (key: {})",
            key
        ))),
        Value::String(s) => match coercion {
            ValueCoercion::SniffJson => match sniff(s) {
                Value::String(parsed) if parsed.is_empty() => Err(AppError::invalid(format!(
                    "value must not be empty after JSON parsing (key: {})",
                    key
                ))),
                parsed => Ok(parsed),
            },
            ValueCoercion::Verbatim => Ok(Value::String(s)),
        },
        structured @ (Value::Object(_) | Value::Array(_)) => Ok(structured),
        scalar => {
            tracing::warn!(
                "Value SHOULD be a string or a structured value: {} = {}",
                key,
                scalar
            );
            Ok(scalar)
        }
    }
}

fn sniff(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        // "null" 解析后为空值，保留原字符串以维持非空不变式
        Ok(Value::Null) => Value::String(raw),
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::trace!("Value is not a JSON string: {}, {}", raw, e);
            Value::String(raw)
        }
    }
}

/// PID 记录条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WireEntry", into = "WireEntry")]
pub struct Entry {
    key: String,
    value: Value,
    name: Option<String>,
    coercion: ValueCoercion,
}

impl Entry {
    /// 使用默认规范化策略创建条目
    pub fn new(key: &str, value: impl Into<Value>, name: Option<&str>) -> Result<Self> {
        Self::with_coercion(key, value, name, ValueCoercion::default())
    }

    /// 使用指定规范化策略创建条目
    pub fn with_coercion(
        key: &str,
        value: impl Into<Value>,
        name: Option<&str>,
        coercion: ValueCoercion,
    ) -> Result<Self> {
        if key.is_empty() {
            return Err(AppError::invalid("key must not be empty"));
        }
        let value = normalize_value(key, value.into(), coercion)?;

        Ok(Self {
            key: key.to_string(),
            value,
            name: name.map(str::to_string),
            coercion,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn coercion(&self) -> ValueCoercion {
        self.coercion
    }

    /// 去重判定：只比较 `(key, value)`，`name` 不参与
    pub fn same_fact(&self, other: &Entry) -> bool {
        self.key == other.key && self.value == other.value
    }

    /// 值的线上字符串形式
    ///
    /// 结构化值重新序列化为 JSON 字符串。在 `SniffJson` 策略下，
    /// 如果一个字符串值本身会被再次解析成别的东西（例如 `"42"`），
    /// 则以 JSON 字符串编码发送，保证读回时得到相同的值。
    pub fn wire_value(&self) -> String {
        match &self.value {
            Value::String(s) => match self.coercion {
                ValueCoercion::SniffJson if sniff(s.clone()) != self.value => {
                    Value::String(s.clone()).to_string()
                }
                _ => s.clone(),
            },
            other => other.to_string(),
        }
    }

    /// 线上格式 `{key, value, name?}`
    pub fn to_wire(&self) -> WireEntry {
        WireEntry {
            key: Some(self.key.clone()),
            value: Some(Value::String(self.wire_value())),
            name: self.name.clone(),
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.same_fact(other) && self.name == other.name
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.to_wire()) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "{}={}", self.key, self.value),
        }
    }
}

impl TryFrom<WireEntry> for Entry {
    type Error = AppError;

    fn try_from(wire: WireEntry) -> Result<Self> {
        let key = wire
            .key
            .ok_or_else(|| AppError::invalid("entry is missing a key"))?;
        let value = wire
            .value
            .ok_or_else(|| AppError::invalid(format!("entry {} is missing a value", key)))?;
        Entry::new(&key, value, wire.name.as_deref())
    }
}

impl From<Entry> for WireEntry {
    fn from(entry: Entry) -> Self {
        entry.to_wire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const KEY: &str = "21.T11148/d0773859091aeb451528";

    #[rstest]
    #[case::plain_text("b", json!("b"))]
    #[case::version_string("1.0.0", json!("1.0.0"))]
    #[case::numeric_string("42", json!(42))]
    #[case::decimal_string("1.0", json!(1.0))]
    #[case::object_string(r#"{"a": 1}"#, json!({"a": 1}))]
    #[case::quoted_string(r#""quoted""#, json!("quoted"))]
    #[case::null_literal("null", json!("null"))]
    fn test_sniff_json_normalization(#[case] input: &str, #[case] expected: Value) {
        let entry = Entry::new(KEY, input, None).unwrap();
        assert_eq!(entry.value(), &expected);
    }

    #[rstest]
    #[case("42")]
    #[case(r#"{"a": 1}"#)]
    #[case("1.0.0")]
    fn test_verbatim_keeps_strings(#[case] input: &str) {
        let entry = Entry::with_coercion(KEY, input, None, ValueCoercion::Verbatim).unwrap();
        assert_eq!(entry.value(), &json!(input));
        assert_eq!(entry.wire_value(), input);
    }

    #[test]
    fn test_structured_value_stored_as_is() {
        let entry = Entry::new(KEY, json!({"landingPage": "https://example.org"}), None).unwrap();
        assert!(entry.value().is_object());
        assert_eq!(entry.wire_value(), r#"{"landingPage":"https://example.org"}"#);
    }

    #[test]
    fn test_scalar_value_is_accepted() {
        let entry = Entry::new(KEY, 7, None).unwrap();
        assert_eq!(entry.value(), &json!(7));
        assert_eq!(entry.wire_value(), "7");
    }

    #[rstest]
    #[case("", json!("b"))]
    #[case(KEY, json!(""))]
    #[case(KEY, Value::Null)]
    #[case(KEY, json!(r#""""#))]
    fn test_invalid_entries_rejected(#[case] key: &str, #[case] value: Value) {
        let err = Entry::new(key, value, None).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_quoted_empty_string_kept_verbatim() {
        let entry = Entry::with_coercion(KEY, r#""""#, None, ValueCoercion::Verbatim).unwrap();
        assert_eq!(entry.value(), &json!(r#""""#));
    }

    #[test]
    fn test_identity_ignores_name() {
        let a = Entry::new(KEY, "b", Some("first")).unwrap();
        let b = Entry::new(KEY, "b", Some("second")).unwrap();
        assert!(a.same_fact(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_wire_form_omits_missing_name() {
        let entry = Entry::new(KEY, "b", None).unwrap();
        let wire = serde_json::to_value(&entry).unwrap();
        assert_eq!(wire, json!({"key": KEY, "value": "b"}));

        let named = Entry::new(KEY, "b", Some("hasParent")).unwrap();
        let wire = serde_json::to_value(&named).unwrap();
        assert_eq!(wire["name"], json!("hasParent"));
    }

    #[test]
    fn test_string_that_looks_like_json_survives_the_wire() {
        let entry = Entry::new(KEY, r#""42""#, None).unwrap();
        assert_eq!(entry.value(), &json!("42"));

        let back: Entry = serde_json::from_value(serde_json::to_value(&entry).unwrap()).unwrap();
        assert_eq!(back.value(), &json!("42"));
    }
}
