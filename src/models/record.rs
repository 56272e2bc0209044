//! PID 记录与合并引擎
//!
//! 一条记录由 PID 和 `key -> [Entry]` 的多值映射组成。
//! 同一 key 下不存在 `(key, value)` 相同的两个条目；`name` 不参与去重，
//! 先加入的条目（包括它的 `name`）会被保留。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AppError, Result};
use crate::models::entry::{Entry, ValueCoercion, normalize_value};
use crate::models::simple::{SimplePair, SimpleRecord};
use crate::models::wire::{WireEntry, WireRecord};

/// 构造记录时可接受的条目来源
#[derive(Debug, Clone)]
pub enum EntrySource {
    /// 已构造好的条目
    Entry(Entry),
    /// 原始 `{key, value, name?}` 三元组，缺少 key 或 value 时忽略
    Raw(WireEntry),
}

impl From<Entry> for EntrySource {
    fn from(entry: Entry) -> Self {
        EntrySource::Entry(entry)
    }
}

impl From<WireEntry> for EntrySource {
    fn from(raw: WireEntry) -> Self {
        EntrySource::Raw(raw)
    }
}

/// PID 记录
///
/// 所有修改都在原地进行并返回 `&mut Self`，便于链式调用。
/// 记录本身不加锁，并发修改需要调用方自行串行化。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub struct Record {
    pid: String,
    entries: BTreeMap<String, Vec<Entry>>,
    coercion: ValueCoercion,
}

impl Record {
    /// 创建空记录
    pub fn new(pid: &str) -> Result<Self> {
        Self::with_coercion(pid, ValueCoercion::default())
    }

    /// 创建使用指定值规范化策略的空记录
    ///
    /// 线上格式不携带策略。`Verbatim` 记录必须用
    /// [`Record::from_json_with`] 以同一策略读回：`from_json` 和 serde
    /// 反序列化都使用默认的 `SniffJson`，会把 `"42"` 读成数字 `42`。
    pub fn with_coercion(pid: &str, coercion: ValueCoercion) -> Result<Self> {
        if pid.is_empty() {
            return Err(AppError::invalid("PID must not be empty"));
        }
        Ok(Self {
            pid: pid.to_string(),
            entries: BTreeMap::new(),
            coercion,
        })
    }

    /// 创建记录并逐个加入条目（同样去重）
    pub fn with_entries<I>(pid: &str, entries: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<EntrySource>,
    {
        let mut record = Self::new(pid)?;
        for source in entries {
            match source.into() {
                EntrySource::Entry(entry) => {
                    record.add_entry_from(entry);
                }
                EntrySource::Raw(WireEntry {
                    key: Some(key),
                    value: Some(value),
                    name,
                }) => {
                    record.add_entry(&key, value, name.as_deref())?;
                }
                EntrySource::Raw(raw) => {
                    tracing::debug!("Ignoring raw entry without key or value: {:?}", raw);
                }
            }
        }
        Ok(record)
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn coercion(&self) -> ValueCoercion {
        self.coercion
    }

    /// 全部条目
    pub fn entries(&self) -> &BTreeMap<String, Vec<Entry>> {
        &self.entries
    }

    /// 条目总数
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 加入一个条目；同 key 下已有相同值时静默跳过
    pub fn add_entry_from(&mut self, entry: Entry) -> &mut Self {
        let existing = self.entries.entry(entry.key().to_string()).or_default();
        if existing.iter().any(|e| e.same_fact(&entry)) {
            tracing::debug!(
                "Entry with key {} and value {} already exists. Skipping",
                entry.key(),
                entry.value()
            );
        } else {
            tracing::debug!("Adding entry {} to PID record {}", entry, self.pid);
            existing.push(entry);
        }
        self
    }

    /// 构造条目后加入
    pub fn add_entry(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        name: Option<&str>,
    ) -> Result<&mut Self> {
        let entry = Entry::with_coercion(key, value, name, self.coercion)?;
        Ok(self.add_entry_from(entry))
    }

    /// 加入多个已构造的条目
    pub fn add_list_of_entries(&mut self, entries: impl IntoIterator<Item = Entry>) -> &mut Self {
        for entry in entries {
            self.add_entry_from(entry);
        }
        self
    }

    /// 在同一 key 下加入多个值
    ///
    /// 先校验全部值，任一无效时记录保持不变。
    pub fn add_entries<V>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
        name: Option<&str>,
    ) -> Result<&mut Self>
    where
        V: Into<Value>,
    {
        let entries = values
            .into_iter()
            .map(|v| Entry::with_coercion(key, v, name, self.coercion))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.add_list_of_entries(entries))
    }

    /// 用单个新条目替换该 key 下的全部条目
    pub fn update_entry(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        name: Option<&str>,
    ) -> Result<&mut Self> {
        let entry = Entry::with_coercion(key, value, name, self.coercion)?;
        self.entries.remove(key);
        Ok(self.add_entry_from(entry))
    }

    /// 获取 key 下的条目，未知 key 返回空切片
    pub fn get_entry(&self, key: &str) -> Result<&[Entry]> {
        require_key(key)?;
        Ok(self.entries.get(key).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// 检查条目是否存在
    ///
    /// `value` 为 `None` 时只检查 key；否则按记录的规范化策略处理后比较值。
    /// 无法规范化的值（空值、空字符串）不可能存在于记录中，返回 `false`。
    pub fn entry_exists(&self, key: &str, value: Option<&Value>) -> Result<bool> {
        require_key(key)?;
        let Some(existing) = self.entries.get(key) else {
            return Ok(false);
        };
        match value {
            None => Ok(true),
            Some(value) => match normalize_value(key, value.clone(), self.coercion) {
                Ok(wanted) => Ok(existing.iter().any(|e| e.value() == &wanted)),
                Err(_) => Ok(false),
            },
        }
    }

    /// 删除条目
    ///
    /// `value` 为 `None` 时删除整个 key；否则只删除值匹配的条目。
    /// key 下不再有条目时该 key 一并移除。无法规范化的值匹配不到任何条目，记录保持不变。
    pub fn delete_entry(&mut self, key: &str, value: Option<&Value>) -> Result<&mut Self> {
        require_key(key)?;
        match value {
            None => {
                self.entries.remove(key);
            }
            Some(value) => {
                let Ok(unwanted) = normalize_value(key, value.clone(), self.coercion) else {
                    tracing::debug!("Nothing to delete for {}: value cannot be stored", key);
                    return Ok(self);
                };
                if let Some(existing) = self.entries.get_mut(key) {
                    existing.retain(|e| e.value() != &unwanted);
                    if existing.is_empty() {
                        self.entries.remove(key);
                    }
                }
            }
        }
        Ok(self)
    }

    /// 清空全部条目，PID 不变
    pub fn delete_all_entries(&mut self) -> &mut Self {
        self.entries.clear();
        self
    }

    /// 将另一条相同 PID 的记录合并进来
    ///
    /// 只加入本记录中尚不存在的 `(key, value)`；已存在时保留本记录的条目。
    /// PID 不一致时直接失败，本记录不会被修改。
    pub fn merge(&mut self, other: &Record) -> Result<&mut Self> {
        if self.pid != other.pid {
            return Err(AppError::invalid(format!(
                "PID of both PID records must be the same: {} != {}",
                self.pid, other.pid
            )));
        }

        let before = self.len();
        for entry in other.entries.values().flatten() {
            self.add_entry_from(entry.clone());
        }
        tracing::debug!(
            "Merged PID record {}: {} entries added",
            self.pid,
            self.len() - before
        );
        Ok(self)
    }

    /// 线上格式
    pub fn to_wire(&self) -> WireRecord {
        let entries = self
            .entries
            .iter()
            .map(|(key, list)| (key.clone(), list.iter().map(Entry::to_wire).collect()))
            .collect();
        WireRecord {
            pid: Some(self.pid.clone()),
            entries: Some(entries),
        }
    }

    /// 线上格式的 JSON 对象
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.to_wire()).unwrap_or(Value::Null)
    }

    /// 从线上 JSON 对象解析
    pub fn from_json(input: &Value) -> Result<Self> {
        Self::from_json_with(input, ValueCoercion::default())
    }

    /// 从线上 JSON 对象解析，使用指定的规范化策略
    pub fn from_json_with(input: &Value, coercion: ValueCoercion) -> Result<Self> {
        tracing::debug!("Trying to extract PID record from JSON");
        let wire: WireRecord = serde_json::from_value(input.clone())
            .map_err(|e| AppError::invalid(format!("malformed PID record JSON: {}", e)))?;
        Self::from_wire(wire, coercion)
    }

    /// 从线上结构构造
    ///
    /// 缺少 key 或 value 的条目会被跳过并记录警告，不会导致整体失败。
    pub fn from_wire(wire: WireRecord, coercion: ValueCoercion) -> Result<Self> {
        let pid = wire
            .pid
            .ok_or_else(|| AppError::invalid("PID must be in JSON object"))?;
        let mut record = Self::with_coercion(&pid, coercion)?;

        for (key, list) in wire.entries.unwrap_or_default() {
            for raw in list {
                let Some(value) = raw.value.clone().filter(|_| raw.key.is_some()) else {
                    tracing::warn!(
                        "Skipping entry {:?} of {} because it does not contain a key or value",
                        raw,
                        pid
                    );
                    continue;
                };
                if raw.key.as_deref() != Some(key.as_str()) {
                    tracing::debug!(
                        "Entry key {:?} differs from its group {}; using the group key",
                        raw.key,
                        key
                    );
                }
                match Entry::with_coercion(&key, value, raw.name.as_deref(), coercion) {
                    Ok(entry) => {
                        record.add_entry_from(entry);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping invalid entry under {} of {}: {}", key, pid, e);
                    }
                }
            }
        }

        Ok(record)
    }

    /// 简单格式，丢弃 `name`
    pub fn export_simple_format(&self) -> SimpleRecord {
        let record = self
            .entries
            .iter()
            .flat_map(|(key, list)| {
                list.iter().map(move |entry| SimplePair {
                    key: key.clone(),
                    value: entry.value().clone(),
                })
            })
            .collect();
        SimpleRecord {
            pid: Some(self.pid.clone()),
            record,
        }
    }

    /// 简单格式的 JSON 对象 `{pid, record: [{key, value}]}`
    pub fn export_simple_format_json(&self) -> Value {
        serde_json::to_value(self.export_simple_format()).unwrap_or(Value::Null)
    }
}

fn require_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AppError::invalid("key must not be empty"));
    }
    Ok(())
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl TryFrom<WireRecord> for Record {
    type Error = AppError;

    fn try_from(wire: WireRecord) -> Result<Self> {
        Record::from_wire(wire, ValueCoercion::default())
    }
}

impl From<Record> for WireRecord {
    fn from(record: Record) -> Self {
        record.to_wire()
    }
}
