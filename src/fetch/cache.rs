//! 磁盘响应缓存
//!
//! 每个 URL 对应缓存目录下的一个文件，文件名由 URL 中的路径分隔符替换为 `_`
//! 再加上 `.json` 后缀得到。缓存不会自动过期。
//!
//! 写入先落到 `.{uuid}.tmp` 临时文件再重命名。写入任务在两步之间被取消时
//! 临时文件会遗留下来，由 [`CacheStore::sweep_stale_temp_files`] 按年龄清理。

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const CACHE_EXTENSION: &str = ".json";
const TEMP_EXTENSION: &str = ".tmp";

/// 超过该时长的临时文件视为被取消写入的遗留
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(600);

/// 缓存存储
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// URL 对应的缓存文件路径
    pub fn path_for(&self, url: &str) -> PathBuf {
        let file_name: String = url
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{}{}", file_name, CACHE_EXTENSION))
    }

    /// 读取缓存
    ///
    /// 文件不存在、不可读或内容不是 JSON 对象时视为未命中。
    pub async fn read(&self, url: &str) -> Option<Value> {
        let path = self.path_for(url);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!("Cache file {} unreadable: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(doc @ Value::Object(_)) => Some(doc),
            Ok(_) => {
                tracing::debug!("Cache file {} is not a JSON object", path.display());
                None
            }
            Err(e) => {
                tracing::debug!("Cache file {} is not valid JSON: {}", path.display(), e);
                None
            }
        }
    }

    /// 写入缓存
    ///
    /// 先写临时文件再重命名，整文件覆盖；同一 URL 的并发写入以最后一次为准。
    pub async fn write(&self, url: &str, doc: &Value) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(url);
        let tmp = self
            .dir
            .join(format!(".{}{}", uuid::Uuid::new_v4().simple(), TEMP_EXTENSION));
        let bytes = serde_json::to_vec(doc)?;

        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(path)
    }

    /// 删除早于 `max_age` 的遗留临时文件，返回删除数量
    ///
    /// 较新的临时文件可能属于仍在进行的写入，保持不动。
    pub async fn sweep_stale_temp_files(&self, max_age: Duration) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if !file_name.starts_with('.') || !file_name.ends_with(TEMP_EXTENSION) {
                continue;
            }

            let age = entry
                .metadata()
                .await?
                .modified()?
                .elapsed()
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed > 0 {
            tracing::debug!(
                "Removed {} stale temp files from {}",
                removed,
                self.dir.display()
            );
        }
        Ok(removed)
    }
}
