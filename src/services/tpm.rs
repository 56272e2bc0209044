//! Typed PID Maker 客户端
//!
//! 与远端 PID 服务通信：创建、批量创建、获取、更新单条记录，
//! 以及通过已知 PID 列表批量拉取全部记录。

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::fetch::DocumentFetcher;
use crate::models::{Record, ValueCoercion};

const PID_ENDPOINT: &str = "/api/v1/pit/pid";
const PIDS_ENDPOINT: &str = "/api/v1/pit/pids";
const KNOWN_PID_ENDPOINT: &str = "/api/v1/pit/known-pid";

#[derive(Deserialize)]
struct KnownPid {
    pid: String,
}

/// PID 服务客户端
#[derive(Clone)]
pub struct TpmClient {
    base_url: String,
    http: reqwest::Client,
    fetcher: Arc<dyn DocumentFetcher>,
    coercion: ValueCoercion,
}

impl TpmClient {
    pub fn new(base_url: &str, fetcher: Arc<dyn DocumentFetcher>) -> Result<Self> {
        if base_url.is_empty() {
            return Err(AppError::invalid("TPM URL must not be empty"));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            fetcher,
            coercion: ValueCoercion::default(),
        })
    }

    /// 为单条请求设置超时
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))?;
        Ok(self)
    }

    /// 解析响应记录时使用的值规范化策略
    pub fn with_coercion(mut self, coercion: ValueCoercion) -> Self {
        self.coercion = coercion;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 单条记录的 URL
    pub fn record_url(&self, pid: &str) -> String {
        format!("{}{}/{}", self.base_url, PID_ENDPOINT, pid)
    }

    /// 创建单条记录，返回服务分配了 PID 的记录
    pub async fn create_record(&self, record: &Record) -> Result<Record> {
        tracing::info!("Creating FAIR-DO {}", record.pid());
        let url = format!("{}{}", self.base_url, PID_ENDPOINT);

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&record.to_json())
            .send()
            .await?;

        let body = expect_status(response, StatusCode::CREATED).await?;
        Record::from_json_with(&body, self.coercion)
    }

    /// 批量创建记录
    ///
    /// 服务会把记录之间引用的临时 PID 替换为真实 PID。
    pub async fn create_records(&self, records: &[Record]) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Err(AppError::invalid("No content to create due to invalid input"));
        }
        tracing::info!("Creating {} FAIR-DOs", records.len());

        let content: Vec<Value> = records.iter().map(Record::to_json).collect();
        let url = format!("{}{}", self.base_url, PIDS_ENDPOINT);

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&content)
            .send()
            .await?;

        let body = expect_status(response, StatusCode::CREATED).await?;
        let created = as_array(body)?
            .iter()
            .map(|doc| Record::from_json_with(doc, self.coercion))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Successfully created {} FAIR-DOs", created.len());
        Ok(created)
    }

    /// 获取单条记录
    pub async fn get_record(&self, pid: &str) -> Result<Record> {
        if pid.is_empty() {
            return Err(AppError::invalid("PID must not be empty"));
        }

        let response = self
            .http
            .get(self.record_url(pid))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let body = expect_status(response, StatusCode::OK).await?;
        Record::from_json_with(&body, self.coercion)
    }

    /// 更新单条记录
    pub async fn update_record(&self, record: &Record) -> Result<Record> {
        tracing::info!("Updating PID record {}", record.pid());

        let response = self
            .http
            .put(self.record_url(record.pid()))
            .header(CONTENT_TYPE, "application/json")
            .json(&record.to_json())
            .send()
            .await?;

        let body = expect_status(response, StatusCode::OK).await?;
        Record::from_json_with(&body, self.coercion)
    }

    /// 获取服务已知的全部记录
    ///
    /// 服务不一定知道前缀下的所有 PID。逐条记录强制刷新抓取，不使用缓存。
    pub async fn get_all_records(&self) -> Result<Vec<Record>> {
        let url = format!("{}{}", self.base_url, KNOWN_PID_ENDPOINT);
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let body = expect_status(response, StatusCode::OK).await?;
        let known: Vec<KnownPid> = serde_json::from_value(body)?;
        if known.is_empty() {
            tracing::info!("Service reports no known PIDs");
            return Ok(Vec::new());
        }

        let urls: Vec<String> = known.iter().map(|k| self.record_url(&k.pid)).collect();
        tracing::info!("Fetching {} known PID records", urls.len());

        self.fetcher
            .fetch_many(&urls, true)
            .await?
            .iter()
            .map(|doc| Record::from_json_with(doc, self.coercion))
            .collect()
    }
}

async fn expect_status(response: reqwest::Response, expected: StatusCode) -> Result<Value> {
    let status = response.status();
    if status != expected {
        let message = response.text().await.unwrap_or_default();
        tracing::error!("Unexpected response {} (expected {}): {}", status, expected, message);
        return Err(AppError::Remote {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

fn as_array(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        other => Err(AppError::Serialization(format!(
            "expected a JSON array, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HAS_RELATED: &str = "21.T11148/d0773859091aeb451528";

    /// 记录调用参数的抓取器
    #[derive(Default)]
    struct RecordingFetcher {
        calls: Mutex<Vec<(Vec<String>, bool)>>,
    }

    #[async_trait]
    impl DocumentFetcher for RecordingFetcher {
        async fn fetch_one(&self, url: &str, force_fresh: bool) -> Result<Value> {
            let mut docs = self.fetch_many(&[url.to_string()], force_fresh).await?;
            Ok(docs.remove(0))
        }

        async fn fetch_many(&self, urls: &[String], force_fresh: bool) -> Result<Vec<Value>> {
            self.calls
                .lock()
                .unwrap()
                .push((urls.to_vec(), force_fresh));
            Ok(urls
                .iter()
                .map(|u| {
                    let pid = u.rsplit("/pid/").next().unwrap_or_default();
                    json!({"pid": pid, "entries": {}})
                })
                .collect())
        }
    }

    fn record(pid: &str, related: &str) -> Record {
        let mut record = Record::new(pid).unwrap();
        record.add_entry(HAS_RELATED, related, None).unwrap();
        record
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(RecordingFetcher::default());
        assert!(TpmClient::new("", fetcher).is_err());
    }

    #[test]
    fn test_record_url_trims_trailing_slash() {
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new("https://typid.example.org/", fetcher).unwrap();
        assert_eq!(
            client.record_url("21.T11148/abc"),
            "https://typid.example.org/api/v1/pit/pid/21.T11148/abc"
        );
    }

    #[tokio::test]
    async fn test_create_records_round_trip() {
        let server = MockServer::start().await;
        let a = record("a", "b");
        let b = record("b", "a");

        Mock::given(method("POST"))
            .and(path("/api/v1/pit/pids"))
            .and(body_json(json!([a.to_json(), b.to_json()])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                record("21.T11148/aaa", "21.T11148/bbb").to_json(),
                record("21.T11148/bbb", "21.T11148/aaa").to_json(),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new(&server.uri(), fetcher).unwrap();
        let created = client.create_records(&[a, b]).await.unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(
            created[0].get_entry(HAS_RELATED).unwrap()[0].value(),
            &json!(created[1].pid())
        );
    }

    #[tokio::test]
    async fn test_create_records_rejects_empty_input() {
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new("http://localhost:1", fetcher).unwrap();
        assert!(client.create_records(&[]).await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_unexpected_status_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/pit/pid"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad record"))
            .mount(&server)
            .await;

        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new(&server.uri(), fetcher).unwrap();
        let err = client.create_record(&record("a", "b")).await.unwrap_err();
        assert!(matches!(err, AppError::Remote { status: 400, ref message } if message == "bad record"));
    }

    #[tokio::test]
    async fn test_get_and_update_record() {
        let server = MockServer::start().await;
        let stored = record("21.T11148/abc", "x");

        Mock::given(method("GET"))
            .and(path("/api/v1/pit/pid/21.T11148/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored.to_json()))
            .mount(&server)
            .await;

        let mut updated = stored.clone();
        updated.update_entry(HAS_RELATED, "y", None).unwrap();
        Mock::given(method("PUT"))
            .and(path("/api/v1/pit/pid/21.T11148/abc"))
            .and(body_json(updated.to_json()))
            .respond_with(ResponseTemplate::new(200).set_body_json(updated.to_json()))
            .mount(&server)
            .await;

        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new(&server.uri(), fetcher).unwrap();

        let got = client.get_record("21.T11148/abc").await.unwrap();
        assert!(got.entry_exists(HAS_RELATED, Some(&json!("x"))).unwrap());

        let saved = client.update_record(&updated).await.unwrap();
        assert!(saved.entry_exists(HAS_RELATED, Some(&json!("y"))).unwrap());
        assert!(!saved.entry_exists(HAS_RELATED, Some(&json!("x"))).unwrap());
    }

    #[tokio::test]
    async fn test_get_all_records_forces_fresh_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pit/known-pid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"pid": "21.T11148/one", "created": "2025-01-01T00:00:00Z"},
                {"pid": "21.T11148/two"}
            ])))
            .mount(&server)
            .await;

        let fetcher = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new(&server.uri(), fetcher.clone()).unwrap();
        let records = client.get_all_records().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pid(), "21.T11148/one");
        assert_eq!(records[1].pid(), "21.T11148/two");

        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1, "known records must bypass the cache");
        assert_eq!(calls[0].0[0], client.record_url("21.T11148/one"));
    }

    #[tokio::test]
    async fn test_get_all_records_with_no_known_pids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pit/known-pid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let fetcher = Arc::new(RecordingFetcher::default());
        let client = TpmClient::new(&server.uri(), fetcher.clone()).unwrap();
        assert!(client.get_all_records().await.unwrap().is_empty());
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }
}
