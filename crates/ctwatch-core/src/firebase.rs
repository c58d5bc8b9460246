use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::store::{
    apply_patch, apply_put, split_path, validate_path, DeliveryGate, RealtimeStore, StoreError,
    Subscription, UpdateFn,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.line(line) {
                out.push(event);
            }
        }

        out
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                return None;
            }
            return Some(SseEvent {
                event: self.event.take().unwrap_or_else(|| "message".to_string()),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Put { path: String, data: Value },
    Patch { path: String, data: Value },
    KeepAlive,
    Cancel(String),
    AuthRevoked(String),
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    #[serde(default)]
    data: Value,
}

impl StreamEvent {
    pub fn parse(event: &SseEvent) -> Result<Option<Self>, StoreError> {
        let parsed = match event.event.as_str() {
            "put" => {
                let body: PathData = serde_json::from_str(&event.data)?;
                StreamEvent::Put {
                    path: body.path,
                    data: body.data,
                }
            }
            "patch" => {
                let body: PathData = serde_json::from_str(&event.data)?;
                StreamEvent::Patch {
                    path: body.path,
                    data: body.data,
                }
            }
            "keep-alive" => StreamEvent::KeepAlive,
            "cancel" => StreamEvent::Cancel(reason(&event.data)),
            "auth_revoked" => StreamEvent::AuthRevoked(reason(&event.data)),
            other => {
                debug!(event = other, "ignoring unknown stream event");
                return Ok(None);
            }
        };
        Ok(Some(parsed))
    }
}

fn reason(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(s)) => s,
        Ok(Value::Null) => "no reason given".to_string(),
        _ if data.trim().is_empty() => "no reason given".to_string(),
        _ => data.to_string(),
    }
}

pub fn apply_stream_event(mirror: &mut Value, event: StreamEvent) -> Result<bool, StoreError> {
    match event {
        StreamEvent::Put { path, data } => {
            apply_put(mirror, &path, data);
            Ok(true)
        }
        StreamEvent::Patch { path, data } => {
            apply_patch(mirror, &path, data);
            Ok(true)
        }
        StreamEvent::KeepAlive => Ok(false),
        StreamEvent::Cancel(reason) => Err(StoreError::Revoked(reason)),
        StreamEvent::AuthRevoked(reason) => Err(StoreError::Revoked(format!("auth revoked: {reason}"))),
    }
}

pub struct FirebaseStore {
    client: Client,
    config: StoreConfig,
}

impl FirebaseStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        // No overall timeout on the client: event streams stay open indefinitely.
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}.json",
            self.config.database_url.trim_end_matches('/'),
            split_path(path).join("/")
        )
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    fn rest(&self, request: RequestBuilder) -> RequestBuilder {
        self.with_auth(request).timeout(self.config.request_timeout)
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn stream_subtree(
    request: RequestBuilder,
    gate: DeliveryGate,
    on_update: UpdateFn,
) -> Result<(), StoreError> {
    let response = check_status(request.header(ACCEPT, "text/event-stream").send().await?).await?;
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut mirror = Value::Null;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for raw in decoder.feed(&chunk) {
            let Some(event) = StreamEvent::parse(&raw)? else {
                continue;
            };
            if !apply_stream_event(&mut mirror, event)? {
                continue;
            }
            if !gate.deliver(&on_update, mirror.clone()) {
                return Ok(());
            }
        }
    }

    Ok(())
}

#[async_trait]
impl RealtimeStore for FirebaseStore {
    fn subscribe(&self, path: &str, on_update: UpdateFn) -> Subscription {
        let gate = DeliveryGate::default();
        let request = self.with_auth(self.client.get(self.url(path)));
        let task_gate = gate.clone();
        let task_path = path.to_string();

        let task = tokio::spawn(async move {
            match stream_subtree(request, task_gate, on_update).await {
                Ok(()) => info!(path = %task_path, "event stream ended"),
                Err(err) => warn!(path = %task_path, %err, "event stream failed"),
            }
        });

        debug!(%path, "event stream opened");
        Subscription::new(path, gate, Some(task))
    }

    async fn get(&self, path: &str) -> Result<Value, StoreError> {
        validate_path(path)?;
        let response = check_status(self.rest(self.client.get(self.url(path))).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn get_shallow(&self, path: &str) -> Result<Vec<String>, StoreError> {
        validate_path(path)?;
        let request = self
            .rest(self.client.get(self.url(path)))
            .query(&[("shallow", "true")]);
        let response = check_status(request.send().await?).await?;
        let value: Value = response.json().await?;
        let mut keys: Vec<String> = match value {
            Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
            _ => Vec::new(),
        };
        keys.sort();
        Ok(keys)
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        validate_path(path)?;
        let request = self.rest(self.client.post(self.url(path))).json(&value);
        let response = check_status(request.send().await?).await?;

        #[derive(Deserialize)]
        struct PushResponse {
            name: String,
        }

        let pushed: PushResponse = response.json().await?;
        Ok(pushed.name)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        validate_path(path)?;
        let request = self.rest(self.client.put(self.url(path))).json(&value);
        check_status(request.send().await?).await?;
        Ok(())
    }
}
