//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ingest_router_model::{DeadLetterRecord, DispatchError, IngestionEvent};

use crate::backend::{FastPathInvoker, InvocationRequest, JobSubmitter, WorkflowStarter};
use crate::clock::Clock;
use crate::dead_letter::DeadLetterSink;
use crate::error::{RouterError, RouterResult};
use crate::params::DispatchParams;

/// Clock that only moves when told to.
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Fixed reference instant used across tests.
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Backend that replays a script of results, then succeeds.
///
/// Implements all three backend traits so one double serves every kind.
#[derive(Debug, Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, DispatchError>>>,
    fallback: Option<DispatchError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<InvocationRequest>>,
    on_call: Option<Arc<ManualClock>>,
}

impl ScriptedBackend {
    pub(crate) fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing_times(times: usize, error: DispatchError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new((0..times).map(|_| Err(error.clone())).collect()),
            ..Self::default()
        })
    }

    pub(crate) fn always_failing(error: DispatchError) -> Arc<Self> {
        Arc::new(Self {
            fallback: Some(error),
            ..Self::default()
        })
    }

    pub(crate) fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Fails with `error` and advances `clock` by two hours on every call.
    pub(crate) fn aging(clock: Arc<ManualClock>, error: DispatchError) -> Arc<Self> {
        Arc::new(Self {
            fallback: Some(error),
            on_call: Some(clock),
            ..Self::default()
        })
    }

    pub(crate) fn calls(&self) -> Vec<InvocationRequest> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn next(&self, request: &InvocationRequest) -> Result<String, DispatchError> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(request.clone());
            calls.len()
        };
        if let Some(clock) = &self.on_call {
            clock.advance(chrono::Duration::hours(2));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(result) => result,
            None => match &self.fallback {
                Some(err) => Err(err.clone()),
                None => Ok(format!("handle-{n}")),
            },
        }
    }
}

#[async_trait]
impl FastPathInvoker for ScriptedBackend {
    async fn invoke(&self, request: &InvocationRequest) -> Result<(), DispatchError> {
        self.next(request).await.map(|_| ())
    }
}

#[async_trait]
impl WorkflowStarter for ScriptedBackend {
    async fn start(&self, request: &InvocationRequest) -> Result<String, DispatchError> {
        self.next(request).await
    }
}

#[async_trait]
impl JobSubmitter for ScriptedBackend {
    async fn submit(&self, request: &InvocationRequest) -> Result<String, DispatchError> {
        self.next(request).await
    }
}

/// Dead-letter sink whose writes always fail.
#[derive(Debug)]
pub(crate) struct FailingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for FailingDeadLetterSink {
    async fn append(&self, _record: DeadLetterRecord) -> RouterResult<bool> {
        Err(RouterError::DeadLetter("disk full".into()))
    }

    async fn contains(&self, _event_id: &str, _rule_id: &str) -> bool {
        false
    }

    async fn for_event(&self, _event_id: &str) -> RouterResult<Vec<DeadLetterRecord>> {
        Err(RouterError::DeadLetter("disk full".into()))
    }
}

/// The `lz`/`lambda/orders.csv` event.
pub(crate) fn orders_event() -> IngestionEvent {
    IngestionEvent::new("lz", "lambda/orders.csv", 2048, t0(), "evt-1")
}

/// An invocation addressed to `target` for [`orders_event`].
pub(crate) fn invocation(target: &str) -> InvocationRequest {
    let mut parameters = DispatchParams::new();
    parameters.insert("bucket".into(), "lz".into());
    parameters.insert("key".into(), "lambda/orders.csv".into());
    InvocationRequest {
        target: target.to_owned(),
        bucket: "lz".into(),
        key: "lambda/orders.csv".into(),
        parameters,
        idempotency_key: "evt-1-rule-1".into(),
    }
}

/// Accept one HTTP request, answer with `status` and `body`, and hand back
/// the raw request text.
pub(crate) async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let body = body.to_owned();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request
    });
    (endpoint, handle)
}

/// An endpoint nothing listens on.
pub(crate) async fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// JSON body of a raw HTTP request.
pub(crate) fn json_body(raw: &str) -> serde_json::Value {
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if body.len() >= length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
