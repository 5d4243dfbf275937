//! Router HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;

use ingest_router_model::{IngestError, IngestOperation};

use crate::body::IngestResponseBody;
use crate::dispatch::{IngestHandler, dispatch_operation};
use crate::response::{CONTENT_TYPE, REQUEST_ID_HEADER, error_to_response};
use crate::router::resolve_operation;

/// Configuration for the router HTTP service.
#[derive(Debug, Clone)]
pub struct IngestHttpConfig {
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for IngestHttpConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Hyper `Service` implementation for the router.
///
/// Wraps an [`IngestHandler`] implementation and routes incoming HTTP
/// requests to the matching operation.
#[derive(Debug)]
pub struct IngestHttpService<H: IngestHandler> {
    handler: Arc<H>,
    config: Arc<IngestHttpConfig>,
}

impl<H: IngestHandler> IngestHttpService<H> {
    /// Create a new `IngestHttpService`.
    pub fn new(handler: Arc<H>, config: IngestHttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }
}

impl<H: IngestHandler> Clone for IngestHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: IngestHandler> hyper::service::Service<http::Request<Incoming>> for IngestHttpService<H> {
    type Response = http::Response<IngestResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let config = Arc::clone(&self.config);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let response = process_request(req, handler.as_ref(), &config, &request_id).await;
            let response = add_common_headers(response, &request_id);
            Ok(response)
        })
    }
}

/// Process a single HTTP request through the full pipeline.
async fn process_request<H: IngestHandler>(
    req: http::Request<Incoming>,
    handler: &H,
    config: &IngestHttpConfig,
    request_id: &str,
) -> http::Response<IngestResponseBody> {
    let (parts, incoming) = req.into_parts();

    // 1. Route on method and path.
    let op = match resolve_operation(&parts.method, parts.uri.path()) {
        Ok(op) => op,
        Err(err) => {
            tracing::debug!(method = %parts.method, path = %parts.uri.path(), %request_id, "no route");
            return error_to_response(&err, request_id);
        }
    };

    // 2. Collect body. Queries arrive as a JSON object of their parameters.
    let body = match op {
        IngestOperation::Health => Bytes::new(),
        IngestOperation::ListDeadLetters => query_to_json(parts.uri.query()),
        IngestOperation::IngestEvents | IngestOperation::Replay => {
            match collect_body(incoming, config.max_body_bytes).await {
                Ok(body) => body,
                Err(err) => return error_to_response(&err, request_id),
            }
        }
    };

    // 3. Dispatch to handler.
    let head_only = parts.method == http::Method::HEAD;
    match dispatch_operation(handler, op, body).await {
        Ok(response) if head_only => response.map(|_| IngestResponseBody::empty()),
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(operation = %op, code = %err.code, %request_id, message = %err.message, "request failed");
            error_to_response(&err, request_id)
        }
    }
}

/// Collect the incoming body into a single `Bytes` buffer.
async fn collect_body(incoming: Incoming, limit: usize) -> Result<Bytes, IngestError> {
    Limited::new(incoming, limit)
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                let mut err =
                    IngestError::validation(format!("request body exceeds {limit} bytes"));
                err.status_code = http::StatusCode::PAYLOAD_TOO_LARGE;
                err
            } else {
                IngestError::internal_error(format!("Failed to read request body: {e}"))
            }
        })
}

/// Decode a form-encoded query string into a JSON object of strings.
///
/// A repeated parameter keeps its last value.
fn query_to_json(query: Option<&str>) -> Bytes {
    let params: serde_json::Map<String, serde_json::Value> =
        form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .map(|(name, value)| (name.into_owned(), serde_json::Value::String(value.into_owned())))
            .collect();
    Bytes::from(serde_json::Value::Object(params).to_string())
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: http::Response<IngestResponseBody>,
    request_id: &str,
) -> http::Response<IngestResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry(REQUEST_ID_HEADER).or_insert(hv);
    }

    headers
        .entry("content-type")
        .or_insert(http::HeaderValue::from_static(CONTENT_TYPE));

    headers.insert("server", http::HeaderValue::from_static("ingest-router"));

    response
}

#[cfg(test)]
mod tests {
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder as ConnBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::dispatch::HandlerFuture;
    use crate::response::json_response;

    /// Echoes the operation name and the body it received.
    struct EchoHandler;

    impl IngestHandler for EchoHandler {
        fn handle_operation(&self, op: IngestOperation, body: Bytes) -> HandlerFuture {
            Box::pin(async move {
                if body.as_ref() == b"fail" {
                    return Err(IngestError::serialization("cannot decode"));
                }
                let json = serde_json::json!({
                    "op": op.as_str(),
                    "len": body.len(),
                    "body": String::from_utf8_lossy(&body),
                });
                Ok(json_response(serde_json::to_vec(&json).unwrap_or_default()))
            })
        }
    }

    async fn roundtrip(config: IngestHttpConfig, raw_request: String) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = IngestHttpService::new(Arc::new(EchoHandler), config);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = ConnBuilder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw_request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_should_dispatch_events_with_body() {
        let response = roundtrip(IngestHttpConfig::default(), post("/events", "{\"a\":1}")).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("server: ingest-router"));
        assert!(response.contains(REQUEST_ID_HEADER));
        assert!(response.contains(r#""op":"IngestEvents""#));
        assert!(response.contains(r#""len":7"#));
    }

    #[tokio::test]
    async fn test_should_pass_query_parameters_as_json() {
        let request = "GET /dead-letters?eventId=REQ1%3A0055&x=a+b HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n";
        let response = roundtrip(IngestHttpConfig::default(), request.to_owned()).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains(r#""op":"ListDeadLetters""#));
        assert!(response.contains(r#"\"eventId\":\"REQ1:0055\""#), "{response}");
        assert!(response.contains(r#"\"x\":\"a b\""#), "{response}");
    }

    #[test]
    fn test_should_decode_missing_query_as_empty_object() {
        assert_eq!(&query_to_json(None)[..], b"{}");
        assert_eq!(&query_to_json(Some("eventId="))[..], br#"{"eventId":""}"#);
    }

    #[tokio::test]
    async fn test_should_map_handler_error_to_400() {
        let response = roundtrip(IngestHttpConfig::default(), post("/replay", "fail")).await;
        assert!(response.starts_with("HTTP/1.1 400"), "{response}");
        assert!(response.contains("SerializationException"));
    }

    #[tokio::test]
    async fn test_should_return_404_for_unknown_path() {
        let response = roundtrip(IngestHttpConfig::default(), post("/nope", "")).await;
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    }

    #[tokio::test]
    async fn test_should_reject_oversized_body() {
        let config = IngestHttpConfig { max_body_bytes: 4 };
        let response = roundtrip(config, post("/events", "0123456789")).await;
        assert!(response.starts_with("HTTP/1.1 413"), "{response}");
    }
}
