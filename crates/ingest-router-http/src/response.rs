//! JSON response serialization and error formatting.

use ingest_router_model::IngestError;

use crate::body::IngestResponseBody;

/// Content type for router JSON responses.
pub const CONTENT_TYPE: &str = "application/json";

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Serialize an error into a JSON response body.
///
/// ```json
/// {
///   "__type": "SerializationException",
///   "message": "expected value at line 1 column 1"
/// }
/// ```
#[must_use]
pub fn error_to_json(error: &IngestError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "__type": error.code.as_str(),
        "message": error.message,
    }))
    .expect("JSON serialization of error cannot fail")
}

/// Convert an `IngestError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(
    error: &IngestError,
    request_id: &str,
) -> http::Response<IngestResponseBody> {
    let body = IngestResponseBody::from_json(error_to_json(error));

    http::Response::builder()
        .status(error.status_code)
        .header("content-type", CONTENT_TYPE)
        .header(REQUEST_ID_HEADER, request_id)
        .body(body)
        .expect("valid error response")
}

/// Build a 200 response from JSON bytes.
#[must_use]
pub fn json_response(json: Vec<u8>) -> http::Response<IngestResponseBody> {
    json_response_with_status(http::StatusCode::OK, json)
}

/// Build a response with `status` from JSON bytes.
#[must_use]
pub fn json_response_with_status(
    status: http::StatusCode,
    json: Vec<u8>,
) -> http::Response<IngestResponseBody> {
    http::Response::builder()
        .status(status)
        .header("content-type", CONTENT_TYPE)
        .body(IngestResponseBody::from_json(json))
        .expect("valid JSON response")
}
