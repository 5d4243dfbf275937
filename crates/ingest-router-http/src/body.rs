//! Response bodies.
//!
//! Every router reply carries one buffered JSON document, except replies to
//! `HEAD`, which carry nothing.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;

/// Body of a router HTTP response.
#[derive(Debug, Default)]
pub struct IngestResponseBody {
    json: Option<Full<Bytes>>,
}

impl IngestResponseBody {
    /// A body holding a serialized JSON document.
    #[must_use]
    pub fn from_json(json: Vec<u8>) -> Self {
        Self {
            json: Some(Full::new(Bytes::from(json))),
        }
    }

    /// A body with no content.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Body for IngestResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut().json.as_mut() {
            Some(json) => Pin::new(json).poll_frame(cx).map_err(|never| match never {}),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.json.as_ref().is_none_or(|json| json.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        self.json
            .as_ref()
            .map_or_else(|| SizeHint::with_exact(0), |json| json.size_hint())
    }
}
