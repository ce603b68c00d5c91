//! HTTP response body shapes.
//!
//! A mock response body comes in exactly two shapes: a buffered chunk of
//! bytes (stub bodies, management envelopes, proxied upstream payloads) or a
//! body file streamed from disk at send time. `MockBody` is the closed enum
//! over those two, so large file fixtures never have to be resident in
//! memory while everything else stays a plain buffer.
//!
//! # Examples
//!
//! ```rust
//! use phiremock::body::MockBody;
//! use bytes::Bytes;
//!
//! // Stub body from a string
//! let stub = MockBody::from("hi");
//!
//! // Proxied payload from bytes
//! let payload = MockBody::from(Bytes::from_static(b"binary"));
//!
//! // No content
//! let nothing = MockBody::empty();
//! ```

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::Stream;
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};
use tokio_util::io::ReaderStream;

use crate::types::BoxError;

/// Response body: either buffered bytes or a file streamed from disk.
pub struct MockBody(Inner);

enum Inner {
    Buffered(Full<Bytes>),
    File(ReaderStream<tokio::fs::File>),
}

impl MockBody {
    /// Creates an empty body with no content.
    pub fn empty() -> Self {
        Self(Inner::Buffered(Full::new(Bytes::new())))
    }

    /// Creates a body that streams the contents of an already opened file.
    ///
    /// This is how `bodyFileName` responses are served: the file is opened
    /// on demand when the expectation wins and its chunks flow through
    /// without buffering the whole file.
    pub fn file(file: tokio::fs::File) -> Self {
        Self(Inner::File(ReaderStream::new(file)))
    }
}

impl From<Bytes> for MockBody {
    fn from(buf: Bytes) -> Self {
        Self(Inner::Buffered(Full::new(buf)))
    }
}

impl From<&str> for MockBody {
    fn from(buf: &str) -> Self {
        Self::from(Bytes::from(buf.to_owned()))
    }
}

impl From<String> for MockBody {
    fn from(buf: String) -> Self {
        Self::from(Bytes::from(buf))
    }
}

impl From<Vec<u8>> for MockBody {
    fn from(buf: Vec<u8>) -> Self {
        Self::from(Bytes::from(buf))
    }
}

impl Body for MockBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.0 {
            Inner::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(|never| match never {}))),
            Inner::File(stream) => match Pin::new(stream).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
                Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err.into()))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.0 {
            Inner::Buffered(full) => full.size_hint(),
            // File length is unknown until the stream is drained.
            Inner::File(_) => SizeHint::default(),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.0 {
            Inner::Buffered(full) => full.is_end_stream(),
            Inner::File(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn empty_body_ends_immediately() {
        let body = MockBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[tokio::test]
    async fn buffered_body_yields_its_bytes() {
        let body = MockBody::from("stub");
        assert_eq!(body.size_hint().exact(), Some(4));
        let bytes = BodyExt::collect(body).await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"stub");
    }

    #[tokio::test]
    async fn file_body_streams_the_file_contents() {
        let mut fixture = tempfile::NamedTempFile::new().unwrap();
        write!(fixture, "streamed from disk").unwrap();

        let file = tokio::fs::File::open(fixture.path()).await.unwrap();
        let body = MockBody::file(file);
        assert!(!body.is_end_stream());
        let bytes = BodyExt::collect(body).await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"streamed from disk");
    }
}
