//! Response-body streaming with terminal logging.
//!
//! Upstream bodies are piped to the client chunk by chunk; nothing is
//! buffered, which is what keeps server-sent event streams live. The
//! wrapper owns the request's log tail: exactly one access line is written
//! when the body finishes, and dropping the wrapper (client went away)
//! both writes that line and drops the upstream response, aborting the
//! in-flight provider request.

use crate::core::access_log;
use bytes::Bytes;
use futures::stream::Stream;
use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

/// Everything needed to write the terminal access line.
pub struct ResponseTail {
    pub remote: IpAddr,
    pub method: String,
    pub path: String,
    pub model: String,
    pub status: u16,
    pub start: Instant,
}

impl ResponseTail {
    fn emit(self) {
        access_log::request(
            self.remote,
            &self.method,
            &self.path,
            &self.model,
            self.status,
            self.start.elapsed().as_millis(),
        );
    }

    fn emit_error(self, message: &str) {
        access_log::error(self.remote, &self.method, &self.path, message);
    }
}

type UpstreamBytes = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// An upstream byte stream that logs once on termination.
pub struct TailLoggedStream {
    stream: UpstreamBytes,
    tail: Option<ResponseTail>,
}

impl TailLoggedStream {
    pub fn new(
        stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
        tail: ResponseTail,
    ) -> Self {
        Self {
            stream: Box::pin(stream),
            tail: Some(tail),
        }
    }
}

impl Stream for TailLoggedStream {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.stream.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                if let Some(tail) = self.tail.take() {
                    tail.emit();
                }
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                // Mid-stream upstream failure. Headers are long gone, so the
                // status cannot be rewritten; close the body and log.
                if let Some(tail) = self.tail.take() {
                    let message = if e.is_timeout() {
                        "upstream stream timed out"
                    } else {
                        "upstream stream failed"
                    };
                    tail.emit_error(message);
                }
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl Drop for TailLoggedStream {
    fn drop(&mut self) {
        // Client disconnected (or the stream was never fully polled). The
        // inner reqwest stream is dropped with us, cancelling the upstream
        // request so the provider stops generating billable tokens.
        if let Some(tail) = self.tail.take() {
            tail.emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn tail() -> ResponseTail {
        ResponseTail {
            remote: "127.0.0.1".parse().unwrap(),
            method: "POST".to_string(),
            path: "/openai/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            status: 200,
            start: Instant::now(),
        }
    }

    #[tokio::test]
    async fn passes_chunks_through_in_order() {
        let chunks = vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Ok(Bytes::from_static(b"data: two\n\n")),
        ];
        let mut stream = TailLoggedStream::new(futures::stream::iter(chunks), tail());

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            Bytes::from_static(b"data: one\n\n")
        );
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            Bytes::from_static(b"data: two\n\n")
        );
        assert!(stream.next().await.is_none());
        // Tail consumed at end-of-stream, so drop must not log twice.
        assert!(stream.tail.is_none());
    }

    #[tokio::test]
    async fn drop_before_completion_consumes_tail() {
        let chunks = vec![Ok(Bytes::from_static(b"data: one\n\n"))];
        let stream = TailLoggedStream::new(futures::stream::iter(chunks), tail());
        // Dropped unpolled, as when the client disconnects immediately.
        drop(stream);
    }
}
