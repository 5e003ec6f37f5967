use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Reads a body to its end, collecting every data frame.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn new_trusted_length(body: B, content_length: usize) -> Self {
        Self {
            body,
            buf: Vec::with_capacity(content_length),
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
{
    type Output = Result<Vec<u8>, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            };
            let Ok(next_frame) = next_res else {
                return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame")));
            };
            // Trailers carry no payload
            if let Ok(mut data) = next_frame.into_data() {
                while data.has_remaining() {
                    let chunk = data.chunk();
                    let len = chunk.len();
                    slf.buf.extend_from_slice(chunk);
                    data.advance(len);
                }
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
        }
    }
}

pin_project! {
    /// Reads a body to its end without keeping it, resolving to the number of payload bytes seen.
    ///
    /// Used to hand a connection back to the pool once the response is no longer needed.
    pub struct DiscardBodyFuture<B: Body> {
        #[pin]
        body: B,
        read: usize,
    }
}

impl<B> DiscardBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn new(body: B) -> Self {
        Self { body, read: 0 }
    }
}

impl<B> Future for DiscardBodyFuture<B>
where
    B: Body,
{
    type Output = Result<usize, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(*slf.read));
            }
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(*slf.read));
            };
            let Ok(next_frame) = next_res else {
                return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame")));
            };
            if let Some(data) = next_frame.data_ref() {
                *slf.read += data.remaining();
            }
        }
    }
}
