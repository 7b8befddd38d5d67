// Newline-delimited JSON streaming utilities
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;

/// Create a chunked NDJSON streaming response, one JSON document per item
pub fn ndjson_stream<S, T>(stream: S) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let byte_stream = stream.map(|item| serialize_line(&item));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize one item followed by '\n'
pub fn serialize_line<T: Serialize>(item: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(item)?;
    let mut line = BytesMut::with_capacity(json.len() + 1);
    line.put_slice(&json);
    line.put_u8(b'\n');
    Ok(line.freeze())
}

/// Helper to stream an initial value followed by every broadcast update,
/// mapped through `render`. Lagging receivers skip what they missed.
pub fn stream_from_broadcast<U, T, F>(
    initial: T,
    mut rx: broadcast::Receiver<U>,
    render: F,
) -> impl IntoResponse
where
    U: Clone + Send + 'static,
    T: Serialize + Send + 'static,
    F: Fn(U) -> T + Send + 'static,
{
    let stream = async_stream::stream! {
        yield initial;
        loop {
            match rx.recv().await {
                Ok(update) => {
                    yield render(update);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Stream subscriber skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    match ndjson_stream(stream) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
