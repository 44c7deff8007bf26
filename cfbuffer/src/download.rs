//! Upstream fetch task feeding a [`SharedBuffer`].

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::buffer::SharedBuffer;
use crate::error::BufferError;

/// Starts downloading `url` into a fresh [`SharedBuffer`].
///
/// The fetch runs as a background task; the returned buffer can be read
/// immediately. Completion, HTTP failures, and mid-stream network failures
/// are all recorded on the buffer, so every reader terminates
/// deterministically.
pub fn stream_url(url: impl Into<String>) -> SharedBuffer {
    stream_url_with_client(reqwest::Client::new(), url)
}

/// Same as [`stream_url`], reusing an existing HTTP client.
pub fn stream_url_with_client(client: reqwest::Client, url: impl Into<String>) -> SharedBuffer {
    let url = url.into();
    let buffer = SharedBuffer::new();

    let feed = buffer.clone();
    tokio::spawn(async move {
        if let Err(error) = fetch_into(&client, &url, &feed).await {
            warn!(%url, %error, "upstream fetch failed");
        }
    });

    buffer
}

async fn fetch_into(
    client: &reqwest::Client,
    url: &str,
    buffer: &SharedBuffer,
) -> Result<(), BufferError> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            let error = BufferError::Upstream(e.to_string());
            buffer.fail(error.clone()).await;
            return Err(error);
        }
    };

    let status = response.status();
    if !status.is_success() {
        let error = BufferError::HttpStatus(status.as_u16());
        buffer.fail(error.clone()).await;
        return Err(error);
    }

    if let Some(len) = response.content_length() {
        buffer.set_expected_bytes(len).await;
    }

    debug!(%url, "upstream fetch started");

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => buffer.append(chunk).await,
            Err(e) => {
                let error = BufferError::Upstream(e.to_string());
                buffer.fail(error.clone()).await;
                return Err(error);
            }
        }
    }

    buffer.complete().await;
    let total_bytes = buffer.total_bytes().await;
    debug!(%url, total_bytes, "upstream fetch complete");
    Ok(())
}
