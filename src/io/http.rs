use std::convert::Infallible;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use reqwest::blocking::Client;
use tracing::{debug, warn};

use super::{Actions, RangeTarget, RemoteClient, TransferCallback, TransferNotify};
use crate::Config;

/// [`RemoteClient`] over HTTP Range requests.
///
/// Paths are full URLs. Every read is an independent ranged `GET`, so no raw
/// handle is ever opened. Received chunk sizes are pushed to an optional
/// transfer callback.
pub struct HttpClient {
    client: Client,
    transferred_bytes: u64,
    max_retry: u32,
    callback: Option<TransferCallback>,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self {
            client,
            transferred_bytes: 0,
            max_retry: config.max_retry.max(1),
            callback: None,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn on_transfer(mut self, callback: TransferCallback) -> Self {
        self.callback = Some(callback);
        self
    }
}

impl RemoteClient for HttpClient {
    type Handle = Infallible;

    /// Sends a `HEAD` request to verify Range support and get the size.
    fn size(&mut self, url: &str) -> Result<u64> {
        let resp = self.client.head(url).send()?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            bail!("Remote server does not support Range requests");
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        debug!(url, size, "probed remote object");
        Ok(size)
    }

    fn supported_actions(&self) -> Actions {
        Actions::NONE
    }

    fn open(&mut self, url: &str) -> Result<Infallible> {
        bail!("HTTP client cannot open raw handles ({url})")
    }

    fn get_range(
        &mut self,
        target: RangeTarget<'_, Infallible>,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize> {
        let url = match target {
            RangeTarget::Path(url) => url,
            RangeTarget::Handle(handle) => match *handle {},
        };

        if buf.is_empty() {
            return Ok(0);
        }

        let end = offset + buf.len() as u64 - 1;
        let expected_size = buf.len();

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            let result = self.client.get(url).header("Range", &range).send();

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let bytes = resp.bytes()?;
                    if bytes.is_empty() {
                        // Server has nothing more past this point.
                        break;
                    }
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes += chunk_len as u64;
                    if let Some(callback) = self.callback.as_mut() {
                        callback(chunk_len as u64);
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    warn!(
                        retry = retry_count,
                        max = self.max_retry,
                        error = %e,
                        "connection error, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }

    fn close(&mut self, handle: Infallible) -> Result<()> {
        match handle {}
    }

    fn transfer_notify(&mut self) -> Option<&mut dyn TransferNotify> {
        Some(self as &mut dyn TransferNotify)
    }
}

impl TransferNotify for HttpClient {
    fn take_transfer_callback(&mut self) -> Option<TransferCallback> {
        self.callback.take()
    }

    fn set_transfer_callback(&mut self, callback: Option<TransferCallback>) {
        self.callback = callback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_no_raw_read() {
        let client = HttpClient::new(&Config::default()).unwrap();
        assert!(!client.supported_actions().contains(Actions::RAW_READ));
        assert_eq!(client.transferred_bytes(), 0);
    }

    #[test]
    fn transfer_callback_round_trips() {
        let mut client = HttpClient::new(&Config::default())
            .unwrap()
            .on_transfer(Box::new(|_| {}));

        let notify = client.transfer_notify().unwrap();
        let callback = notify.take_transfer_callback();
        assert!(callback.is_some());
        assert!(notify.take_transfer_callback().is_none());
        notify.set_transfer_callback(callback);
        assert!(client.callback.is_some());
    }
}
