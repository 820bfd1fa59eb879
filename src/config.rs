use std::time::Duration;

/// Transfer unit used by the remote adapter and the extraction copy loop.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Compression applied to file entries written by [`compress`](crate::compress).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

/// Tunables shared by every top-level operation.
///
/// ```
/// use arcstream::Config;
///
/// let config = Config::default().chunk_size(64 * 1024).max_retry(3);
/// assert_eq!(config.chunk_size, 64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub chunk_size: usize,
    pub http_timeout: Duration,
    pub max_retry: u32,
    /// Minimum fraction of a file written between two writer progress callbacks.
    pub progress_threshold: f64,
    pub compression: Compression,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            http_timeout: Duration::from_secs(30),
            max_retry: 10,
            progress_threshold: 0.001,
            compression: Compression::default(),
        }
    }
}

impl Config {
    /// Zero is clamped to one byte.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn max_retry(mut self, retries: u32) -> Self {
        self.max_retry = retries;
        self
    }

    pub fn progress_threshold(mut self, fraction: f64) -> Self {
        self.progress_threshold = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub(crate) fn transfer_unit(&self) -> usize {
        self.chunk_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_chunk_size_is_clamped() {
        let config = Config::default().chunk_size(0);
        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.transfer_unit(), 1);
    }

    #[test]
    fn defaults_match_transfer_size() {
        let config = Config::default();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.max_retry, 10);
        assert_eq!(config.compression, Compression::Deflated);
    }
}
