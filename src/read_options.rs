//! Options for reading a GGUF file.
//!
//! The reader lives outside this crate; it receives a finished
//! [`ReadOptions`].

/// Smallest buffer used for remote reads.
pub const MIN_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    debug: bool,
    skip_large_metadata: bool,
    mmap: bool,
    proxy_url: Option<String>,
    skip_proxy: bool,
    skip_tls_verification: bool,
    buffer_size: Option<usize>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn use_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Skip loading large metadata values such as the token list; only their
    /// length is kept.
    #[must_use]
    pub fn skip_large_metadata(mut self) -> Self {
        self.skip_large_metadata = true;
        self
    }

    /// Memory-map local files.
    #[must_use]
    pub fn use_mmap(mut self) -> Self {
        self.mmap = true;
        self
    }

    /// Route remote reads through `url`.
    #[must_use]
    pub fn use_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    /// Ignore proxies, including those from the environment.
    #[must_use]
    pub fn skip_proxy(mut self) -> Self {
        self.skip_proxy = true;
        self
    }

    #[must_use]
    pub fn skip_tls_verification(mut self) -> Self {
        self.skip_tls_verification = true;
        self
    }

    /// Buffer size for remote reads, raised to [`MIN_BUFFER_SIZE`] if smaller.
    #[must_use]
    pub fn use_buffer_size(mut self, size: usize) -> Self {
        if size < MIN_BUFFER_SIZE {
            log::debug!("buffer size {size} below minimum, using {MIN_BUFFER_SIZE}");
        }
        self.buffer_size = Some(size.max(MIN_BUFFER_SIZE));
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn skips_large_metadata(&self) -> bool {
        self.skip_large_metadata
    }

    pub fn uses_mmap(&self) -> bool {
        self.mmap
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn skips_proxy(&self) -> bool {
        self.skip_proxy
    }

    pub fn skips_tls_verification(&self) -> bool {
        self.skip_tls_verification
    }

    pub fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_floor() {
        assert_eq!(ReadOptions::new().use_buffer_size(1000).buffer_size(), Some(32768));
        assert_eq!(ReadOptions::new().use_buffer_size(0).buffer_size(), Some(MIN_BUFFER_SIZE));
        assert_eq!(
            ReadOptions::new().use_buffer_size(MIN_BUFFER_SIZE).buffer_size(),
            Some(MIN_BUFFER_SIZE)
        );
        assert_eq!(ReadOptions::new().use_buffer_size(100000).buffer_size(), Some(100000));
    }

    #[test]
    fn test_flags() {
        let o = ReadOptions::new()
            .use_debug()
            .skip_large_metadata()
            .use_mmap()
            .use_proxy("http://127.0.0.1:3128")
            .skip_tls_verification();
        assert!(o.is_debug());
        assert!(o.skips_large_metadata());
        assert!(o.uses_mmap());
        assert_eq!(o.proxy_url(), Some("http://127.0.0.1:3128"));
        assert!(!o.skips_proxy());
        assert!(o.skips_tls_verification());
        assert_eq!(o.buffer_size(), None);
    }

    #[test]
    fn test_skip_proxy() {
        assert!(ReadOptions::new().skip_proxy().skips_proxy());
    }
}
