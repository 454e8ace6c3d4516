use std::time::Duration;

/// Default number of links that may sit in the link channel before
/// publishers block.
pub const DEFAULT_LINK_CAPACITY: usize = 64;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Settings shared by the coordinator and the HTTP fetcher
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub link_capacity: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self {
            link_capacity: DEFAULT_LINK_CAPACITY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("seedcrawl/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// A zero capacity is bumped to one; tokio channels need room for at
    /// least a single message.
    pub fn with_link_capacity(mut self, capacity: usize) -> Self {
        self.link_capacity = capacity.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::default();
        assert_eq!(config.link_capacity, DEFAULT_LINK_CAPACITY);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_redirects, 5);
        assert!(config.user_agent.starts_with("seedcrawl/"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = CrawlConfig::new().with_link_capacity(0);
        assert_eq!(config.link_capacity, 1);
    }

    #[test]
    fn test_builder_chain() {
        let config = CrawlConfig::new()
            .with_link_capacity(8)
            .with_timeout(Duration::from_secs(3))
            .with_user_agent("probe/1.0")
            .with_max_redirects(0);

        assert_eq!(config.link_capacity, 8);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "probe/1.0");
        assert_eq!(config.max_redirects, 0);
    }
}
