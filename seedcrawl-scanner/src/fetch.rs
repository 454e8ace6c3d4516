use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use futures::TryStreamExt;
use reqwest::Client;
use std::future::Future;
use std::io::{self, Read};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::debug;
use url::Url;

/// Blocking reader over a response body. Dropping it releases the
/// underlying connection.
pub type ByteStream = Box<dyn Read + Send>;

/// Source of page bodies for the crawl tasks
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<ByteStream>> + Send;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .connect_timeout(config.timeout / 2)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    /// Non-2xx responses are still handed back; whatever body the server
    /// sent is scanned like any other page.
    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        let parsed =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("Fetching {}", parsed);
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("{} answered {}, scanning body anyway", url, status);
        }

        let body = response.bytes_stream().map_err(io::Error::other);
        let reader = SyncIoBridge::new(StreamReader::new(Box::pin(body)));
        Ok(Box::new(reader))
    }
}
