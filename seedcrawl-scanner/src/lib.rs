pub mod config;
pub mod coordinator;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod task;
pub mod token;

pub use config::CrawlConfig;
pub use coordinator::{Coordinator, DiscoveredSet};
pub use error::ScanError;
pub use extractor::{Links, extract};
pub use fetch::{ByteStream, Fetcher, HttpFetcher};
pub use task::{CompletionGuard, CrawlTask, LinkSink};
pub use token::{Attribute, HtmlTokenizer, Tag, Token, Tokenize};
