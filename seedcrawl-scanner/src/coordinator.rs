use crate::config::CrawlConfig;
use crate::fetch::Fetcher;
use crate::task::{CompletionGuard, CrawlTask};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Unique links found across all seed pages
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveredSet {
    links: HashSet<String>,
}

impl DiscoveredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the link was already present
    pub fn insert(&mut self, link: String) -> bool {
        self.links.insert(link)
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(String::as_str)
    }

    /// Links in lexicographic order
    pub fn sorted(&self) -> Vec<&str> {
        let mut links: Vec<&str> = self.iter().collect();
        links.sort_unstable();
        links
    }
}

/// Spawns one [`CrawlTask`] per seed and merges what they publish.
///
/// The coordinator is the only owner of the [`DiscoveredSet`]; tasks reach it
/// solely through the link channel, so no lock guards the set.
pub struct Coordinator<F> {
    fetcher: Arc<F>,
    config: CrawlConfig,
}

impl<F: Fetcher> Coordinator<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, CrawlConfig::default())
    }

    pub fn with_config(fetcher: F, config: CrawlConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl every seed and return once each task has signalled completion
    pub async fn run(&self, seeds: Vec<String>) -> DiscoveredSet {
        let spawned = seeds.len();
        info!("Starting crawl of {} seed URLs", spawned);

        let mut discovered = DiscoveredSet::new();
        let (link_tx, mut link_rx) = mpsc::channel(self.config.link_capacity.max(1));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        for seed in seeds {
            let task = CrawlTask::new(
                seed,
                self.fetcher.clone(),
                link_tx.clone(),
                CompletionGuard::new(done_tx.clone()),
            );
            debug!("Spawning crawl task for {}", task.seed());
            tokio::spawn(task.run());
        }
        drop(link_tx);
        drop(done_tx);

        let mut completed = 0;
        while completed < spawned {
            tokio::select! {
                Some(link) = link_rx.recv() => {
                    discovered.insert(link);
                }
                Some(()) = done_rx.recv() => {
                    completed += 1;
                    debug!("{}/{} crawl tasks finished", completed, spawned);
                }
                else => {
                    warn!("Channels closed after {}/{} completions", completed, spawned);
                    break;
                }
            }
        }

        // Tasks publish before they signal, so anything still buffered was
        // sent during the run. Closing first means nothing new can arrive.
        link_rx.close();
        while let Ok(link) = link_rx.try_recv() {
            discovered.insert(link);
        }

        info!(
            "Crawl complete. {} unique links from {} seeds",
            discovered.len(),
            spawned
        );
        discovered
    }
}
