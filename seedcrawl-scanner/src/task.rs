use crate::error::ScanError;
use crate::extractor::extract;
use crate::fetch::Fetcher;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Where crawl tasks publish the links they find
pub type LinkSink = mpsc::Sender<String>;

/// Sends the completion signal of one crawl task when dropped, so every way
/// out of the task (return, early return, panic) is counted exactly once.
pub struct CompletionGuard {
    done: mpsc::UnboundedSender<()>,
}

impl CompletionGuard {
    pub fn new(done: mpsc::UnboundedSender<()>) -> Self {
        Self { done }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // Nobody is counting any more if the receiver is gone
        let _ = self.done.send(());
    }
}

/// One independent unit of work: fetch a seed page and publish its links.
pub struct CrawlTask<F> {
    seed: String,
    fetcher: Arc<F>,
    links: LinkSink,
    completion: CompletionGuard,
}

impl<F: Fetcher> CrawlTask<F> {
    pub fn new(seed: String, fetcher: Arc<F>, links: LinkSink, completion: CompletionGuard) -> Self {
        Self {
            seed,
            fetcher,
            links,
            completion,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub async fn run(self) {
        let CrawlTask {
            seed,
            fetcher,
            links,
            completion,
        } = self;
        let _completion = completion;

        let body = match fetcher.fetch(&seed).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to crawl {}: {}", seed, e);
                return;
            }
        };

        // Tokenizing and blocking sends stay off the async workers
        let extraction = tokio::task::spawn_blocking(move || publish_links(body, &links));
        match extraction.await {
            Ok(published) => debug!("Published {} links from {}", published, seed),
            Err(e) => warn!("Link extraction for {} aborted: {}", seed, ScanError::from(e)),
        }
    }
}

/// Extract links from `body` and send each one to `links`, blocking while
/// the channel is full. Must run outside the async runtime's workers.
/// Returns the number of links sent; the body is dropped on return.
pub fn publish_links<R: Read>(body: R, links: &LinkSink) -> usize {
    let mut published = 0;
    for link in extract(body) {
        if links.blocking_send(link).is_err() {
            debug!("Link channel closed, stopping extraction");
            break;
        }
        published += 1;
    }
    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::fetch::ByteStream;
    use crate::fetch::testing::PageFetcher;
    use std::io::{self, Cursor};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn channels(
        capacity: usize,
    ) -> (
        LinkSink,
        mpsc::Receiver<String>,
        mpsc::UnboundedSender<()>,
        mpsc::UnboundedReceiver<()>,
    ) {
        let (link_tx, link_rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        (link_tx, link_rx, done_tx, done_rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(link) = rx.try_recv() {
            out.push(link);
        }
        out
    }

    fn count_done(rx: &mut mpsc::UnboundedReceiver<()>) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[test]
    fn test_guard_signals_on_drop() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        {
            let _guard = CompletionGuard::new(done_tx);
            assert!(done_rx.try_recv().is_err());
        }
        assert!(done_rx.try_recv().is_ok());
        assert!(done_rx.try_recv().is_err());
    }

    #[test]
    fn test_guard_tolerates_closed_receiver() {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        drop(done_rx);
        drop(CompletionGuard::new(done_tx));
    }

    #[tokio::test]
    async fn test_successful_task_publishes_then_completes() {
        let fetcher = PageFetcher::default().with_page(
            "http://seed.com/",
            r#"<a href="http://a.com/">a</a><a href="/rel">r</a><a href="https://b.com/">b</a>"#,
        );
        let (link_tx, mut link_rx, done_tx, mut done_rx) = channels(16);

        let task = CrawlTask::new(
            "http://seed.com/".to_string(),
            Arc::new(fetcher),
            link_tx,
            CompletionGuard::new(done_tx),
        );
        assert_eq!(task.seed(), "http://seed.com/");
        task.run().await;

        assert_eq!(
            drain(&mut link_rx),
            vec!["http://a.com/".to_string(), "https://b.com/".to_string()]
        );
        assert_eq!(count_done(&mut done_rx), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_still_completes() {
        let (link_tx, mut link_rx, done_tx, mut done_rx) = channels(16);

        CrawlTask::new(
            "http://unreachable.invalid/".to_string(),
            Arc::new(PageFetcher::default()),
            link_tx,
            CompletionGuard::new(done_tx),
        )
        .run()
        .await;

        assert!(drain(&mut link_rx).is_empty());
        assert_eq!(count_done(&mut done_rx), 1);
    }

    /// Body that panics on first read, tracking whether it got released
    struct Exploding {
        released: Arc<AtomicBool>,
    }

    impl Read for Exploding {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("tokenizer input blew up");
        }
    }

    impl Drop for Exploding {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct ExplodingFetcher {
        released: Arc<AtomicBool>,
    }

    impl Fetcher for ExplodingFetcher {
        async fn fetch(&self, _url: &str) -> Result<ByteStream> {
            Ok(Box::new(Exploding {
                released: self.released.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_panicking_extraction_still_completes() {
        let released = Arc::new(AtomicBool::new(false));
        let (link_tx, _link_rx, done_tx, mut done_rx) = channels(16);

        CrawlTask::new(
            "http://boom.com/".to_string(),
            Arc::new(ExplodingFetcher {
                released: released.clone(),
            }),
            link_tx,
            CompletionGuard::new(done_tx),
        )
        .run()
        .await;

        assert!(released.load(Ordering::SeqCst));
        assert_eq!(count_done(&mut done_rx), 1);
    }

    #[tokio::test]
    async fn test_one_signal_per_task() {
        let fetcher = Arc::new(
            PageFetcher::default()
                .with_page("http://a.com/", r#"<a href="http://x.com/"></a>"#)
                .with_page("http://b.com/", ""),
        );
        let seeds = ["http://a.com/", "http://b.com/", "http://c.com/", "bad seed", ""];
        let (link_tx, _link_rx, done_tx, mut done_rx) = channels(16);

        let handles: Vec<_> = seeds
            .iter()
            .map(|seed| {
                tokio::spawn(
                    CrawlTask::new(
                        seed.to_string(),
                        fetcher.clone(),
                        link_tx.clone(),
                        CompletionGuard::new(done_tx.clone()),
                    )
                    .run(),
                )
            })
            .collect();
        drop(done_tx);
        for handle in handles {
            handle.await.unwrap();
        }

        let mut signals = 0;
        while done_rx.recv().await.is_some() {
            signals += 1;
        }
        assert_eq!(signals, seeds.len());
    }

    #[test]
    fn test_publish_stops_when_receiver_is_gone() {
        let (link_tx, link_rx) = mpsc::channel(1);
        drop(link_rx);

        let published = publish_links(
            Cursor::new(r#"<a href="http://a.com/"></a><a href="http://b.com/"></a>"#),
            &link_tx,
        );
        assert_eq!(published, 0);
    }

    #[test]
    fn test_publish_blocks_until_drained() {
        let (link_tx, mut link_rx) = mpsc::channel(1);
        let mut html = String::new();
        for i in 0..100 {
            html.push_str(&format!("<a href=\"http://x.com/{}\"></a>", i));
        }

        let producer = std::thread::spawn(move || publish_links(Cursor::new(html), &link_tx));

        let mut received = Vec::new();
        while let Some(link) = link_rx.blocking_recv() {
            received.push(link);
        }

        assert_eq!(producer.join().unwrap(), 100);
        assert_eq!(received.len(), 100);
        assert_eq!(received[0], "http://x.com/0");
        assert_eq!(received[99], "http://x.com/99");
    }
}
