use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use url::Url;

use crate::error::CrawlError;
use crate::fetch::PageFetcher;
use crate::robots::RobotsPolicy;
use crate::sink::DocumentSink;

/// Default number of simultaneously in-flight fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Outcome counters for one crawl run.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub pages_stored: usize,
    pub pages_failed: usize,
    pub pages_skipped_robots: usize,
    pub total_urls: usize,
}

impl CrawlStats {
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            Some(end.duration_since(start))
        } else {
            None
        }
    }

    pub fn write_summary_to_stderr(&self) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();

        let _ = writeln!(handle, "\n=== Crawl Statistics ===");
        let _ = writeln!(handle, "Pages stored: {}", self.pages_stored);
        let _ = writeln!(handle, "Pages failed: {}", self.pages_failed);
        let _ = writeln!(
            handle,
            "Pages skipped (robots.txt): {}",
            self.pages_skipped_robots
        );
        let _ = writeln!(handle, "Total URLs: {}", self.total_urls);
        if let Some(duration) = self.duration() {
            let _ = writeln!(handle, "Total duration: {:.2}s", duration.as_secs_f64());
        }
        let _ = writeln!(handle, "========================\n");
    }
}

enum UnitOutcome {
    Stored,
    Failed,
    SkippedRobots,
}

/// Crawls `urls` concurrently, at most `max_concurrent` at a time.
///
/// The fetch session is started once, shared by every unit, and released
/// exactly once after all units finish, however they fared. Per-URL failures
/// are logged and counted without affecting sibling units; all units are
/// launched before any is awaited and there is no early exit.
pub async fn crawl_parallel(
    fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn DocumentSink>,
    robots: Arc<RobotsPolicy>,
    urls: Vec<String>,
    max_concurrent: usize,
) -> Result<CrawlStats, CrawlError> {
    let mut stats = CrawlStats {
        start_time: Some(Instant::now()),
        total_urls: urls.len(),
        ..Default::default()
    };
    tracing::info!(
        "Crawling {} URLs with a concurrency budget of {}",
        urls.len(),
        max_concurrent
    );

    fetcher.start().await?;

    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut handles = Vec::with_capacity(urls.len());
    for url in urls {
        let semaphore = Arc::clone(&semaphore);
        let fetcher = Arc::clone(&fetcher);
        let sink = Arc::clone(&sink);
        let robots = Arc::clone(&robots);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            process_url(&url, fetcher.as_ref(), sink.as_ref(), robots.as_ref()).await
        }));
    }

    for handle in handles {
        match handle.await {
            Ok(UnitOutcome::Stored) => stats.pages_stored += 1,
            Ok(UnitOutcome::Failed) => stats.pages_failed += 1,
            Ok(UnitOutcome::SkippedRobots) => stats.pages_skipped_robots += 1,
            Err(e) => {
                tracing::error!("Crawl unit aborted: {}", e);
                stats.pages_failed += 1;
            }
        }
    }

    // The session is released no matter how the units fared.
    if let Err(e) = fetcher.close().await {
        tracing::warn!("Failed to close crawl session: {}", e);
    }

    stats.end_time = Some(Instant::now());
    stats.write_summary_to_stderr();
    Ok(stats)
}

async fn process_url(
    raw_url: &str,
    fetcher: &dyn PageFetcher,
    sink: &dyn DocumentSink,
    robots: &RobotsPolicy,
) -> UnitOutcome {
    let url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(source) => {
            let e = CrawlError::InvalidUrl {
                url: raw_url.to_string(),
                source,
            };
            tracing::error!("Failed: {} - Error: {}", raw_url, e);
            return UnitOutcome::Failed;
        }
    };

    if !robots.allows(&url).await {
        tracing::warn!("Skipping URL disallowed by robots.txt: {}", url);
        return UnitOutcome::SkippedRobots;
    }

    match crawl_one(&url, fetcher, sink).await {
        Ok(()) => {
            tracing::info!("Successfully crawled: {}", url);
            UnitOutcome::Stored
        }
        Err(e) => {
            tracing::error!("Failed: {} - Error: {}", url, e);
            UnitOutcome::Failed
        }
    }
}

async fn crawl_one(
    url: &Url,
    fetcher: &dyn PageFetcher,
    sink: &dyn DocumentSink,
) -> Result<(), CrawlError> {
    let html = fetcher.fetch(url).await?;
    let markdown = to_markdown(&html)?;
    sink.store(url, &markdown).await
}

/// Converts fetched HTML into Markdown.
fn to_markdown(html: &str) -> Result<String, CrawlError> {
    htmd::convert(html).map_err(|e| CrawlError::Extract(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFetcher {
        delay: Duration,
        fail_marker: Option<&'static str>,
        panic_marker: Option<&'static str>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        started: AtomicUsize,
        closed: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                fail_marker: None,
                panic_marker: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                started: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_marker: Some(marker),
                ..Self::new(Duration::from_millis(5))
            }
        }

        fn panicking_on(marker: &'static str) -> Self {
            Self {
                panic_marker: Some(marker),
                ..Self::new(Duration::from_millis(5))
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn start(&self) -> Result<(), CrawlError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(marker) = self.panic_marker
                && url.as_str().contains(marker)
            {
                panic!("simulated fetch panic");
            }
            if let Some(marker) = self.fail_marker
                && url.as_str().contains(marker)
            {
                return Err(CrawlError::Extract("simulated fetch failure".to_string()));
            }
            Ok("<h1>Page</h1>".to_string())
        }

        async fn close(&self) -> Result<(), CrawlError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentSink for RecordingSink {
        async fn store(&self, url: &Url, _markdown: &str) -> Result<(), CrawlError> {
            self.stored.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("http://docs.example.com/page-{}", i))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_budget_is_respected() {
        let fetcher = Arc::new(FakeFetcher::new(Duration::from_millis(20)));
        let sink = Arc::new(RecordingSink::default());

        let stats = crawl_parallel(
            fetcher.clone(),
            sink.clone(),
            Arc::new(RobotsPolicy::Ignore),
            urls(5),
            2,
        )
        .await
        .unwrap();

        assert_eq!(stats.pages_stored, 5);
        assert_eq!(stats.pages_failed, 0);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_url() {
        let fetcher = Arc::new(FakeFetcher::failing_on("broken"));
        let sink = Arc::new(RecordingSink::default());

        let mixed = vec![
            "http://docs.example.com/ok-1".to_string(),
            "http://docs.example.com/broken-1".to_string(),
            "http://docs.example.com/ok-2".to_string(),
            "http://docs.example.com/broken-2".to_string(),
            "http://docs.example.com/ok-3".to_string(),
        ];
        let stats = crawl_parallel(
            fetcher,
            sink.clone(),
            Arc::new(RobotsPolicy::Ignore),
            mixed,
            3,
        )
        .await
        .unwrap();

        assert_eq!(stats.pages_stored, 3);
        assert_eq!(stats.pages_failed, 2);
        assert_eq!(sink.stored.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_session_closed_once_even_when_a_unit_panics() {
        let fetcher = Arc::new(FakeFetcher::panicking_on("page-2"));
        let sink = Arc::new(RecordingSink::default());

        let stats = crawl_parallel(
            fetcher.clone(),
            sink,
            Arc::new(RobotsPolicy::Ignore),
            urls(5),
            2,
        )
        .await
        .unwrap();

        assert_eq!(stats.pages_stored, 4);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(fetcher.started.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_url_counts_as_failure() {
        let fetcher = Arc::new(FakeFetcher::new(Duration::from_millis(1)));
        let sink = Arc::new(RecordingSink::default());

        let mixed = vec![
            "http://docs.example.com/fine".to_string(),
            "not a url at all".to_string(),
        ];
        let stats = crawl_parallel(
            fetcher,
            sink.clone(),
            Arc::new(RobotsPolicy::Ignore),
            mixed,
            2,
        )
        .await
        .unwrap();

        assert_eq!(stats.pages_stored, 1);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(sink.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_url_list_still_opens_and_closes_the_session() {
        let fetcher = Arc::new(FakeFetcher::new(Duration::from_millis(1)));
        let sink = Arc::new(RecordingSink::default());

        let stats = crawl_parallel(
            fetcher.clone(),
            sink,
            Arc::new(RobotsPolicy::Ignore),
            Vec::new(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(stats.total_urls, 0);
        assert_eq!(fetcher.started.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_to_markdown_converts_headings() {
        let markdown = to_markdown("<h1>Title</h1><p>Body text.</p>").unwrap();
        assert!(markdown.contains("# Title"));
        assert!(markdown.contains("Body text."));
    }

    #[test]
    fn test_stats_duration() {
        let start = Instant::now();
        let stats = CrawlStats {
            start_time: Some(start),
            end_time: Some(start + Duration::from_secs(3)),
            ..Default::default()
        };
        assert_eq!(stats.duration(), Some(Duration::from_secs(3)));
        assert_eq!(CrawlStats::default().duration(), None);
    }
}
