//! Concurrent documentation crawler.
//!
//! This crate discovers a list of page URLs and crawls them concurrently,
//! converting each fetched page to Markdown and handing it to a document sink.
//!
//! # Features
//!
//! - URL discovery from an HTML documentation index page or a sitemap.xml
//! - Bounded-concurrency fan-out over a shared crawling session
//! - Plain HTTP fetching or headless-Chromium rendering
//! - HTML to Markdown conversion
//! - Markdown output to a directory or stdout
//! - Optional robots.txt compliance with a per-host cache
//! - Crawl statistics reporting
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrawl::{discovery, dispatch, fetch::HttpFetcher, robots::RobotsPolicy, sink::StdoutSink};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docrawl::error::CrawlError> {
//!     let client = reqwest::Client::new();
//!     let index = Url::parse("https://git-scm.com/docs")?;
//!     let urls = discovery::index_links(&client, &index, "/docs/").await?;
//!     let stats = dispatch::crawl_parallel(
//!         Arc::new(HttpFetcher::new(30)?),
//!         Arc::new(StdoutSink),
//!         Arc::new(RobotsPolicy::Ignore),
//!         urls,
//!         10,
//!     )
//!     .await?;
//!     println!("Stored {} pages", stats.pages_stored);
//!     Ok(())
//! }
//! ```
//!
//! # Crawling behavior
//!
//! Per-URL failures are isolated: a failed fetch is logged and never aborts
//! sibling fetches or the run. The crawling session is opened once before the
//! fan-out and released exactly once after every unit has finished.
//!
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod robots;
pub mod sink;
