use std::sync::Arc;

use clap::Parser;
use docrawl::error::CrawlError;
use docrawl::fetch::{self, BrowserFetcher, HttpFetcher, PageFetcher};
use docrawl::robots::{RobotsCache, RobotsPolicy};
use docrawl::sink::{DirSink, DocumentSink, StdoutSink};
use docrawl::{discovery, dispatch};
use url::Url;

/// Discovers documentation page URLs and crawls them concurrently,
/// storing each page as Markdown.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    /// Documentation index page to scrape links from.
    #[clap(short, long, default_value = "https://git-scm.com/docs")]
    index_url: Url,
    /// Keep only index links whose href contains this substring.
    #[clap(short, long, default_value = "/docs/")]
    filter: String,
    /// Discover URLs from <BASE_URL>/sitemap.xml instead of the index page.
    #[clap(short, long, value_name = "BASE_URL")]
    sitemap: Option<Url>,
    /// Maximum number of pages fetched at the same time.
    #[clap(short, long, default_value_t = 10)]
    concurrency: usize,
    /// Output directory for markdown files. If not provided, output is
    /// printed to stdout.
    #[clap(short, long)]
    output: Option<String>,
    /// Render pages with a headless Chromium browser instead of plain HTTP.
    #[clap(short, long)]
    browser: bool,
    /// HTTP request timeout in seconds.
    #[clap(short, long, default_value_t = 30)]
    timeout: u64,
    /// Consult robots.txt and skip disallowed URLs.
    #[clap(long)]
    respect_robots: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = CliArgs::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Crawl failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), CrawlError> {
    let client = reqwest::Client::builder()
        .user_agent(fetch::USER_AGENT)
        .build()?;

    let urls = if let Some(base) = &args.sitemap {
        discovery::sitemap_urls(&client, base).await
    } else {
        discovery::index_links(&client, &args.index_url, &args.filter).await?
    };

    if urls.is_empty() {
        println!("No URLs found to crawl");
        return Ok(());
    }

    println!("Found {} URLs to crawl", urls.len());
    for url in &urls {
        println!("{}", url);
    }

    let fetcher: Arc<dyn PageFetcher> = if args.browser {
        Arc::new(BrowserFetcher::new())
    } else {
        Arc::new(HttpFetcher::new(args.timeout)?)
    };
    let sink: Arc<dyn DocumentSink> = match &args.output {
        Some(dir) => Arc::new(DirSink::new(dir)),
        None => Arc::new(StdoutSink),
    };
    let robots = Arc::new(if args.respect_robots {
        RobotsPolicy::Respect(RobotsCache::new(client, fetch::USER_AGENT))
    } else {
        RobotsPolicy::Ignore
    });

    dispatch::crawl_parallel(fetcher, sink, robots, urls, args.concurrency).await?;
    tracing::info!("Crawling complete");
    Ok(())
}
