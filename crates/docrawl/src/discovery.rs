use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use scraper::{Html, Selector};
use url::Url;

use crate::error::CrawlError;

/// XML namespace that sitemap `loc` elements must be bound to.
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Scrapes page links out of an HTML documentation index.
///
/// Fetches `index_url` and returns the href of every anchor whose value
/// contains `path_filter`, in document order, duplicates included.
/// Root-relative hrefs are prefixed with the index URL's origin; everything
/// else passes through unchanged. A transport-level error is fatal and
/// propagates to the caller.
pub async fn index_links(
    client: &reqwest::Client,
    index_url: &Url,
    path_filter: &str,
) -> Result<Vec<String>, CrawlError> {
    tracing::info!("Fetching documentation index: {}", index_url);
    let body = client.get(index_url.clone()).send().await?.text().await?;
    let origin = index_url.origin().ascii_serialization();
    Ok(links_from_html(&body, &origin, path_filter))
}

fn links_from_html(html: &str, origin: &str, path_filter: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("'a[href]' is a valid selector");

    let mut urls = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.contains(path_filter) {
            continue;
        }
        if href.starts_with('/') {
            urls.push(format!("{}{}", origin, href));
        } else {
            urls.push(href.to_string());
        }
    }
    tracing::debug!("Found {} matching links on index page", urls.len());
    urls
}

/// Discovers page URLs from `<base>/sitemap.xml`.
///
/// Unlike index scraping, every failure here is non-fatal: an unreachable
/// sitemap, an error status, or malformed XML is reported and degrades to an
/// empty list.
pub async fn sitemap_urls(client: &reqwest::Client, base: &Url) -> Vec<String> {
    let sitemap_url = format!("{}/sitemap.xml", base.as_str().trim_end_matches('/'));
    tracing::info!("Fetching sitemap: {}", sitemap_url);

    match fetch_sitemap(client, &sitemap_url).await {
        Ok(urls) => urls,
        Err(e) => {
            tracing::error!("Error fetching sitemap {}: {}", sitemap_url, e);
            Vec::new()
        }
    }
}

async fn fetch_sitemap(
    client: &reqwest::Client,
    sitemap_url: &str,
) -> Result<Vec<String>, CrawlError> {
    let response = client.get(sitemap_url).send().await?.error_for_status()?;
    let body = response.text().await?;
    parse_sitemap(&body)
}

/// Extracts the text of every `loc` element bound to the sitemap namespace,
/// preserving document order.
fn parse_sitemap(xml: &str) -> Result<Vec<String>, CrawlError> {
    let mut reader = NsReader::from_str(xml);
    let mut urls = Vec::new();
    let mut in_loc = false;

    loop {
        match reader
            .read_resolved_event()
            .map_err(|e| CrawlError::SitemapParse(e.to_string()))?
        {
            (ns, Event::Start(e)) if e.local_name().as_ref() == b"loc" => {
                in_loc = matches!(ns, ResolveResult::Bound(n) if n.into_inner() == SITEMAP_NS.as_bytes());
            }
            (_, Event::Start(_)) => in_loc = false,
            (_, Event::Text(text)) if in_loc => {
                let text = text
                    .unescape()
                    .map_err(|e| CrawlError::SitemapParse(e.to_string()))?;
                let text = text.trim();
                if !text.is_empty() {
                    urls.push(text.to_string());
                    in_loc = false;
                }
            }
            (_, Event::End(_)) => in_loc = false,
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    Ok(urls)
}
