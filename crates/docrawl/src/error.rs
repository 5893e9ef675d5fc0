use url::Url;

/// Errors produced while discovering or crawling pages.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} failed with status {status}")]
    Status {
        url: Url,
        status: reqwest::StatusCode,
    },

    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("{0}")]
    Session(String),

    #[error("sitemap is not valid XML: {0}")]
    SitemapParse(String),

    #[error("markdown conversion failed: {0}")]
    Extract(String),

    #[error("{0}")]
    Output(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
