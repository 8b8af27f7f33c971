use crate::config::FetchConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT_ENCODING, HeaderValue};
use reqwest::{Client, StatusCode, redirect};
use scraper::Html;
use tracing::{debug, info};

/// Encodings advertised on every request; the client inflates either transparently.
const ACCEPTED_ENCODINGS: &str = "gzip, deflate";

const MAX_REDIRECTS: usize = 10;

/// Source of page bodies.
///
/// [`Fetcher`] is the HTTP implementation; tests substitute in-memory sources.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch `url` and return its body decoded as UTF-8 text.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// HTTP client for listing and detail pages
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher with the default timeouts
    pub fn new() -> Result<Self> {
        Self::with_config(&FetchConfig::default())
    }

    /// Creates a fetcher from explicit client settings
    pub fn with_config(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Fetches `url` and parses the body into a navigable document.
    pub async fn fetch_document(&self, url: &str) -> Result<Html> {
        let body = self.fetch_text(url).await?;
        Ok(parse_document(&body))
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPTED_ENCODINGS))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("Page not found at '{url}'")));
        }

        let bytes = response.error_for_status()?.bytes().await?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        info!("Fetched {} bytes from {}", content.len(), url);
        Ok(content)
    }
}

/// Parses markup leniently: unclosed tags and missing structure are repaired, never rejected.
pub fn parse_document(body: &str) -> Html {
    Html::parse_document(body)
}
