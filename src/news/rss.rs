use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{clean_snippet, find_source, NewsItem, NewsProvider};
use crate::core::retry::{RetryExecutor, Retryable};

pub const RSS2JSON_ENDPOINT: &str = "https://api.rss2json.com/v1/api.json";
pub const CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
pub enum NewsError {
    Http { status: u16 },
    Transport(reqwest::Error),
    /// The conversion service answered but refused the feed.
    Service(String),
}

impl fmt::Display for NewsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsError::Http { status } => write!(f, "feed service returned HTTP {status}"),
            NewsError::Transport(err) => write!(f, "feed request failed: {err}"),
            NewsError::Service(message) => write!(f, "feed service error: {message}"),
        }
    }
}

impl std::error::Error for NewsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NewsError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NewsError {
    fn from(err: reqwest::Error) -> Self {
        NewsError::Transport(err)
    }
}

impl Retryable for NewsError {
    fn is_retryable(&self) -> bool {
        match self {
            NewsError::Http { status } => matches!(status, 429 | 503),
            NewsError::Transport(err) => err.is_timeout() || err.is_connect(),
            NewsError::Service(_) => false,
        }
    }
}

/// Body of an rss2json conversion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
}

impl FeedItem {
    fn into_news_item(self, source: &str) -> NewsItem {
        let snippet_source = if self.description.is_empty() {
            &self.content
        } else {
            &self.description
        };
        let snippet = clean_snippet(snippet_source);
        let full_content = if self.content.is_empty() {
            self.description
        } else {
            self.content
        };
        NewsItem {
            title: self.title,
            snippet,
            url: self.link,
            source: source.to_string(),
            date: self.pub_date,
            full_content,
        }
    }
}

/// One round trip to the feed conversion service.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch_feed(&self, feed_url: &str) -> Result<FeedResponse, NewsError>;
}

pub struct ReqwestFeedTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestFeedTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: RSS2JSON_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl FeedTransport for ReqwestFeedTransport {
    async fn fetch_feed(&self, feed_url: &str) -> Result<FeedResponse, NewsError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("rss_url", feed_url)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<FeedResponse>().await?)
    }
}

struct CachedFeed {
    fetched_at: Instant,
    items: Vec<NewsItem>,
}

/// News provider backed by the rss2json conversion service.
pub struct Rss2JsonNewsProvider {
    transport: Box<dyn FeedTransport>,
    retry: RetryExecutor,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedFeed>>,
}

impl Rss2JsonNewsProvider {
    pub fn new(transport: Box<dyn FeedTransport>) -> Self {
        Self {
            transport,
            retry: RetryExecutor::default(),
            ttl: CACHE_TTL,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    async fn cached(&self, source: &str) -> Option<Vec<NewsItem>> {
        let cache = self.cache.lock().await;
        cache
            .get(source)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.items.clone())
    }

    async fn fetch_uncached(&self, name: &str, feed_url: &str) -> Result<Vec<NewsItem>, NewsError> {
        let feed = self.transport.fetch_feed(feed_url).await?;
        if feed.status != "ok" {
            return Err(NewsError::Service(
                feed.message.unwrap_or_else(|| format!("status {:?}", feed.status)),
            ));
        }
        Ok(feed
            .items
            .into_iter()
            .map(|item| item.into_news_item(name))
            .collect())
    }
}

#[async_trait]
impl NewsProvider for Rss2JsonNewsProvider {
    async fn fetch_items(&self, source_id: &str) -> Vec<NewsItem> {
        let Some(source) = find_source(source_id) else {
            warn!(source = source_id, "unknown news source");
            return Vec::new();
        };

        if let Some(items) = self.cached(source.name).await {
            debug!(source = source.name, count = items.len(), "news cache hit");
            return items;
        }

        let items = self
            .retry
            .execute_or_default(|| self.fetch_uncached(source.name, source.url))
            .await;

        if !items.is_empty() {
            info!(source = source.name, count = items.len(), "fetched news feed");
            self.cache.lock().await.insert(
                source.name.to_string(),
                CachedFeed {
                    fetched_at: Instant::now(),
                    items: items.clone(),
                },
            );
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use crate::utils::test_utils::RecordingSleeper;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct FakeTransport {
        responses: StdMutex<VecDeque<Result<FeedResponse, NewsError>>>,
        urls: StdMutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn then(self, response: Result<FeedResponse, NewsError>) -> Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }
    }

    #[async_trait]
    impl FeedTransport for Arc<FakeTransport> {
        async fn fetch_feed(&self, feed_url: &str) -> Result<FeedResponse, NewsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(feed_url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(NewsError::Service("exhausted".into())))
        }
    }

    fn ok_feed(items: Vec<FeedItem>) -> FeedResponse {
        FeedResponse {
            status: "ok".into(),
            message: None,
            items,
        }
    }

    fn feed_item(title: &str) -> FeedItem {
        FeedItem {
            title: title.into(),
            link: format!("https://news.example/{title}"),
            pub_date: "2025-03-01 10:00:00".into(),
            description: "<p>Summary of the story.</p>".into(),
            content: "<p>Full story.</p>".into(),
        }
    }

    fn provider(transport: Arc<FakeTransport>) -> (Rss2JsonNewsProvider, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let provider = Rss2JsonNewsProvider::new(Box::new(transport))
            .with_retry(RetryExecutor::new(RetryPolicy::default(), sleeper.clone()));
        (provider, sleeper)
    }

    #[tokio::test]
    async fn items_are_mapped_from_the_feed() {
        let transport = Arc::new(FakeTransport::default().then(Ok(ok_feed(vec![feed_item("a")]))));
        let (provider, _) = provider(transport.clone());

        let items = provider.fetch_items("The Guardian").await;
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "a");
        assert_eq!(item.url, "https://news.example/a");
        assert_eq!(item.source, "The Guardian");
        assert_eq!(item.snippet, "Summary of the story.");
        assert_eq!(item.full_content, "<p>Full story.</p>");
        assert_eq!(
            transport.urls.lock().unwrap().as_slice(),
            ["https://www.theguardian.com/world/rss"]
        );
    }

    #[tokio::test]
    async fn missing_description_falls_back_to_content() {
        let item = FeedItem {
            description: String::new(),
            ..feed_item("b")
        };
        let transport = Arc::new(FakeTransport::default().then(Ok(ok_feed(vec![item]))));
        let (provider, _) = provider(transport);

        let items = provider.fetch_items("ProPublica").await;
        assert_eq!(items[0].snippet, "Full story.");
        assert_eq!(items[0].full_content, "<p>Full story.</p>");
    }

    #[tokio::test]
    async fn unknown_sources_never_hit_the_network() {
        let transport = Arc::new(FakeTransport::default());
        let (provider, _) = provider(transport.clone());

        assert!(provider.fetch_items("Daily Nowhere").await.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_results_are_served_from_cache() {
        let transport = Arc::new(FakeTransport::default().then(Ok(ok_feed(vec![feed_item("a")]))));
        let (provider, _) = provider(transport.clone());

        let first = provider.fetch_items("El País").await;
        let second = provider.fetch_items("El País").await;
        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let transport = Arc::new(
            FakeTransport::default()
                .then(Ok(ok_feed(vec![feed_item("old")])))
                .then(Ok(ok_feed(vec![feed_item("new")]))),
        );
        let (provider, _) = provider(transport.clone());
        let provider = provider.with_ttl(Duration::ZERO);

        provider.fetch_items("Der Spiegel").await;
        let items = provider.fetch_items("Der Spiegel").await;
        assert_eq!(items[0].title, "new");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn service_refusals_degrade_to_empty_and_are_not_cached() {
        let refused = FeedResponse {
            status: "error".into(),
            message: Some("Cannot download this RSS feed".into()),
            items: Vec::new(),
        };
        let transport = Arc::new(
            FakeTransport::default()
                .then(Ok(refused))
                .then(Ok(ok_feed(vec![feed_item("a")]))),
        );
        let (provider, sleeper) = provider(transport.clone());

        assert!(provider.fetch_items("Il Manifesto").await.is_empty());
        assert!(sleeper.delays_ms().is_empty());
        assert_eq!(provider.fetch_items("Il Manifesto").await.len(), 1);
    }

    #[tokio::test]
    async fn rate_limits_are_retried_then_swallowed() {
        let mut transport = FakeTransport::default();
        for _ in 0..5 {
            transport = transport.then(Err(NewsError::Http { status: 429 }));
        }
        let transport = Arc::new(transport);
        let (provider, sleeper) = provider(transport.clone());

        assert!(provider.fetch_items("Clarín").await.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);
        assert_eq!(sleeper.delays_ms(), vec![2000, 4000, 8000, 16000]);
    }

    #[test]
    fn feed_json_uses_camel_case_dates() {
        let json = r#"{"status":"ok","items":[{"title":"T","link":"L","pubDate":"D"}]}"#;
        let feed: FeedResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(feed.items[0].pub_date, "D");
        assert!(feed.items[0].description.is_empty());
    }
}
