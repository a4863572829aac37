use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::config::FeedsConfig;
use crate::progress::PlaylistEntry;

const FALLBACK_SOURCE_NAME: &str = "Tech Source";

/// A general news feed the digest draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "general".to_string()
}

impl FeedSource {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: Some(name.into()),
            kind: default_kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub date: Option<DateTime<Utc>>,
}

/// Outcome of one feed fetch. Failures carry the reason instead of collapsing
/// into an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Items(Vec<T>),
    Failed { reason: String },
}

impl<T> FetchOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn items(&self) -> &[T] {
        match self {
            Self::Items(items) => items,
            Self::Failed { .. } => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub source: FeedSource,
    pub outcome: FetchOutcome<FeedItem>,
}

/// Fan-in of all general feed fetches, one entry per source in input order.
#[derive(Debug, Clone, Default)]
pub struct GeneralFeeds {
    pub fetches: Vec<SourceFetch>,
}

impl GeneralFeeds {
    pub fn pool(&self) -> Vec<FeedItem> {
        self.fetches
            .iter()
            .flat_map(|f| f.outcome.items().iter().cloned())
            .collect()
    }

    /// Display names of the sources whose fetch failed, in input order.
    pub fn failed_sources(&self) -> Vec<&str> {
        self.fetches
            .iter()
            .filter(|f| f.outcome.is_failed())
            .map(|f| f.source.name.as_deref().unwrap_or(&f.source.url))
            .collect()
    }
}

pub struct FeedFetcher {
    client: Client,
    playlist_base_url: String,
    items_per_source: usize,
}

impl FeedFetcher {
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("topic-master/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            playlist_base_url: config.playlist_base_url.clone(),
            items_per_source: config.items_per_source,
        })
    }

    /// Entries of the playlist feed in feed order. Never fails the run.
    pub async fn fetch_playlist(&self, playlist_id: &str) -> FetchOutcome<PlaylistEntry> {
        let result = async {
            let url = Url::parse_with_params(&self.playlist_base_url, &[("playlist_id", playlist_id)])
                .with_context(|| format!("Invalid playlist base URL: {}", self.playlist_base_url))?;
            let feed = self.fetch_feed(url.as_str()).await?;
            Ok::<_, anyhow::Error>(
                feed.entries
                    .into_iter()
                    .map(|entry| PlaylistEntry {
                        title: entry_title(&entry),
                        link: entry_link(&entry),
                    })
                    .collect::<Vec<_>>(),
            )
        }
        .await;

        match result {
            Ok(entries) => {
                tracing::info!("Playlist {playlist_id}: {} videos", entries.len());
                FetchOutcome::Items(entries)
            }
            Err(e) => {
                tracing::warn!("Playlist fetch failed for {playlist_id}: {e:#}");
                FetchOutcome::Failed {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    /// Fetch every source concurrently. A failing source yields a `Failed`
    /// outcome and does not affect the others.
    pub async fn fetch_general(&self, sources: &[FeedSource]) -> GeneralFeeds {
        let fetches = join_all(sources.iter().map(|source| self.fetch_source(source))).await;
        let feeds = GeneralFeeds { fetches };
        let failed = feeds.failed_sources();
        tracing::info!(
            "General feeds: {} items from {} sources ({} failed)",
            feeds.pool().len(),
            sources.len(),
            failed.len()
        );
        if !failed.is_empty() {
            tracing::warn!("Skipped feeds: {}", failed.join(", "));
        }
        feeds
    }

    async fn fetch_source(&self, source: &FeedSource) -> SourceFetch {
        let outcome = match self.fetch_feed(&source.url).await {
            Ok(feed) => FetchOutcome::Items(self.latest_items(source, feed)),
            Err(e) => {
                tracing::warn!("Feed fetch failed for {}: {e:#}", source.url);
                FetchOutcome::Failed {
                    reason: format!("{e:#}"),
                }
            }
        };
        SourceFetch {
            source: source.clone(),
            outcome,
        }
    }

    fn latest_items(&self, source: &FeedSource, feed: feed_rs::model::Feed) -> Vec<FeedItem> {
        let source_name = source
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| feed.title.as_ref().map(|t| t.content.clone()))
            .unwrap_or_else(|| FALLBACK_SOURCE_NAME.to_string());

        let mut items: Vec<FeedItem> = feed
            .entries
            .iter()
            .map(|entry| FeedItem {
                title: entry_title(entry),
                link: entry_link(entry),
                source: source_name.clone(),
                date: entry.published.or(entry.updated),
            })
            .collect();

        // Newest first; undated entries keep document order behind dated ones.
        items.sort_by(|a, b| b.date.cmp(&a.date));
        items.truncate(self.items_per_source);
        items
    }

    async fn fetch_feed(&self, url: &str) -> Result<feed_rs::model::Feed> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("Bad response from {url}"))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?;
        feed_rs::parser::parse(&bytes[..]).with_context(|| format!("Failed to parse feed {url}"))
    }
}

fn entry_title(entry: &feed_rs::model::Entry) -> String {
    entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default()
}

fn entry_link(entry: &feed_rs::model::Entry) -> String {
    entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default()
}
