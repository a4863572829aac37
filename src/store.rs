use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::feeds::FeedSource;
use crate::progress::{ActiveConfig, CourseHistory};

pub const DEFAULT_PLAYLIST_ID: &str = "PLinedj3B30sBlBWRox2V2tg9QJ2zr4M3o";

pub fn default_feed_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new("https://netflixtechblog.com/feed", "Netflix Tech"),
        FeedSource::new("https://eng.uber.com/feed/", "Uber Eng"),
        FeedSource::new("https://aws.amazon.com/blogs/architecture/feed/", "AWS Arch"),
        FeedSource::new(
            "https://www.youtube.com/feeds/videos.xml?channel_id=UCl4C_NK52aOGHOVv_cZf9aA",
            "Piyush Garg",
        ),
    ]
}

/// Persistent state of the agent: the active playlist record, the archive
/// of finished playlists and the general feed sources.
///
/// Runs are assumed not to overlap; nothing here locks across processes.
pub trait Store: Send + Sync {
    /// Seed whichever collections are missing or empty.
    fn ensure_initialized(&self) -> Result<()>;
    fn active_config(&self) -> Result<ActiveConfig>;
    fn save_active_config(&self, config: &ActiveConfig) -> Result<()>;
    fn append_history(&self, record: &CourseHistory) -> Result<()>;
    fn history(&self) -> Result<Vec<CourseHistory>>;
    fn feed_sources(&self) -> Result<Vec<FeedSource>>;
}

const ACTIVE_CONFIG_FILE: &str = "active_config.json";
const HISTORY_FILE: &str = "course_history.json";
const FEED_SOURCES_FILE: &str = "feed_sources.json";

/// Directory of JSON documents, one file per collection.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt store document: {}", path.display()))?;
        Ok(Some(value))
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));

        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn ensure_initialized(&self) -> Result<()> {
        if self.read::<ActiveConfig>(ACTIVE_CONFIG_FILE)?.is_none() {
            tracing::info!("Seeding active config...");
            self.write(ACTIVE_CONFIG_FILE, &ActiveConfig::new(DEFAULT_PLAYLIST_ID))?;
        }

        let sources: Vec<FeedSource> = self.read(FEED_SOURCES_FILE)?.unwrap_or_default();
        if sources.is_empty() {
            tracing::info!("Seeding feed sources...");
            self.write(FEED_SOURCES_FILE, &default_feed_sources())?;
        }

        tracing::debug!("Store check complete: {}", self.dir.display());
        Ok(())
    }

    fn active_config(&self) -> Result<ActiveConfig> {
        self.read(ACTIVE_CONFIG_FILE)?.with_context(|| {
            format!(
                "No active config in {}. Run `topic-master init` first.",
                self.dir.display()
            )
        })
    }

    fn save_active_config(&self, config: &ActiveConfig) -> Result<()> {
        self.write(ACTIVE_CONFIG_FILE, config)
    }

    fn append_history(&self, record: &CourseHistory) -> Result<()> {
        let mut rows = self.history()?;
        rows.push(record.clone());
        self.write(HISTORY_FILE, &rows)
    }

    fn history(&self) -> Result<Vec<CourseHistory>> {
        Ok(self.read(HISTORY_FILE)?.unwrap_or_default())
    }

    fn feed_sources(&self) -> Result<Vec<FeedSource>> {
        Ok(self.read(FEED_SOURCES_FILE)?.unwrap_or_default())
    }
}
