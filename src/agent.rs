use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::email::EmailDispatcher;
use crate::feeds::{FeedFetcher, FetchOutcome};
use crate::progress::{self, SubjectKind};
use crate::report::{ReportContext, ReportGenerator};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No lesson today and the playlist is not completed. Nothing was sent or written.
    NothingToDo,
    Sent {
        subject: SubjectKind,
        /// Index written back to the store, if the config changed.
        advanced_to: Option<usize>,
    },
}

/// One daily run: read progress, fetch feeds, write the digest, mail it, and
/// only then persist the new progress.
pub struct Agent {
    store: Arc<dyn Store>,
    fetcher: FeedFetcher,
    generator: ReportGenerator,
    dispatcher: EmailDispatcher,
    recipient: String,
    curriculum_name: String,
}

impl Agent {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: FeedFetcher,
        generator: ReportGenerator,
        dispatcher: EmailDispatcher,
        recipient: String,
        curriculum_name: String,
    ) -> Self {
        Self {
            store,
            fetcher,
            generator,
            dispatcher,
            recipient,
            curriculum_name,
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        self.store
            .ensure_initialized()
            .context("Failed to initialize store")?;
        let config = self.store.active_config()?;
        let sources = self.store.feed_sources()?;
        tracing::info!(
            "Status: {} | Index: {} | Playlist: {}",
            config.status,
            config.current_video_index,
            config.playlist_id
        );

        let (playlist, news) = tokio::join!(
            self.fetcher.fetch_playlist(&config.playlist_id),
            self.fetcher.fetch_general(&sources),
        );
        if let FetchOutcome::Failed { reason } = &playlist {
            tracing::warn!("Continuing without playlist: {reason}");
        }

        let plan = progress::evaluate(&config, playlist.items(), &self.curriculum_name);
        if plan.is_idle() {
            tracing::info!("No lesson available today; nothing to do");
            return Ok(RunOutcome::NothingToDo);
        }
        if let Some(lesson) = &plan.lesson {
            tracing::info!("Today's lesson: {} ({})", lesson.title, lesson.progress);
        }
        if plan.is_last_day {
            tracing::info!("Last lesson of the playlist");
        }

        let ctx = ReportContext {
            lesson: plan.lesson.clone(),
            news: news.pool(),
            is_last_day: plan.is_last_day,
            completed: plan.status.is_completed(),
        };
        let html = self
            .generator
            .generate(&ctx)
            .await
            .context("No report generated; progress left unchanged")?;

        let subject = plan.subject();
        self.dispatcher
            .dispatch(&html, &self.recipient, subject)
            .await?;

        let transition = progress::advance(&config, &plan, Utc::now());
        if transition.is_noop(&config) {
            return Ok(RunOutcome::Sent {
                subject,
                advanced_to: None,
            });
        }

        // A prior run may have archived the playlist and then failed to save the
        // config; the repeated last day must not archive it twice.
        if let Some(record) = &transition.history {
            let archived = self.store.history()?.iter().any(|row| {
                row.playlist_id == record.playlist_id
                    && row.total_videos_watched == record.total_videos_watched
            });
            if archived {
                tracing::info!("Playlist {} already archived", record.playlist_id);
            } else {
                self.store.append_history(record)?;
                tracing::info!(
                    "Playlist {} completed after {} videos",
                    record.playlist_id,
                    record.total_videos_watched
                );
            }
        }
        self.store.save_active_config(&transition.config)?;
        tracing::info!(
            "Progress saved: {} | Index: {}",
            transition.config.status,
            transition.config.current_video_index
        );

        Ok(RunOutcome::Sent {
            subject,
            advanced_to: Some(transition.config.current_video_index),
        })
    }
}
