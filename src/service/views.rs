//! View counting with per-visitor deduplication.
//!
//! A view of a slug is counted at most once per visitor per cooldown window.
//! The visitor is identified by a salted hash of their address, see
//! [VisitorHasher].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::model::{self, Slug, Timestamp, VisitorHasher, VisitorToken};
use crate::store::{keys, KeyValueStore, Result};

/// How the cooldown marker guards the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateMode {
    /// Create the marker with a single set-if-absent and only count when it was created.
    ///
    /// The count itself never doubles, but a duplicate racing the first view
    /// may read the counter before that view's increment lands and report
    /// one view fewer (`Recent { views: 0 }` for a brand new slug).
    #[default]
    Strict,
    /// Check for the marker, count, then write it. Two concurrent first
    /// views from the same visitor may both be counted.
    CheckThenSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub cooldown: Duration,
    pub analytics_ttl: Duration,
    pub gate: GateMode,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(15 * 60),
            analytics_ttl: Duration::from_secs(24 * 60 * 60),
            gate: GateMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The view was counted, `views` includes it.
    Counted { views: u64 },
    /// The visitor was counted within the cooldown window, nothing changed.
    Recent { views: u64 },
}

impl TrackOutcome {
    pub fn views(&self) -> u64 {
        match self {
            TrackOutcome::Counted { views } | TrackOutcome::Recent { views } => *views,
        }
    }
}

#[derive(Debug, Serialize)]
struct VisitSnapshot<'a> {
    visitor: &'a VisitorToken,
    user_agent: &'a str,
    timestamp: Timestamp,
}

#[derive(Debug, Clone, new)]
pub struct ViewTracker {
    store: Arc<dyn KeyValueStore>,
    hasher: VisitorHasher,
    settings: TrackerSettings,
}

impl ViewTracker {
    /// Counts a view of `slug` from the client at `address` unless that client
    /// was already counted within the cooldown window.
    #[instrument(skip(self, address, user_agent), fields(gate = ?self.settings.gate))]
    pub async fn track_view(
        &self,
        slug: &Slug,
        address: &str,
        user_agent: &str,
    ) -> Result<TrackOutcome> {
        let visitor = self.hasher.token(address);
        let marker = keys::cooldown(slug, &visitor);
        let counter = keys::views(slug);
        let seen_at = model::now();

        let outcome = match self.settings.gate {
            GateMode::Strict => {
                let acquired = self
                    .store
                    .set_if_absent(&marker, &seen_at.epoch_millis().to_string(), self.settings.cooldown)
                    .await?;

                if acquired {
                    TrackOutcome::Counted {
                        views: count(self.store.increment(&counter).await?),
                    }
                } else {
                    TrackOutcome::Recent {
                        views: self.store.get(&counter).await?.map_or(0, count),
                    }
                }
            }
            GateMode::CheckThenSet => {
                if self.store.exists(&marker).await? {
                    TrackOutcome::Recent {
                        views: self.store.get(&counter).await?.map_or(0, count),
                    }
                } else {
                    let views = count(self.store.increment(&counter).await?);
                    self.store
                        .set_with_ttl(&marker, &seen_at.epoch_millis().to_string(), self.settings.cooldown)
                        .await?;
                    TrackOutcome::Counted { views }
                }
            }
        };

        match outcome {
            TrackOutcome::Counted { views } => {
                tracing::info!(views, "view counted");
                self.record_visit(slug, &visitor, user_agent, seen_at).await;
            }
            TrackOutcome::Recent { .. } => tracing::debug!("view already counted recently"),
        }

        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn views(&self, slug: &Slug) -> Result<u64> {
        let views = self.store.get(&keys::views(slug)).await?;
        Ok(views.map_or(0, count))
    }

    /// Reads the counts of every slug with a single store request. Duplicate
    /// slugs collapse into one entry.
    #[instrument(skip_all, fields(slugs = slugs.len()))]
    pub async fn views_batch(&self, slugs: &[Slug]) -> Result<BTreeMap<Slug, u64>> {
        let mut unique: Vec<&Slug> = Vec::with_capacity(slugs.len());
        for slug in slugs {
            if !unique.contains(&slug) {
                unique.push(slug);
            }
        }

        let counters: Vec<String> = unique.iter().map(|slug| keys::views(slug)).collect();
        let values = self.store.get_many(&counters).await?;

        Ok(unique
            .into_iter()
            .cloned()
            .zip(values.into_iter().map(|value| value.map_or(0, count)))
            .collect())
    }

    /// Writes a short-lived diagnostic record of the visit. Failures are
    /// logged and otherwise ignored.
    async fn record_visit(
        &self,
        slug: &Slug,
        visitor: &VisitorToken,
        user_agent: &str,
        timestamp: Timestamp,
    ) {
        let snapshot = VisitSnapshot {
            visitor,
            user_agent,
            timestamp,
        };

        let body = match serde_json::to_string(&snapshot) {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!("could not encode visit snapshot: {err}");
                return;
            }
        };

        let key = keys::analytics(slug, timestamp.epoch_millis());
        if let Err(err) = self
            .store
            .set_with_ttl(&key, &body, self.settings.analytics_ttl)
            .await
        {
            tracing::debug!("could not record visit snapshot: {err}");
        }
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
