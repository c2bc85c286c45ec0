use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::{Query, QueryRejection, WithRejection};
use serde::{Deserialize, Serialize};
use snafu::{IntoError as _, ResultExt as _};
use tracing::instrument;

use super::error::*;
use super::state::App;
use crate::model::{self, ParseSlug, Slug};
use crate::service::TrackOutcome;

pub const MAX_BATCH: usize = 100;

const RECENTLY_COUNTED: &str = "View already counted recently";

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub views: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl From<TrackOutcome> for TrackResponse {
    fn from(outcome: TrackOutcome) -> Self {
        let message = match outcome {
            TrackOutcome::Counted { .. } => None,
            TrackOutcome::Recent { .. } => Some(RECENTLY_COUNTED),
        };

        TrackResponse {
            success: true,
            views: outcome.views(),
            message,
        }
    }
}

#[instrument(skip_all)]
pub async fn track(
    State(app): State<App>,
    headers: HeaderMap,
    WithRejection(Json(request), _): WithRejection<Json<TrackRequest>, ViewsError>,
) -> Result<Json<TrackResponse>, ViewsError> {
    let slug: Slug = request.slug.parse().context(InvalidSlugSnafu)?;

    let address = model::client_address(&headers);
    let user_agent = model::user_agent(&headers);

    let outcome = app
        .views()
        .track_view(&slug, &address, &user_agent)
        .await
        .context(TrackSnafu)?;

    Ok(Json(outcome.into()))
}

#[derive(Debug, Serialize)]
pub struct ViewsResponse {
    pub success: bool,
    pub slug: Slug,
    pub views: u64,
}

#[instrument(skip(app))]
pub async fn views(
    State(app): State<App>,
    Path(slug): Path<String>,
) -> Result<Json<ViewsResponse>, ViewsError> {
    let slug: Slug = slug.parse().context(InvalidSlugSnafu)?;
    let views = app.views().views(&slug).await.context(ReadSnafu)?;

    Ok(Json(ViewsResponse {
        success: true,
        slug,
        views,
    }))
}

/// `GET /views/` names no slug at all.
pub async fn missing_slug() -> ViewsError {
    InvalidSlugSnafu.into_error(ParseSlug::new(String::new()))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub slugs: Vec<String>,
}

/// `?slugs=a,b` and `?slugs=a&slugs=b` are both accepted.
#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    #[serde(default)]
    pub slugs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub views: BTreeMap<Slug, u64>,
}

#[instrument(skip_all)]
pub async fn batch(
    State(app): State<App>,
    request: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ViewsError> {
    let Json(request) = request.map_err(|rejection| {
        MalformedBatchSnafu {
            reason: rejection.body_text(),
        }
        .build()
    })?;

    let slugs = parse_batch(request.slugs)?;
    read_batch(&app, &slugs).await
}

#[instrument(skip_all)]
pub async fn batch_query(
    State(app): State<App>,
    query: Result<Query<BatchQuery>, QueryRejection>,
) -> Result<Json<BatchResponse>, ViewsError> {
    let Query(query) = query.map_err(|rejection| {
        MalformedBatchSnafu {
            reason: rejection.to_string(),
        }
        .build()
    })?;

    let raw = query
        .slugs
        .iter()
        .flat_map(|slugs| slugs.split(','))
        .map(str::to_string);

    let slugs = parse_batch(raw)?;
    read_batch(&app, &slugs).await
}

async fn read_batch(app: &App, slugs: &[Slug]) -> Result<Json<BatchResponse>, ViewsError> {
    let views = app.views().views_batch(slugs).await.context(ReadBatchSnafu)?;

    Ok(Json(BatchResponse {
        success: true,
        views,
    }))
}

/// Keeps the distinct entries that are valid slugs. Blank or malformed
/// entries are skipped; only an empty result is an error.
fn parse_batch(raw: impl IntoIterator<Item = String>) -> Result<Vec<Slug>, ViewsError> {
    let mut slugs: Vec<Slug> = Vec::new();

    for text in raw {
        let Ok(slug) = text.parse::<Slug>() else {
            tracing::debug!("skipping invalid slug in batch: {text:?}");
            continue;
        };

        if !slugs.contains(&slug) {
            slugs.push(slug);
        }
    }

    if slugs.is_empty() {
        return EmptyBatchSnafu.fail();
    }

    if slugs.len() > MAX_BATCH {
        return BatchTooLargeSnafu { limit: MAX_BATCH }.fail();
    }

    Ok(slugs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn batch_drops_blanks_and_duplicates() {
        let slugs = parse_batch(strings(&["a", " ", "b", "a", ""])).unwrap();
        let names: Vec<&str> = slugs.iter().map(Slug::as_str).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn batch_needs_at_least_one_slug() {
        assert!(matches!(parse_batch(strings(&["", "  "])), Err(ViewsError::EmptyBatch)));
        assert!(matches!(parse_batch(Vec::new()), Err(ViewsError::EmptyBatch)));
    }

    #[test]
    fn batch_skips_invalid_slugs() {
        let slugs = parse_batch(strings(&["ok", "not ok", "views:ok"])).unwrap();
        let names: Vec<&str> = slugs.iter().map(Slug::as_str).collect();
        assert_eq!(names, ["ok"]);

        assert!(matches!(
            parse_batch(strings(&["Hello World", "a:b"])),
            Err(ViewsError::EmptyBatch)
        ));
    }

    #[test]
    fn batch_is_capped() {
        let many: Vec<String> = (0..=MAX_BATCH).map(|i| format!("post-{i}")).collect();
        assert!(matches!(parse_batch(many), Err(ViewsError::BatchTooLarge { .. })));
    }
}
