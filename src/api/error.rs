use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use snafu::{Location, Snafu};

use crate::model::ParseSlug;
use crate::store::StoreError;
use crate::Located as _;

#[derive(Debug, Snafu, Serialize)]
#[serde(tag = "error")]
#[snafu(visibility(pub(crate)))]
pub enum ViewsError {
    #[snafu(display("slug is missing or invalid"))]
    InvalidSlug {
        #[serde(skip)]
        source: ParseSlug,
    },

    #[snafu(display("at least one slug is required"))]
    EmptyBatch,

    #[snafu(display("at most {limit} slugs can be requested at once"))]
    BatchTooLarge { limit: usize },

    #[snafu(display("request body is malformed"))]
    MalformedBody {
        #[serde(skip)]
        source: JsonRejection,
    },

    #[snafu(display("batch request is malformed"))]
    MalformedBatch {
        #[serde(skip)]
        reason: String,
    },

    #[snafu(display("failed to track view"))]
    Track {
        #[serde(skip)]
        source: StoreError,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to fetch views"))]
    Read {
        #[serde(skip)]
        source: StoreError,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to fetch views"))]
    ReadBatch {
        #[serde(skip)]
        source: StoreError,
        #[serde(skip)]
        #[snafu(implicit)]
        location: Location,
    },
}

impl ViewsError {
    pub fn status(&self) -> StatusCode {
        match self {
            ViewsError::InvalidSlug { .. }
            | ViewsError::EmptyBatch
            | ViewsError::BatchTooLarge { .. }
            | ViewsError::MalformedBody { .. }
            | ViewsError::MalformedBatch { .. } => StatusCode::BAD_REQUEST,
            ViewsError::Track { .. } | ViewsError::Read { .. } | ViewsError::ReadBatch { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Count reported in place of the real one, shaped like the successful response.
    fn fallback_views(&self) -> Value {
        match self {
            ViewsError::EmptyBatch
            | ViewsError::BatchTooLarge { .. }
            | ViewsError::MalformedBatch { .. }
            | ViewsError::ReadBatch { .. } => json!({}),
            _ => json!(0),
        }
    }

    fn log(&self) {
        match self {
            ViewsError::Track { source, location }
            | ViewsError::Read { source, location }
            | ViewsError::ReadBatch { source, location } => {
                tracing::error!(
                    store_location = %source.location(),
                    "{self} at {location}: {source}"
                );
            }
            ViewsError::MalformedBatch { reason } => {
                tracing::debug!("rejected request: {self}: {reason}")
            }
            _ => tracing::debug!("rejected request: {self}"),
        }
    }
}

impl From<JsonRejection> for ViewsError {
    fn from(source: JsonRejection) -> Self {
        ViewsError::MalformedBody { source }
    }
}

#[derive(Debug, Serialize)]
struct ViewsFailure {
    success: bool,
    views: Value,
    message: String,
    #[serde(flatten)]
    data: ViewsError,
}

impl IntoResponse for ViewsError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status();
        let content = ViewsFailure {
            success: false,
            views: self.fallback_views(),
            message: self.to_string(),
            data: self,
        };

        (status, Json(content)).into_response()
    }
}
