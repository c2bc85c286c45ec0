use snafu::{Location, Snafu};
use url::Url;

use crate::Located;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("cannot connect to the store `{url}` at {location}: {source}"))]
    Connection {
        url: Url,
        source: redis::RedisError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("store url `{url}` cannot carry credentials at {location}"))]
    InvalidUrl {
        url: Url,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to {operation} `{key}` at {location}: {source}"))]
    Command {
        operation: &'static str,
        key: String,
        source: redis::RedisError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("value at `{key}` is not an integer at {location}"))]
    NotAnInteger {
        key: String,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Located for StoreError {
    fn location(&self) -> Location {
        match self {
            StoreError::Connection { location, .. }
            | StoreError::InvalidUrl { location, .. }
            | StoreError::Command { location, .. }
            | StoreError::NotAnInteger { location, .. } => *location,
        }
    }
}
