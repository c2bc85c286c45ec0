pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod service;
pub mod store;

pub trait Located {
    fn location(&self) -> snafu::Location;
}
