pub mod views;

pub use views::{GateMode, TrackOutcome, TrackerSettings, ViewTracker};
