use derive_new::new;
use serde::Serialize;

pub use slug::*;
pub use timestamp::*;
pub use visitor::*;

mod slug;
mod timestamp;
mod visitor;
