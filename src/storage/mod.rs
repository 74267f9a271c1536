pub mod sqlite;

pub use sqlite::{ReviewRecord, ReviewStore, RECENT_LIMIT};
