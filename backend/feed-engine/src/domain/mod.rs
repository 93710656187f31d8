pub mod cursor;
pub mod models;

pub use cursor::FeedCursor;
pub use models::*;
