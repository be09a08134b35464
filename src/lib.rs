//! Meal-planning helper: scrape recipes, attach USDA nutrition facts per
//! ingredient, store them in SQLite, and query the stored set.

pub mod db;
pub mod error;
pub mod http;
pub mod nutrition;
pub mod parser;
pub mod pipeline;
pub mod places;
pub mod query;
pub mod settings;
pub mod source;

pub use db::Store;
pub use error::{FetchError, IngestError, PlacesError, StoreError};
pub use pipeline::{ingest, IngestStatus};
pub use settings::Settings;
