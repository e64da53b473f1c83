//! Storage layer: DuckDB tables for raw submissions, condensed analyses and
//! the optional precomputed taxonomy.

mod duck;
mod error;

pub use duck::{Capabilities, CommentPage, DuckStore, EntitySource, Export, StoreStats};
pub use error::StoreError;
