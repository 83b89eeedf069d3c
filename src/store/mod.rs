//! Persistence capability for the rule collection.

pub mod json_file;

pub use json_file::JsonFileStore;

use crate::engine::rule::Rule;
use crate::error::StoreError;

/// Durable storage for the full rule collection.
///
/// `load(save(x)) == x` must hold for any valid collection. Implementations
/// persist complete snapshots only, never partial rule objects.
pub trait RuleStore: Send + Sync {
    /// Read the full snapshot. A missing store reads as an empty collection.
    fn load(&self) -> Result<Vec<Rule>, StoreError>;

    /// Durably replace the snapshot with the given collection.
    fn save(&self, rules: &[Rule]) -> Result<(), StoreError>;
}
