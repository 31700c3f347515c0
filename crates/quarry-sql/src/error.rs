//! Error types for query building.

/// Errors reported while assembling a query plan.
///
/// Compilation of a structurally valid plan never fails; these errors are
/// raised by the chaining call that would have produced an invalid plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A builder call was missing a required argument.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for query building.
pub type Result<T> = std::result::Result<T, BuildError>;
