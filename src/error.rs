use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning a dataset on disk into a feature collection.
#[derive(Debug, Error)]
pub enum DataError {
    /// Missing, unreadable or corrupt input (including an unusable `.prj`).
    #[error("failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The dataset holds something other than point geometries.
    #[error("unexpected geometry in {path:?}: expected points, found {found}")]
    Schema { path: PathBuf, found: String },
}

impl DataError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DataError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(path: impl Into<PathBuf>, found: impl ToString) -> Self {
        DataError::Schema {
            path: path.into(),
            found: found.to_string(),
        }
    }
}
