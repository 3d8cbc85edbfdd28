use thiserror::Error;

use crate::geometry::Rect;
use crate::shroud::SourceKey;

#[derive(Debug, Error)]
pub enum ShroudError {
    #[error("shroud source {key:?} is already registered")]
    DuplicateSource { key: SourceKey },
    #[error("map bounds do not match: {ours:?} vs {theirs:?}")]
    BoundsMismatch { ours: Rect, theirs: Rect },
    #[error("snapshot encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
