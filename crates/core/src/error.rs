// Error kinds shared by every stage of draft assembly and reconciliation.

use thiserror::Error;
use uuid::Uuid;

use crate::catalog::AssetCategory;
use crate::time::TimeRange;
use crate::track::TrackKind;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DraftError {
    #[error("invalid time format: `{0}`")]
    InvalidTimeFormat(String),

    #[error("material `{0}` not found")]
    MaterialNotFound(String),

    #[error("material id `{0}` already exists")]
    DuplicateMaterial(String),

    #[error("{kind} track `{name}` not found")]
    TrackNotFound { kind: TrackKind, name: String },

    #[error("segment {requested} overlaps existing segment {existing}")]
    OverlappingSegment { requested: TimeRange, existing: TimeRange },

    #[error("no free slot of {duration}us before the {ceiling}us placement ceiling")]
    PlacementExhausted { duration: u64, ceiling: u64 },

    #[error("unknown {category} asset `{name}`")]
    UnknownAssetName { category: AssetCategory, name: String },

    #[error("source `{source_ref}` could not be resolved: {reason}")]
    UnresolvedSource { source_ref: String, reason: String },

    #[error("schema merge failed: {0}")]
    SchemaMergeFailure(String),

    #[error("draft {0} not found")]
    DraftNotFound(Uuid),

    #[error("draft {draft} has no item {item}")]
    ItemNotFound { draft: Uuid, item: String },

    #[error("draft {0} has not been assembled")]
    NotAssembled(Uuid),
}

impl DraftError {
    /// Errors that only invalidate the item being assembled, never the
    /// whole request.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Self::OverlappingSegment { .. }
                | Self::PlacementExhausted { .. }
                | Self::UnresolvedSource { .. }
                | Self::UnknownAssetName { .. }
        )
    }
}
