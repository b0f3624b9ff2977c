//! Error types for the tactical kernel.
//!
//! Ordinary gameplay outcomes (no path, nothing hit, no target) are
//! sentinel values on the operations themselves. Errors here are reserved
//! for contract violations by collaborators and for boundary IO.

use thiserror::Error;

use crate::geometry::Position;
use crate::unit::UnitId;

/// Result type alias using [`TacticsError`].
pub type Result<T> = std::result::Result<T, TacticsError>;

/// Top-level error type for the tactical kernel.
#[derive(Debug, Error)]
pub enum TacticsError {
    /// A tile position outside the allocated grid was handed to a mutator.
    #[error("Position {0} is outside the battlefield grid")]
    OutOfGrid(Position),

    /// Grid dimensions must all be positive.
    #[error("Invalid grid dimensions {width}x{length}x{height}")]
    InvalidDimensions {
        /// Tiles along x.
        width: i32,
        /// Tiles along y.
        length: i32,
        /// Levels along z.
        height: i32,
    },

    /// Invalid unit identifier.
    #[error("Unknown unit ID: {0}")]
    UnknownUnit(UnitId),

    /// A tile part id with no entry in the part library.
    #[error("Unknown tile part ID: {0}")]
    UnknownPart(u16),

    /// A part was assigned to a slot it does not belong to.
    #[error("Tile part '{part}' cannot occupy slot {slot}")]
    SlotMismatch {
        /// Part name.
        part: String,
        /// Slot that was requested.
        slot: String,
    },

    /// A unit could not be placed because its footprint is blocked.
    #[error("Cannot place unit {unit} at {position}: {reason}")]
    PlacementBlocked {
        /// Unit being placed.
        unit: UnitId,
        /// Requested position.
        position: Position,
        /// Why the placement failed.
        reason: String,
    },

    /// Configuration or rule data failed to parse.
    #[error("Failed to parse data: {0}")]
    DataParse(#[from] ron::error::SpannedError),

    /// Failed to read a data file.
    #[error("Failed to read data file '{path}': {message}")]
    DataRead {
        /// Path to the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },

    /// Snapshot encoding or decoding failed.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Snapshot does not match the battlefield it is applied to.
    #[error("Snapshot mismatch: expected {expected} tiles, got {actual}")]
    SnapshotMismatch {
        /// Tile count of the live grid.
        expected: usize,
        /// Tile count in the snapshot.
        actual: usize,
    },
}
