//! Shared type definitions and the crate error type.

use thiserror::Error;

/// Raw bit representation of a Morton key.
pub type MortonBits = u64;

/// Integer cell coordinates at a fixed level, each component in `[0, 2^level)`.
pub type GridCoordinates = [usize; 3];

/// Signed integer cell coordinates, used while applying neighborhood offsets
/// and periodicity mappings. Any negative component marks the coordinates as
/// invalid.
pub type SignedGridCoordinates = [i64; 3];

/// A neighborhood offset `(dx, dy, dz)` in grid-coordinate steps.
pub type AdjacencyOffset = [i64; 3];

/// Errors reported by the octree engine.
///
/// No failure is retriable; each operation fails fast at the boundary of the
/// misusing call.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: invalid descriptor, overlong Morton path, nonsensical
    /// CLI arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Impossible state reached through API misuse, e.g. taking the parent of
    /// the root key.
    #[error("logic error: {0}")]
    LogicError(String),

    /// Index outside its valid range: unknown neighborhood offset, child or
    /// sibling index of 8 or more, ordinal or stream index out of bounds.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Failure writing exporter output.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
