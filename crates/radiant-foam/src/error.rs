use thiserror::Error;

/// Errors raised while building or loading a foam.
///
/// Everything past construction is infallible: the traversal relies on the
/// invariants checked here instead of re-validating per pixel.
#[derive(Debug, Error)]
pub enum FoamError {
    #[error("foam has no cells")]
    Empty,

    #[error("cell {cell}: adjacency end offset {end} is below the previous end {prev}")]
    NonMonotoneAdjacency { cell: usize, prev: u32, end: u32 },

    #[error("adjacency offsets cover {covered} entries but {actual} neighbor indices were given")]
    AdjacencyLengthMismatch { covered: usize, actual: usize },

    #[error("face {face} of cell {cell} points at cell {neighbor}, but only {cell_count} cells exist")]
    NeighborOutOfRange {
        cell: usize,
        face: usize,
        neighbor: u32,
        cell_count: usize,
    },

    #[error("face {face} of cell {cell} has a zero-length difference vector (coincident generators)")]
    DegenerateFace { cell: usize, face: usize },

    #[error("expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cell {cell} has invalid density {density}")]
    InvalidDensity { cell: usize, density: f32 },

    #[error("unsupported SH degree {0} (expected 0..=3)")]
    UnsupportedShDegree(u32),

    #[error("boundary texture face {face} is {width}x{height} but holds {texels} texels")]
    BadTexture {
        face: usize,
        width: u32,
        height: u32,
        texels: usize,
    },

    #[error("boundary cell {cell} is out of range ({cell_count} cells)")]
    BoundaryCellOutOfRange { cell: u32, cell_count: usize },

    #[error("failed to read or write foam file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse foam file: {0}")]
    Json(#[from] serde_json::Error),
}
