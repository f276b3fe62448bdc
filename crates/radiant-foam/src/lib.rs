//! Ray traversal and volume compositing over radiance-field foams.
//!
//! A foam is a Voronoi-like cell graph: every cell has a generator
//! position, a density, SH color coefficients and a list of neighbor
//! cells. Rays walk from cell to cell through shared faces, absorbing
//! color under the Beer-Lambert law until they turn opaque or leave.
//!
//! # Example
//!
//! ```
//! use glam::{UVec3, Vec3};
//! use radiant_foam::lattice::{self, LatticeConfig};
//! use radiant_foam::{render, Camera, RenderSettings};
//!
//! let foam = lattice::build(&LatticeConfig {
//!     dims: UVec3::splat(4),
//!     seed: Some(1),
//!     ..Default::default()
//! })
//! .expect("lattice is valid");
//!
//! let camera = Camera::perspective(Vec3::new(1.4, 1.6, 1.5), Vec3::ZERO, 1.0, 1.0);
//! let settings = RenderSettings {
//!     width: 32,
//!     height: 32,
//!     ..Default::default()
//! };
//! let output = render(&foam, &camera, settings);
//! assert_eq!(output.frame.pixels.len(), 32 * 32);
//! assert_eq!(output.diagnostics.traced, 32 * 32);
//! ```

mod error;
mod ray;
mod store;

pub mod bounds;
pub mod camera;
pub mod composite;
pub mod entry;
pub mod io;
pub mod lattice;
pub mod packed;
pub mod render;
pub mod sh;
pub mod traverse;

pub use bounds::{
    decode_cell_index, encode_cell_index, BoundaryTextures, BoundingBox, BoxFace, BoxHit,
    FaceTexture,
};
pub use camera::{pixel_to_ndc, Camera, CameraModel};
pub use composite::{Accumulator, BlendMode, GammaMode};
pub use entry::{BoundaryLookup, EntryQuery, EntryStrategy, NearestCell, StartCell};
pub use error::FoamError;
pub use io::{load_foam, save_foam, FoamFile};
pub use ray::Ray;
pub use render::{
    Background, EntryMode, Frame, PixelOutcome, RenderDiagnostics, RenderOutput, RenderSettings,
    Renderer,
};
pub use sh::ShDegree;
pub use store::{build_face_diffs, CellAttributes, FoamParts, FoamStore};
pub use traverse::{trace, trace_with, Termination, TraceResult, TraceSettings, TraceStep};

/// Render one frame with the default entry mode, no bounding box and a
/// black background.
pub fn render(foam: &FoamStore, camera: &Camera, settings: RenderSettings) -> RenderOutput {
    Renderer::new(foam).with_settings(settings).render(camera)
}

/// Render one frame over `background`, optionally clipped to `bounds`.
pub fn render_with(
    foam: &FoamStore,
    camera: &Camera,
    settings: RenderSettings,
    bounds: Option<BoundingBox>,
    background: Background,
) -> RenderOutput {
    let mut renderer = Renderer::new(foam)
        .with_settings(settings)
        .with_background(background);
    renderer.bounds = bounds;
    renderer.render(camera)
}
