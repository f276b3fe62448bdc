//! Headless renderer for radiance-field foams.
//!
//! The rendering kernel lives in [`radiant_foam`]; this crate adds timing
//! helpers and image output for the binaries.

pub mod output;
pub mod util;

pub use radiant_foam;
