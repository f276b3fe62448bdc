//! Synthetic cubic-lattice foams for demos, benchmarks and tests.
//!
//! The Voronoi diagram of a cubic lattice is a grid of cubes, so the
//! adjacency is exactly the six axis neighbors of each generator.

use glam::{UVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{FoamError, FoamParts, FoamStore, ShDegree};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeConfig {
    pub dims: UVec3,
    pub spacing: f32,
    /// Position of cell (0, 0, 0).
    pub origin: Vec3,
    pub density: f32,
    /// Random densities and colors when set; a coordinate gradient otherwise.
    pub seed: Option<u64>,
    pub degree: ShDegree,
    /// Zero the density of every cell on the outer shell.
    pub transparent_shell: bool,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            dims: UVec3::splat(4),
            spacing: 1.0,
            origin: Vec3::ZERO,
            density: 1.0,
            seed: None,
            degree: ShDegree::Zero,
            transparent_shell: false,
        }
    }
}

impl LatticeConfig {
    pub fn num_cells(&self) -> usize {
        (self.dims.x * self.dims.y * self.dims.z) as usize
    }

    /// Center of the generator grid.
    pub fn center(&self) -> Vec3 {
        self.origin + (self.dims.as_vec3() - 1.0) * 0.5 * self.spacing
    }
}

/// Linear index of lattice coordinate `coord`, x fastest.
#[inline]
pub fn cell_index(dims: UVec3, coord: UVec3) -> u32 {
    coord.x + dims.x * (coord.y + dims.y * coord.z)
}

#[inline]
fn cell_coord(dims: UVec3, index: u32) -> UVec3 {
    UVec3::new(
        index % dims.x,
        (index / dims.x) % dims.y,
        index / (dims.x * dims.y),
    )
}

/// Indices of cells on the outer shell, ascending.
pub fn shell_cells(dims: UVec3) -> Vec<u32> {
    let on_shell = |c: u32, n: u32| c == 0 || c + 1 == n;
    (0..dims.x * dims.y * dims.z)
        .filter(|&i| {
            let c = cell_coord(dims, i);
            on_shell(c.x, dims.x) || on_shell(c.y, dims.y) || on_shell(c.z, dims.z)
        })
        .collect()
}

/// Build a lattice foam styled by `config`.
pub fn build(config: &LatticeConfig) -> Result<FoamStore, FoamError> {
    match config.seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            build_with(config, |_, coeffs| {
                let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
                coeffs[0] = color - 0.5;
                for c in &mut coeffs[1..] {
                    *c = Vec3::new(
                        rng.gen_range(-0.1..0.1),
                        rng.gen_range(-0.1..0.1),
                        rng.gen_range(-0.1..0.1),
                    );
                }
                config.density * rng.gen_range(0.5..1.5)
            })
        }
        None => {
            let extent = (config.dims.max(UVec3::splat(2)) - 1).as_vec3();
            build_with(config, |coord, coeffs| {
                coeffs[0] = coord.as_vec3() / extent - 0.5;
                config.density
            })
        }
    }
}

/// Build a lattice foam; `style(coord, coeffs)` fills a cell's SH
/// coefficients (zeroed, coefficient 0 is `color - 0.5`) and returns its
/// density.
pub fn build_with(
    config: &LatticeConfig,
    mut style: impl FnMut(UVec3, &mut [Vec3]) -> f32,
) -> Result<FoamStore, FoamError> {
    let dims = config.dims;
    let n = config.num_cells();
    let terms = config.degree.num_terms();

    let mut positions = Vec::with_capacity(n);
    let mut adjacency_end = Vec::with_capacity(n);
    let mut neighbors = Vec::with_capacity(n * 6);
    let mut densities = Vec::with_capacity(n);
    let mut harmonics = vec![Vec3::ZERO; n * terms];

    for (i, coeffs) in (0..n as u32).zip(harmonics.chunks_exact_mut(terms)) {
        let c = cell_coord(dims, i);
        positions.push(config.origin + c.as_vec3() * config.spacing);

        if c.x > 0 {
            neighbors.push(i - 1);
        }
        if c.x + 1 < dims.x {
            neighbors.push(i + 1);
        }
        if c.y > 0 {
            neighbors.push(i - dims.x);
        }
        if c.y + 1 < dims.y {
            neighbors.push(i + dims.x);
        }
        if c.z > 0 {
            neighbors.push(i - dims.x * dims.y);
        }
        if c.z + 1 < dims.z {
            neighbors.push(i + dims.x * dims.y);
        }
        adjacency_end.push(neighbors.len() as u32);

        densities.push(style(c, coeffs));
    }

    let mut foam = FoamStore::new(FoamParts {
        degree: config.degree,
        positions,
        adjacency_end,
        neighbors,
        densities,
        harmonics,
    })?;
    if config.transparent_shell {
        foam.make_transparent(shell_cells(dims))?;
    }
    Ok(foam)
}
