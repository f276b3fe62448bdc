//! Foam Store: the immutable per-frame scene buffers.

use std::ops::Range;

use glam::Vec3;
use rayon::prelude::*;

use crate::packed::{decode_harmonics, packed_words_per_cell, PackedPosition};
use crate::{FoamError, ShDegree};

/// Raw buffers a foam is assembled from.
///
/// `adjacency_end[i]` is the exclusive end of cell `i`'s range in
/// `neighbors`; cell 0 starts at offset 0 and every other cell starts where
/// its predecessor ends. `harmonics` holds `degree.num_terms()` coefficients
/// per cell, coefficient 0 being the decoded base color.
#[derive(Debug, Clone, Default)]
pub struct FoamParts {
    pub degree: ShDegree,
    pub positions: Vec<Vec3>,
    pub adjacency_end: Vec<u32>,
    pub neighbors: Vec<u32>,
    pub densities: Vec<f32>,
    pub harmonics: Vec<Vec3>,
}

/// Attributes of one cell.
#[derive(Debug, Clone, Copy)]
pub struct CellAttributes<'a> {
    pub density: f32,
    pub harmonics: &'a [Vec3],
}

/// Validated, read-only foam buffers with O(1) cell and face lookups.
#[derive(Debug, Clone)]
pub struct FoamStore {
    degree: ShDegree,
    positions: Vec<Vec3>,
    adjacency_end: Vec<u32>,
    neighbors: Vec<u32>,
    face_diffs: Vec<Vec3>,
    densities: Vec<f32>,
    harmonics: Vec<Vec3>,
}

impl FoamStore {
    /// Validate the buffers and derive face differences.
    pub fn new(parts: FoamParts) -> Result<Self, FoamError> {
        let FoamParts {
            degree,
            positions,
            adjacency_end,
            neighbors,
            densities,
            harmonics,
        } = parts;

        let n = positions.len();
        if n == 0 {
            return Err(FoamError::Empty);
        }
        check_len("adjacency offsets", n, adjacency_end.len())?;
        check_len("densities", n, densities.len())?;
        check_len("harmonic coefficients", n * degree.num_terms(), harmonics.len())?;
        validate_adjacency(&adjacency_end, &neighbors)?;

        for (cell, &density) in densities.iter().enumerate() {
            if !(density >= 0.0 && density.is_finite()) {
                return Err(FoamError::InvalidDensity { cell, density });
            }
        }

        let face_diffs = build_face_diffs(&positions, &adjacency_end, &neighbors);
        check_face_diffs(&adjacency_end, &face_diffs)?;

        log::debug!(
            "Foam store: {} cells, {} faces ({:.1} per cell), SH degree {}",
            n,
            neighbors.len(),
            neighbors.len() as f32 / n as f32,
            degree.as_u32()
        );

        Ok(Self {
            degree,
            positions,
            adjacency_end,
            neighbors,
            face_diffs,
            densities,
            harmonics,
        })
    }

    /// Assemble from GPU-layout buffers (see [`crate::packed`]).
    pub fn from_packed(
        degree: ShDegree,
        positions: &[PackedPosition],
        neighbors: Vec<u32>,
        densities: Vec<f32>,
        packed_harmonics: &[u32],
    ) -> Result<Self, FoamError> {
        let words = packed_words_per_cell(degree);
        check_len(
            "packed harmonic words",
            positions.len() * words,
            packed_harmonics.len(),
        )?;

        let mut harmonics = Vec::with_capacity(positions.len() * degree.num_terms());
        let mut scratch = Vec::with_capacity(degree.num_terms());
        for cell_words in packed_harmonics.chunks_exact(words) {
            decode_harmonics(cell_words, degree, &mut scratch);
            harmonics.extend_from_slice(&scratch);
        }

        Self::new(FoamParts {
            degree,
            positions: positions.iter().map(PackedPosition::position).collect(),
            adjacency_end: positions.iter().map(|p| p.adjacency_end).collect(),
            neighbors,
            densities,
            harmonics,
        })
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn num_faces(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn degree(&self) -> ShDegree {
        self.degree
    }

    #[inline]
    pub fn position(&self, cell: u32) -> Vec3 {
        self.positions[cell as usize]
    }

    /// Face indices `[from, to)` owned by `cell`.
    #[inline]
    pub fn adjacency_range(&self, cell: u32) -> Range<usize> {
        let cell = cell as usize;
        let from = if cell == 0 {
            0
        } else {
            self.adjacency_end[cell - 1] as usize
        };
        from..self.adjacency_end[cell] as usize
    }

    /// Cell on the far side of `face`.
    #[inline]
    pub fn neighbor(&self, face: usize) -> u32 {
        self.neighbors[face]
    }

    /// `position(neighbor) - position(owner)`: the face plane normal.
    #[inline]
    pub fn face_diff(&self, face: usize) -> Vec3 {
        self.face_diffs[face]
    }

    #[inline]
    pub fn attributes(&self, cell: u32) -> CellAttributes<'_> {
        let terms = self.degree.num_terms();
        let start = cell as usize * terms;
        CellAttributes {
            density: self.densities[cell as usize],
            harmonics: &self.harmonics[start..start + terms],
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn adjacency_ends(&self) -> &[u32] {
        &self.adjacency_end
    }

    pub fn neighbors(&self) -> &[u32] {
        &self.neighbors
    }

    pub fn densities(&self) -> &[f32] {
        &self.densities
    }

    /// All coefficients, `degree.num_terms()` per cell.
    pub fn harmonics(&self) -> &[Vec3] {
        &self.harmonics
    }

    pub fn packed_positions(&self) -> Vec<PackedPosition> {
        self.positions
            .iter()
            .zip(&self.adjacency_end)
            .map(|(&p, &end)| PackedPosition::new(p, end))
            .collect()
    }

    /// Move the generators (dynamic scenes). Topology is kept, face
    /// differences are rebuilt.
    pub fn set_positions(&mut self, positions: Vec<Vec3>) -> Result<(), FoamError> {
        check_len("positions", self.positions.len(), positions.len())?;
        let face_diffs = build_face_diffs(&positions, &self.adjacency_end, &self.neighbors);
        check_face_diffs(&self.adjacency_end, &face_diffs)?;
        self.positions = positions;
        self.face_diffs = face_diffs;
        Ok(())
    }

    /// Zero the density of the given cells, typically the unbounded cells on
    /// the convex hull. Nothing changes if any index is out of range.
    pub fn make_transparent(
        &mut self,
        cells: impl IntoIterator<Item = u32>,
    ) -> Result<(), FoamError> {
        let cells: Vec<u32> = cells.into_iter().collect();
        let cell_count = self.num_cells();
        if let Some(&cell) = cells.iter().find(|&&c| c as usize >= cell_count) {
            return Err(FoamError::BoundaryCellOutOfRange { cell, cell_count });
        }
        for &cell in &cells {
            self.densities[cell as usize] = 0.0;
        }
        log::debug!("Made {} boundary cells transparent", cells.len());
        Ok(())
    }

    /// Change the stored SH degree, dropping or zero-filling bands.
    pub fn with_degree(mut self, degree: ShDegree) -> Self {
        if degree == self.degree {
            return self;
        }
        let old = self.degree.num_terms();
        let new = degree.num_terms();
        let mut harmonics = Vec::with_capacity(self.num_cells() * new);
        for cell in self.harmonics.chunks_exact(old) {
            let keep = old.min(new);
            harmonics.extend_from_slice(&cell[..keep]);
            harmonics.extend(std::iter::repeat(Vec3::ZERO).take(new - keep));
        }
        self.harmonics = harmonics;
        self.degree = degree;
        self
    }

    /// Cell whose generator is closest to `point`. For a Voronoi foam this is
    /// the cell containing the point. Ties go to the lower index.
    pub fn nearest_cell(&self, point: Vec3) -> u32 {
        let mut best = 0usize;
        let mut best_dist = f32::INFINITY;
        for (i, p) in self.positions.iter().enumerate() {
            let d = p.distance_squared(point);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best as u32
    }

    /// Parallel [`Self::nearest_cell`], used once per frame.
    pub fn nearest_cell_par(&self, point: Vec3) -> u32 {
        self.positions
            .par_iter()
            .enumerate()
            .map(|(i, p)| (p.distance_squared(point), i))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map_or(0, |(_, i)| i as u32)
    }
}

/// Derived-buffer builder: `diff = position(neighbor) - position(owner)` for
/// every adjacency entry, one parallel pass over cells.
pub fn build_face_diffs(positions: &[Vec3], adjacency_end: &[u32], neighbors: &[u32]) -> Vec<Vec3> {
    (0..positions.len())
        .into_par_iter()
        .flat_map_iter(|cell| {
            let from = if cell == 0 {
                0
            } else {
                adjacency_end[cell - 1] as usize
            };
            let to = adjacency_end[cell] as usize;
            let origin = positions[cell];
            neighbors[from..to]
                .iter()
                .map(move |&nb| positions[nb as usize] - origin)
        })
        .collect()
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), FoamError> {
    if expected != actual {
        return Err(FoamError::LengthMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn validate_adjacency(adjacency_end: &[u32], neighbors: &[u32]) -> Result<(), FoamError> {
    let cell_count = adjacency_end.len();
    let mut prev = 0u32;
    for (cell, &end) in adjacency_end.iter().enumerate() {
        if end < prev {
            return Err(FoamError::NonMonotoneAdjacency { cell, prev, end });
        }
        if end as usize > neighbors.len() {
            return Err(FoamError::AdjacencyLengthMismatch {
                covered: end as usize,
                actual: neighbors.len(),
            });
        }
        for face in prev as usize..end as usize {
            let neighbor = neighbors[face];
            if neighbor as usize >= cell_count {
                return Err(FoamError::NeighborOutOfRange {
                    cell,
                    face,
                    neighbor,
                    cell_count,
                });
            }
        }
        prev = end;
    }

    if prev as usize != neighbors.len() {
        return Err(FoamError::AdjacencyLengthMismatch {
            covered: prev as usize,
            actual: neighbors.len(),
        });
    }
    Ok(())
}

fn check_face_diffs(adjacency_end: &[u32], face_diffs: &[Vec3]) -> Result<(), FoamError> {
    if let Some(face) = face_diffs.iter().position(|d| d.length_squared() == 0.0) {
        let cell = adjacency_end.partition_point(|&end| end as usize <= face);
        return Err(FoamError::DegenerateFace { cell, face });
    }
    Ok(())
}
