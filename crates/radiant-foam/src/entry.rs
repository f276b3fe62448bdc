//! Entry-cell strategies: which cell a ray starts its walk in.
//!
//! The traversal only needs a cell containing the ray's entry point; how it
//! is found is pluggable.

use glam::Vec3;

use crate::{BoundaryTextures, BoxHit, FoamStore, Ray};

/// Everything a strategy may consult for one ray.
#[derive(Clone, Copy, Debug)]
pub struct EntryQuery<'a> {
    pub ray: &'a Ray,
    /// Distance along the ray where traversal begins.
    pub t_enter: f32,
    /// Present when a bounding box clipped the ray.
    pub box_hit: Option<&'a BoxHit>,
}

impl EntryQuery<'_> {
    #[inline]
    pub fn entry_point(&self) -> Vec3 {
        self.ray.at(self.t_enter)
    }
}

pub trait EntryStrategy: Sync {
    fn entry_cell(&self, foam: &FoamStore, query: &EntryQuery<'_>) -> u32;
}

/// The same precomputed cell for every ray (the cell containing the camera).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartCell(pub u32);

impl EntryStrategy for StartCell {
    #[inline]
    fn entry_cell(&self, _foam: &FoamStore, _query: &EntryQuery<'_>) -> u32 {
        self.0
    }
}

/// Linear scan for the generator nearest to the entry point.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestCell;

impl EntryStrategy for NearestCell {
    fn entry_cell(&self, foam: &FoamStore, query: &EntryQuery<'_>) -> u32 {
        foam.nearest_cell(query.entry_point())
    }
}

/// Box-face texture lookup, falling back to a fixed cell for rays that were
/// not clipped by a box or that start inside it.
#[derive(Clone, Copy, Debug)]
pub struct BoundaryLookup<'a> {
    pub textures: &'a BoundaryTextures,
    pub fallback: u32,
}

impl EntryStrategy for BoundaryLookup<'_> {
    fn entry_cell(&self, foam: &FoamStore, query: &EntryQuery<'_>) -> u32 {
        match query.box_hit {
            Some(hit) if !hit.origin_inside => {
                let cell = self.textures.lookup(hit.local_entry);
                // Stale textures must not send the walk out of bounds.
                if (cell as usize) < foam.num_cells() {
                    cell
                } else {
                    self.fallback
                }
            }
            _ => self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{self, LatticeConfig};
    use crate::BoundingBox;
    use glam::UVec3;

    #[test]
    fn test_nearest_cell_finds_containing_lattice_cell() {
        let foam = lattice::build(&LatticeConfig {
            dims: UVec3::new(4, 3, 2),
            ..Default::default()
        })
        .unwrap();
        let ray = Ray::new(Vec3::new(2.2, 1.1, 0.9), Vec3::X).unwrap();
        let query = EntryQuery {
            ray: &ray,
            t_enter: 0.5,
            box_hit: None,
        };
        let cell = NearestCell.entry_cell(&foam, &query);
        assert_eq!(lattice::cell_index(UVec3::new(4, 3, 2), UVec3::new(3, 1, 1)), cell);
    }

    #[test]
    fn test_boundary_lookup_uses_box_hit() {
        let foam = lattice::build(&LatticeConfig::default()).unwrap();
        let bbox = BoundingBox::axis_aligned(Vec3::ZERO, Vec3::ONE);
        let textures = BoundaryTextures::bake(2, |_| 5).unwrap();
        let lookup = BoundaryLookup {
            textures: &textures,
            fallback: 1,
        };
        let ray = Ray::new(Vec3::new(-3.0, 0.1, 0.1), Vec3::X).unwrap();
        let hit = bbox.clip(&ray).unwrap();
        let clipped = EntryQuery {
            ray: &ray,
            t_enter: hit.t_enter,
            box_hit: Some(&hit),
        };
        assert_eq!(lookup.entry_cell(&foam, &clipped), 5);

        let unclipped = EntryQuery {
            ray: &ray,
            t_enter: 0.0,
            box_hit: None,
        };
        assert_eq!(lookup.entry_cell(&foam, &unclipped), 1);
    }

    #[test]
    fn test_boundary_lookup_ignores_textures_from_inside_the_box() {
        let foam = lattice::build(&LatticeConfig::default()).unwrap();
        let bbox = BoundingBox::axis_aligned(Vec3::splat(1.5), Vec3::splat(4.0));
        let textures = BoundaryTextures::bake(2, |_| 5).unwrap();
        let lookup = BoundaryLookup {
            textures: &textures,
            fallback: 3,
        };
        let ray = Ray::new(Vec3::new(1.2, 1.4, 1.6), Vec3::X).unwrap();
        let hit = bbox.clip(&ray).unwrap();
        let query = EntryQuery {
            ray: &ray,
            t_enter: hit.t_enter,
            box_hit: Some(&hit),
        };
        assert_eq!(lookup.entry_cell(&foam, &query), 3, "camera inside uses the fallback");
    }

    #[test]
    fn test_boundary_lookup_rejects_out_of_range_cells() {
        let foam = lattice::build(&LatticeConfig::default()).unwrap();
        let bbox = BoundingBox::axis_aligned(Vec3::ZERO, Vec3::ONE);
        let textures = BoundaryTextures::bake(1, |_| 1 << 20).unwrap();
        let lookup = BoundaryLookup {
            textures: &textures,
            fallback: 2,
        };
        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::NEG_Z).unwrap();
        let hit = bbox.clip(&ray).unwrap();
        let query = EntryQuery {
            ray: &ray,
            t_enter: hit.t_enter,
            box_hit: Some(&hit),
        };
        assert_eq!(lookup.entry_cell(&foam, &query), 2);
    }
}
