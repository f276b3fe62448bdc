//! Bounds Clipper: oriented box clipping and boundary entry textures.

use glam::{Affine3A, Quat, Vec3};

use crate::{FoamError, Ray};

/// An oriented box: `local_to_world` maps the unit cube `[-0.5, 0.5]^3`
/// onto the box.
#[derive(Clone, Copy, Debug)]
pub struct BoundingBox {
    local_to_world: Affine3A,
    world_to_local: Affine3A,
}

/// Where a ray crosses a [`BoundingBox`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxHit {
    /// World-space distance along the ray where it enters the box (0 when
    /// the origin is inside).
    pub t_enter: f32,
    /// World-space distance along the ray where it leaves the box.
    pub t_exit: f32,
    /// Entry point in box-local space, on or inside the unit cube.
    pub local_entry: Vec3,
    /// The ray starts inside the box and strikes no entry face; `local_entry`
    /// is then the origin itself.
    pub origin_inside: bool,
}

impl BoundingBox {
    pub fn new(local_to_world: Affine3A) -> Self {
        Self {
            local_to_world,
            world_to_local: local_to_world.inverse(),
        }
    }

    pub fn from_center_size_rotation(center: Vec3, size: Vec3, rotation: Quat) -> Self {
        Self::new(Affine3A::from_scale_rotation_translation(size, rotation, center))
    }

    pub fn axis_aligned(center: Vec3, size: Vec3) -> Self {
        Self::from_center_size_rotation(center, size, Quat::IDENTITY)
    }

    pub fn local_to_world(&self) -> &Affine3A {
        &self.local_to_world
    }

    pub fn world_to_local(&self) -> &Affine3A {
        &self.world_to_local
    }

    /// Slab-test the ray in local space, then measure the entry and exit
    /// distances again in world space: the box transform may scale axes
    /// unevenly, so local parameters are not world distances.
    pub fn clip(&self, ray: &Ray) -> Option<BoxHit> {
        let origin = self.world_to_local.transform_point3(ray.origin);
        let dir = self.world_to_local.transform_vector3(ray.direction);

        let inv = dir.recip();
        let t_a = (Vec3::splat(-0.5) - origin) * inv;
        let t_b = (Vec3::splat(0.5) - origin) * inv;
        // NaN (0 * inf) from axis-parallel rays on a slab plane is dropped by
        // min/max, which keep the other operand.
        let t_near = t_a.min(t_b).max_element();
        let t_far = t_a.max(t_b).min_element();

        if t_near > t_far || t_far < 0.0 || t_near.is_nan() || t_far.is_nan() {
            return None;
        }

        let origin_inside = t_near <= 0.0;
        let t_near = t_near.max(0.0);
        let local_entry = origin + dir * t_near;
        let local_exit = origin + dir * t_far;
        let entry = self.local_to_world.transform_point3(local_entry);
        let exit = self.local_to_world.transform_point3(local_exit);

        Some(BoxHit {
            t_enter: (entry - ray.origin).dot(ray.direction).max(0.0),
            t_exit: (exit - ray.origin).dot(ray.direction),
            local_entry,
            origin_inside,
        })
    }
}

/// One of the six box faces, in texture order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl BoxFace {
    pub const ALL: [BoxFace; 6] = [
        BoxFace::PosX,
        BoxFace::NegX,
        BoxFace::PosY,
        BoxFace::NegY,
        BoxFace::PosZ,
        BoxFace::NegZ,
    ];

    /// Face struck by a local-space hit position: the axis with the largest
    /// absolute component, its sign picking +/-.
    pub fn from_local_hit(p: Vec3) -> Self {
        let a = p.abs();
        if a.x >= a.y && a.x >= a.z {
            if p.x >= 0.0 {
                BoxFace::PosX
            } else {
                BoxFace::NegX
            }
        } else if a.y >= a.z {
            if p.y >= 0.0 {
                BoxFace::PosY
            } else {
                BoxFace::NegY
            }
        } else if p.z >= 0.0 {
            BoxFace::PosZ
        } else {
            BoxFace::NegZ
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn axis(self) -> usize {
        self.index() / 2
    }

    /// Texture coordinates in `[0, 1]^2`: u from local axis `(a + 1) % 3`,
    /// v from `(a + 2) % 3`.
    pub fn uv(self, p: Vec3) -> (f32, f32) {
        let a = self.axis();
        let u = p[(a + 1) % 3] + 0.5;
        let v = p[(a + 2) % 3] + 0.5;
        (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
    }
}

/// Pack a cell index into an RGB triple (red = low byte).
#[inline]
pub fn encode_cell_index(index: u32) -> [u8; 3] {
    debug_assert!(index < 1 << 24, "cell index {} exceeds 24 bits", index);
    [index as u8, (index >> 8) as u8, (index >> 16) as u8]
}

#[inline]
pub fn decode_cell_index(rgb: [u8; 3]) -> u32 {
    rgb[0] as u32 | (rgb[1] as u32) << 8 | (rgb[2] as u32) << 16
}

/// One face's lookup texture: entry cell index per texel.
#[derive(Clone, Debug)]
pub struct FaceTexture {
    pub width: u32,
    pub height: u32,
    /// Row-major, `v = 0` first.
    pub texels: Vec<[u8; 3]>,
}

impl FaceTexture {
    /// Point sample; indices must never be filtered.
    pub fn sample(&self, u: f32, v: f32) -> u32 {
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        decode_cell_index(self.texels[(y * self.width + x) as usize])
    }
}

/// Six face textures, ordered as [`BoxFace::ALL`].
#[derive(Clone, Debug)]
pub struct BoundaryTextures {
    faces: [FaceTexture; 6],
}

impl BoundaryTextures {
    pub fn new(faces: [FaceTexture; 6]) -> Result<Self, FoamError> {
        for (face, tex) in faces.iter().enumerate() {
            if tex.width == 0
                || tex.height == 0
                || tex.texels.len() != (tex.width * tex.height) as usize
            {
                return Err(FoamError::BadTexture {
                    face,
                    width: tex.width,
                    height: tex.height,
                    texels: tex.texels.len(),
                });
            }
        }
        Ok(Self { faces })
    }

    /// Bake textures by evaluating `cell_at` (local point on the face to cell
    /// index) at every texel center.
    pub fn bake(
        resolution: u32,
        mut cell_at: impl FnMut(Vec3) -> u32,
    ) -> Result<Self, FoamError> {
        if resolution == 0 {
            return Err(FoamError::BadTexture {
                face: 0,
                width: 0,
                height: 0,
                texels: 0,
            });
        }
        let faces = BoxFace::ALL.map(|face| {
            let a = face.axis();
            let sign = if face.index() % 2 == 0 { 0.5 } else { -0.5 };
            let mut texels = Vec::with_capacity((resolution * resolution) as usize);
            for y in 0..resolution {
                for x in 0..resolution {
                    let mut p = Vec3::ZERO;
                    p[a] = sign;
                    p[(a + 1) % 3] = (x as f32 + 0.5) / resolution as f32 - 0.5;
                    p[(a + 2) % 3] = (y as f32 + 0.5) / resolution as f32 - 0.5;
                    texels.push(encode_cell_index(cell_at(p)));
                }
            }
            FaceTexture {
                width: resolution,
                height: resolution,
                texels,
            }
        });
        Ok(Self { faces })
    }

    pub fn face(&self, face: BoxFace) -> &FaceTexture {
        &self.faces[face.index()]
    }

    /// Entry cell for a local-space hit on the box surface.
    pub fn lookup(&self, local_hit: Vec3) -> u32 {
        let face = BoxFace::from_local_hit(local_hit);
        let (u, v) = face.uv(local_hit);
        self.face(face).sample(u, v)
    }
}
