//! Ray Generator: one world-space ray per pixel.

use glam::{Mat4, Vec2, Vec3};

use crate::Ray;

/// How normalized device coordinates map to view directions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraModel {
    /// Standard unprojection through the inverse projection matrix.
    Perspective,
    /// Equidistant fisheye: the off-axis angle grows linearly with `|ndc|`
    /// and equals `fov_degrees` on the unit NDC circle. Directions at or
    /// beyond 180 degrees off-axis have no ray.
    Fisheye { fov_degrees: f32 },
}

/// Camera pose and projection, right-handed, looking down -Z in view space.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
    pub model: CameraModel,
}

impl Camera {
    /// Perspective camera at `eye` looking at `target`.
    pub fn perspective(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32) -> Self {
        Self {
            camera_to_world: Mat4::look_at_rh(eye, target, up_for(eye, target)).inverse(),
            inverse_projection: Mat4::perspective_rh(fov_y, aspect, 0.01, 1000.0).inverse(),
            model: CameraModel::Perspective,
        }
    }

    /// Fisheye camera at `eye` looking at `target`.
    pub fn fisheye(eye: Vec3, target: Vec3, fov_degrees: f32) -> Self {
        Self {
            camera_to_world: Mat4::look_at_rh(eye, target, up_for(eye, target)).inverse(),
            inverse_projection: Mat4::IDENTITY,
            model: CameraModel::Fisheye { fov_degrees },
        }
    }

    /// Camera position in world space.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.camera_to_world.w_axis.truncate()
    }

    /// View-space direction for `ndc`, or zero outside the fisheye cone.
    pub fn view_direction(&self, ndc: Vec2) -> Vec3 {
        match self.model {
            CameraModel::Perspective => {
                // Near-plane point of the pixel; the camera sits at the view origin.
                self.inverse_projection
                    .project_point3(Vec3::new(ndc.x, ndc.y, 0.0))
            }
            CameraModel::Fisheye { fov_degrees } => {
                let phi = ndc.length() * fov_degrees / 360.0 * std::f32::consts::TAU;
                if phi >= std::f32::consts::PI {
                    return Vec3::ZERO;
                }
                let theta = ndc.y.atan2(ndc.x);
                let (sin_phi, cos_phi) = phi.sin_cos();
                Vec3::new(sin_phi * theta.cos(), sin_phi * theta.sin(), -cos_phi)
            }
        }
    }

    /// World-space ray for `ndc`. `None` means the pixel has no ray and must
    /// show the background unchanged.
    pub fn ray(&self, ndc: Vec2) -> Option<Ray> {
        let dir = self
            .camera_to_world
            .transform_vector3(self.view_direction(ndc));
        Ray::new(self.origin(), dir)
    }
}

/// NDC of a pixel center, +Y up.
#[inline]
pub fn pixel_to_ndc(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    Vec2::new(
        (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
        1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
    )
}

fn up_for(eye: Vec3, target: Vec3) -> Vec3 {
    let forward = (target - eye).normalize_or_zero();
    if forward.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}
