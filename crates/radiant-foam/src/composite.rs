//! Compositor: Beer-Lambert absorption and the final blend with the
//! background.

use glam::{Vec3, Vec4, Vec4Swizzles};

/// Exponent of the display transfer curve.
pub const GAMMA: f32 = 2.2;

/// When stored (display-space) colors are linearized.
///
/// The two linearizing conventions agree on fully opaque single cells but
/// differ under partial occlusion: `PerStep` averages linear colors, `Final`
/// averages display colors and linearizes the mix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GammaMode {
    /// `pow(rgb, 2.2)` on every shaded color before accumulation.
    #[default]
    PerStep,
    /// `pow(sum, 2.2)` once on the accumulated color.
    Final,
    /// No conversion anywhere; colors stay in stored space.
    Off,
}

impl GammaMode {
    #[inline]
    pub fn step_color(self, rgb: Vec3) -> Vec3 {
        match self {
            GammaMode::PerStep => rgb.powf(GAMMA),
            GammaMode::Final | GammaMode::Off => rgb,
        }
    }

    #[inline]
    pub fn finish_color(self, rgb: Vec3) -> Vec3 {
        match self {
            GammaMode::Final => rgb.powf(GAMMA),
            GammaMode::PerStep | GammaMode::Off => rgb,
        }
    }

    /// Display-space color to the space the compositor blends in.
    #[inline]
    pub fn decode_display(self, rgb: Vec3) -> Vec3 {
        match self {
            GammaMode::Off => rgb,
            _ => rgb.max(Vec3::ZERO).powf(GAMMA),
        }
    }

    /// Blend-space color back to display space.
    #[inline]
    pub fn encode_display(self, rgb: Vec3) -> Vec3 {
        match self {
            GammaMode::Off => rgb,
            _ => rgb.max(Vec3::ZERO).powf(1.0 / GAMMA),
        }
    }
}

/// How residual transmittance reveals the background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// `lerp(color, background, T)`.
    #[default]
    Lerp,
    /// Premultiplied under: `color + background * T`.
    Under,
}

/// Running color and transmittance of one ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Accumulator {
    pub color: Vec3,
    pub transmittance: f32,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            color: Vec3::ZERO,
            transmittance: 1.0,
        }
    }
}

impl Accumulator {
    /// Absorb a segment of `length` through a medium of `density` emitting
    /// `rgb`. Returns the segment's alpha.
    #[inline]
    pub fn absorb(&mut self, density: f32, length: f32, rgb: Vec3) -> f32 {
        let alpha = 1.0 - (-density * length.max(0.0)).exp();
        let weight = self.transmittance * alpha;
        self.color += rgb * weight;
        self.transmittance *= 1.0 - alpha;
        alpha
    }

    /// Final pixel over `background` (RGBA, blend space). Alpha is the
    /// coverage of the volume over the background's own coverage.
    pub fn resolve(&self, background: Vec4, gamma: GammaMode, blend: BlendMode) -> Vec4 {
        let t = self.transmittance;
        let color = gamma.finish_color(self.color);
        let bg = background.xyz();
        let rgb = match blend {
            BlendMode::Lerp => color.lerp(bg, t),
            BlendMode::Under => color + bg * t,
        };
        rgb.extend(1.0 - t * (1.0 - background.w))
    }
}
