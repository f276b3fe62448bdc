//! Real spherical harmonics for view-dependent cell color.
//!
//! Coefficient 0 is the base color and is weighted by 1 instead of the
//! true `Y_0^0` constant; the decode offset of the packed base color
//! (`byte / 255 - 0.5`) is undone by the +0.5 bias in [`shade`], so a cell
//! with no directional terms reproduces its stored color exactly.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::FoamError;

const C1: f32 = 0.488_602_5;
const C2: [f32; 5] = [
    1.092_548_4,
    -1.092_548_4,
    0.315_391_57,
    -1.092_548_4,
    0.546_274_2,
];
const C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_33,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];

/// Maximum number of SH terms (degree 3).
pub const MAX_SH_TERMS: usize = 16;

/// Highest SH band stored per cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ShDegree {
    /// Base color only, no view dependence.
    #[default]
    Zero,
    One,
    Two,
    Three,
}

impl ShDegree {
    pub fn from_u32(degree: u32) -> Result<Self, FoamError> {
        match degree {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            d => Err(FoamError::UnsupportedShDegree(d)),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    /// Number of coefficients per color channel: `(L + 1)^2`.
    #[inline]
    pub fn num_terms(self) -> usize {
        let l = self.as_u32() as usize + 1;
        l * l
    }
}

impl TryFrom<u32> for ShDegree {
    type Error = FoamError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value)
    }
}

impl From<ShDegree> for u32 {
    fn from(value: ShDegree) -> Self {
        value.as_u32()
    }
}

/// SH basis values for one direction.
///
/// The direction is constant along a ray, so the basis is evaluated once per
/// pixel and reused for every cell the ray visits.
#[derive(Clone, Copy, Debug)]
pub struct ShBasis {
    values: [f32; MAX_SH_TERMS],
    terms: usize,
}

impl ShBasis {
    pub fn new(dir: Vec3, degree: ShDegree) -> Self {
        let mut values = [0.0; MAX_SH_TERMS];
        let terms = degree.num_terms();
        values[0] = 1.0;

        if terms > 1 {
            let Vec3 { x, y, z } = dir;
            values[1] = -C1 * y;
            values[2] = C1 * z;
            values[3] = -C1 * x;

            if terms > 4 {
                let (xx, yy, zz) = (x * x, y * y, z * z);
                let (xy, yz, xz) = (x * y, y * z, x * z);
                values[4] = C2[0] * xy;
                values[5] = C2[1] * yz;
                values[6] = C2[2] * (2.0 * zz - xx - yy);
                values[7] = C2[3] * xz;
                values[8] = C2[4] * (xx - yy);

                if terms > 9 {
                    values[9] = C3[0] * y * (3.0 * xx - yy);
                    values[10] = C3[1] * xy * z;
                    values[11] = C3[2] * y * (4.0 * zz - xx - yy);
                    values[12] = C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy);
                    values[13] = C3[4] * x * (4.0 * zz - xx - yy);
                    values[14] = C3[5] * z * (xx - yy);
                    values[15] = C3[6] * x * (xx - 3.0 * yy);
                }
            }
        }

        Self { values, terms }
    }

    #[inline]
    pub fn terms(&self) -> usize {
        self.terms
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values[..self.terms]
    }
}

/// Shade one cell: `max(0, 0.5 + sum(coeff_i * basis_i))`.
///
/// `coeffs[0]` is the decoded base color (already offset by -0.5). Extra
/// coefficients beyond the basis degree are ignored, missing ones count as
/// zero.
#[inline]
pub fn shade(coeffs: &[Vec3], basis: &ShBasis) -> Vec3 {
    let mut rgb = Vec3::splat(0.5);
    for (c, &b) in coeffs.iter().zip(basis.values()) {
        rgb += *c * b;
    }
    rgb.max(Vec3::ZERO)
}

/// Convenience for one-off evaluations; the renderer uses [`ShBasis`].
pub fn shade_direction(coeffs: &[Vec3], dir: Vec3, degree: ShDegree) -> Vec3 {
    shade(coeffs, &ShBasis::new(dir, degree))
}
