//! Packed buffer layouts shared with GPU-side consumers of foam data.
//!
//! Positions travel as `vec4`s whose fourth lane carries the cell's
//! adjacency end offset reinterpreted as float bits. Harmonics travel as
//! `1 + 2 * (terms - 1)` u32 words per cell:
//!
//! | word      | contents                                   |
//! |-----------|--------------------------------------------|
//! | 0         | base color bytes `r \| g << 8 \| b << 16`    |
//! | 2k - 1    | `f16(r_k) \| f16(g_k) << 16`                 |
//! | 2k        | `f16(b_k)` (upper half zero)                |
//!
//! for SH terms `k = 1..terms`. Base color bytes decode as `byte / 255 - 0.5`.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::ShDegree;

/// One cell position in GPU layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PackedPosition {
    pub xyz: [f32; 3],
    /// Exclusive end of this cell's adjacency range.
    pub adjacency_end: u32,
}

impl PackedPosition {
    pub fn new(position: Vec3, adjacency_end: u32) -> Self {
        Self {
            xyz: position.to_array(),
            adjacency_end,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.xyz)
    }

    /// The same data viewed as a `vec4` with the offset in `w` as raw bits.
    pub fn to_vec4_bits(self) -> [f32; 4] {
        [
            self.xyz[0],
            self.xyz[1],
            self.xyz[2],
            f32::from_bits(self.adjacency_end),
        ]
    }

    pub fn from_vec4_bits(v: [f32; 4]) -> Self {
        Self {
            xyz: [v[0], v[1], v[2]],
            adjacency_end: v[3].to_bits(),
        }
    }
}

/// Number of u32 words one cell's harmonics occupy.
#[inline]
pub fn packed_words_per_cell(degree: ShDegree) -> usize {
    1 + 2 * (degree.num_terms() - 1)
}

/// Pack one cell's coefficients. `coeffs[0]` is the decoded base color.
pub fn encode_harmonics(coeffs: &[Vec3], degree: ShDegree, out: &mut Vec<u32>) {
    let terms = degree.num_terms();
    debug_assert_eq!(coeffs.len(), terms);

    let [r, g, b] = encode_base_color(coeffs[0]);
    out.push(r as u32 | (g as u32) << 8 | (b as u32) << 16);

    for c in &coeffs[1..terms] {
        out.push(f32_to_f16(c.x) as u32 | (f32_to_f16(c.y) as u32) << 16);
        out.push(f32_to_f16(c.z) as u32);
    }
}

/// Unpack one cell's words into `out` (cleared first).
pub fn decode_harmonics(words: &[u32], degree: ShDegree, out: &mut Vec<Vec3>) {
    debug_assert_eq!(words.len(), packed_words_per_cell(degree));
    out.clear();

    let base = words[0];
    out.push(decode_base_color([
        (base & 0xff) as u8,
        (base >> 8 & 0xff) as u8,
        (base >> 16 & 0xff) as u8,
    ]));

    for pair in words[1..].chunks_exact(2) {
        out.push(Vec3::new(
            f16_to_f32(pair[0] as u16),
            f16_to_f32((pair[0] >> 16) as u16),
            f16_to_f32(pair[1] as u16),
        ));
    }
}

/// Quantize a decoded base color (`c in [-0.5, 0.5]`) to bytes.
pub fn encode_base_color(c: Vec3) -> [u8; 3] {
    let q = |v: f32| ((v + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;
    [q(c.x), q(c.y), q(c.z)]
}

#[inline]
pub fn decode_base_color(bytes: [u8; 3]) -> Vec3 {
    Vec3::new(bytes[0] as f32, bytes[1] as f32, bytes[2] as f32) / 255.0 - Vec3::splat(0.5)
}

/// IEEE 754 binary16 to f32. Exact for every input.
pub fn f16_to_f32(h: u16) -> f32 {
    let sign = ((h as u32) & 0x8000) << 16;
    let exp = (h >> 10) & 0x1f;
    let mant = (h & 0x3ff) as u32;

    match exp {
        0 => {
            // Zero or subnormal: mant * 2^-24.
            let magnitude = mant as f32 * f32::from_bits(0x3380_0000);
            f32::from_bits(sign | magnitude.to_bits())
        }
        0x1f => f32::from_bits(sign | 0x7f80_0000 | mant << 13),
        _ => f32::from_bits(sign | ((exp as u32 + 112) << 23) | mant << 13),
    }
}

/// f32 to IEEE 754 binary16, round to nearest even. Overflow saturates to
/// infinity, NaN stays NaN.
pub fn f32_to_f16(v: f32) -> u16 {
    let bits = v.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mant = bits & 0x7f_ffff;

    if exp == 0xff {
        let nan = if mant != 0 { 0x200 } else { 0 };
        return sign | 0x7c00 | nan;
    }

    let e = exp - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }

    if e <= 0 {
        if e < -10 {
            return sign;
        }
        let m = mant | 0x80_0000;
        let shift = (14 - e) as u32;
        let mut half = m >> shift;
        let rem = m & ((1 << shift) - 1);
        let halfway = 1 << (shift - 1);
        if rem > halfway || (rem == halfway && half & 1 == 1) {
            half += 1;
        }
        return sign | half as u16;
    }

    let mut half = ((e as u32) << 10) | (mant >> 13);
    let rem = mant & 0x1fff;
    if rem > 0x1000 || (rem == 0x1000 && half & 1 == 1) {
        // A carry out of the mantissa bumps the exponent, possibly to inf.
        half += 1;
    }
    sign | half as u16
}
