// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides a linear RGBA color type.

use super::Vec4;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// A color in linear RGB space with an alpha channel.
///
/// Lighting math is only valid in linear space; conversion to sRGB happens
/// when an image leaves the pipeline.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LinearRgba {
    /// The red component.
    pub r: f32,
    /// The green component.
    pub g: f32,
    /// The blue component.
    pub b: f32,
    /// The alpha component.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a color from all four components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color.
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Converts to a `Vec4` (`r, g, b, a` -> `x, y, z, w`).
    #[inline]
    pub const fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    /// Converts from a `Vec4`.
    #[inline]
    pub const fn from_vec4(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }

    /// Encodes one linear channel to an 8-bit sRGB value.
    pub fn linear_to_srgb_u8(channel: f32) -> u8 {
        let c = channel.clamp(0.0, 1.0);
        let s = if c <= 0.003_130_8 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        };
        (s * 255.0).round() as u8
    }
}

impl Add for LinearRgba {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl Mul<f32> for LinearRgba {
    type Output = Self;
    /// Scales the RGB channels; alpha is preserved.
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.r * rhs, self.g * rhs, self.b * rhs, self.a)
    }
}

impl From<LinearRgba> for Vec4 {
    fn from(c: LinearRgba) -> Self {
        c.to_vec4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_preserves_alpha() {
        let c = LinearRgba::new(0.5, 0.25, 1.0, 0.8) * 2.0;
        assert_eq!(c, LinearRgba::new(1.0, 0.5, 2.0, 0.8));
    }

    #[test]
    fn srgb_encoding_endpoints() {
        assert_eq!(LinearRgba::linear_to_srgb_u8(0.0), 0);
        assert_eq!(LinearRgba::linear_to_srgb_u8(1.0), 255);
        assert_eq!(LinearRgba::linear_to_srgb_u8(4.0), 255);
        // Mid-grey in linear space is brighter once encoded.
        assert!(LinearRgba::linear_to_srgb_u8(0.5) > 128);
    }
}
