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

//! Defines texture formats, descriptors, handles and the texel codec.

use crate::math::{Extent2D, Vec4};
use half::f16;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The pixel formats a render target can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// One 8-bit normalized channel. Used for light-volume masks.
    R8Unorm,
    /// Four 8-bit normalized channels.
    Rgba8Unorm,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// One 32-bit float depth channel.
    Depth32Float,
}

impl TextureFormat {
    /// Returns the size in bytes of one texel.
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Depth32Float => 4,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    /// Quantizes `value` into the texel bytes of this format.
    ///
    /// `out` must be exactly [`Self::bytes_per_pixel`] long. Normalized formats
    /// saturate; single-channel formats store `value.x`.
    pub fn encode(&self, value: Vec4, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.bytes_per_pixel());
        match self {
            TextureFormat::R8Unorm => out[0] = unorm8(value.x),
            TextureFormat::Rgba8Unorm => {
                out[0] = unorm8(value.x);
                out[1] = unorm8(value.y);
                out[2] = unorm8(value.z);
                out[3] = unorm8(value.w);
            }
            TextureFormat::Rgba16Float => {
                for (i, c) in [value.x, value.y, value.z, value.w].into_iter().enumerate() {
                    out[i * 2..i * 2 + 2].copy_from_slice(&f16::from_f32(c).to_le_bytes());
                }
            }
            TextureFormat::Rgba32Float => {
                for (i, c) in [value.x, value.y, value.z, value.w].into_iter().enumerate() {
                    out[i * 4..i * 4 + 4].copy_from_slice(&c.to_le_bytes());
                }
            }
            TextureFormat::Depth32Float => out.copy_from_slice(&value.x.to_le_bytes()),
        }
    }

    /// Expands texel bytes of this format to a `Vec4`.
    ///
    /// Single-channel formats decode as `(r, 0, 0, 1)`.
    pub fn decode(&self, texel: &[u8]) -> Vec4 {
        debug_assert_eq!(texel.len(), self.bytes_per_pixel());
        match self {
            TextureFormat::R8Unorm => Vec4::new(texel[0] as f32 / 255.0, 0.0, 0.0, 1.0),
            TextureFormat::Rgba8Unorm => Vec4::new(
                texel[0] as f32 / 255.0,
                texel[1] as f32 / 255.0,
                texel[2] as f32 / 255.0,
                texel[3] as f32 / 255.0,
            ),
            TextureFormat::Rgba16Float => {
                let c = |i: usize| f16::from_le_bytes([texel[i * 2], texel[i * 2 + 1]]).to_f32();
                Vec4::new(c(0), c(1), c(2), c(3))
            }
            TextureFormat::Rgba32Float => {
                let c = |i: usize| {
                    f32::from_le_bytes([
                        texel[i * 4],
                        texel[i * 4 + 1],
                        texel[i * 4 + 2],
                        texel[i * 4 + 3],
                    ])
                };
                Vec4::new(c(0), c(1), c(2), c(3))
            }
            TextureFormat::Depth32Float => Vec4::new(
                f32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]),
                0.0,
                0.0,
                1.0,
            ),
        }
    }
}

fn unorm8(v: f32) -> u8 {
    // NaN saturates to 0.
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// An opaque handle to a texture owned by a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// The identity of a texture allocation for reuse purposes.
///
/// Two textures with equal keys are interchangeable as render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    /// The texture extent in pixels.
    pub size: Extent2D,
    /// The texel format.
    pub format: TextureFormat,
}

impl TextureKey {
    /// Creates a new key.
    pub const fn new(size: Extent2D, format: TextureFormat) -> Self {
        Self { size, format }
    }
}

/// A descriptor used to create a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The texture extent in pixels.
    pub size: Extent2D,
    /// The texel format.
    pub format: TextureFormat,
}

impl<'a> TextureDescriptor<'a> {
    /// Creates a descriptor for the given key.
    pub fn from_key(label: impl Into<Cow<'a, str>>, key: TextureKey) -> Self {
        Self {
            label: Some(label.into()),
            size: key.size,
            format: key.format,
        }
    }

    /// Returns the reuse key of this descriptor.
    pub fn key(&self) -> TextureKey {
        TextureKey::new(self.size, self.format)
    }

    /// Converts the label into an owned string, detaching the lifetime.
    pub fn into_owned(self) -> TextureDescriptor<'static> {
        TextureDescriptor {
            label: self.label.map(|l| Cow::Owned(l.into_owned())),
            size: self.size,
            format: self.format,
        }
    }

    /// Returns the number of bytes a tightly packed copy of the texture takes.
    pub fn byte_len(&self) -> usize {
        self.size.pixel_count() * self.format.bytes_per_pixel()
    }
}

/// A CPU-side copy of a texture's contents.
///
/// Returned by [`GraphicsDevice::read_texture`](crate::renderer::GraphicsDevice::read_texture)
/// for debug viewers, image export and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureReadback {
    /// The extent of the copied texture.
    pub size: Extent2D,
    /// The format of the copied texture.
    pub format: TextureFormat,
    /// Tightly packed rows, top row first.
    pub data: Vec<u8>,
}

impl TextureReadback {
    /// Decodes the texel at (`x`, `y`), with `y = 0` being the top row.
    ///
    /// # Panics
    /// Panics if the coordinates are outside the texture.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        assert!(x < self.size.width && y < self.size.height);
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.size.width as usize + x as usize) * bpp;
        self.format.decode(&self.data[offset..offset + bpp])
    }

    /// Iterates over every texel in row-major order as `(x, y, value)`.
    pub fn texels(&self) -> impl Iterator<Item = (u32, u32, Vec4)> + '_ {
        let width = self.size.width;
        let bpp = self.format.bytes_per_pixel();
        self.data.chunks_exact(bpp).enumerate().map(move |(i, t)| {
            let i = i as u32;
            (i % width, i / width, self.format.decode(t))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(format: TextureFormat, v: Vec4) -> Vec4 {
        let mut buf = vec![0u8; format.bytes_per_pixel()];
        format.encode(v, &mut buf);
        format.decode(&buf)
    }

    #[test]
    fn unorm_formats_saturate_and_quantize() {
        let v = roundtrip(TextureFormat::Rgba8Unorm, Vec4::new(-1.0, 0.5, 2.0, 1.0));
        assert_eq!(v.x, 0.0);
        assert_eq!(v.y, 128.0 / 255.0);
        assert_eq!(v.z, 1.0);
    }

    #[test]
    fn r8_decodes_as_red_only() {
        let v = roundtrip(TextureFormat::R8Unorm, Vec4::new(1.0, 1.0, 1.0, 0.0));
        assert_eq!(v, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn half_float_keeps_values_beyond_one() {
        let v = roundtrip(TextureFormat::Rgba16Float, Vec4::new(3.5, -0.25, 0.0, 1.0));
        assert_eq!(v, Vec4::new(3.5, -0.25, 0.0, 1.0));
    }

    #[test]
    fn readback_indexes_top_row_first() {
        let format = TextureFormat::R8Unorm;
        let readback = TextureReadback {
            size: Extent2D::new(2, 2),
            format,
            data: vec![0, 255, 0, 0],
        };
        assert_eq!(readback.texel(1, 0).x, 1.0);
        assert_eq!(readback.texel(0, 1).x, 0.0);
        let lit: Vec<_> = readback.texels().filter(|t| t.2.x > 0.5).collect();
        assert_eq!(lit.len(), 1);
        assert_eq!((lit[0].0, lit[0].1), (1, 0));
    }

    #[test]
    fn descriptor_key_and_length() {
        let key = TextureKey::new(Extent2D::new(4, 3), TextureFormat::Rgba16Float);
        let desc = TextureDescriptor::from_key("lit", key);
        assert_eq!(desc.key(), key);
        assert_eq!(desc.byte_len(), 4 * 3 * 8);
    }
}
