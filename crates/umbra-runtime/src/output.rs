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

//! PNG encoding of texture readbacks.

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::path::Path;
use umbra_core::math::{LinearRgba, Vec4};
use umbra_core::renderer::api::{TextureFormat, TextureReadback};

/// How texel values are mapped to 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Linear color, encoded to sRGB.
    Color,
    /// Values in `[-1, 1]` mapped to `[0, 1]`. Used for normals.
    Signed,
    /// Magnitudes scaled by the largest one in the image. Used for
    /// positions, depths and masks.
    Normalized,
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Converts a readback to opaque RGBA8 pixels, top row first.
///
/// Single-channel formats are shown as gray.
pub fn to_rgba8(readback: &TextureReadback, encoding: Encoding) -> Vec<u8> {
    let single = matches!(
        readback.format,
        TextureFormat::R8Unorm | TextureFormat::Depth32Float
    );
    let channels = |(_, _, v): (u32, u32, Vec4)| {
        if single {
            [v.x; 3]
        } else {
            [v.x, v.y, v.z]
        }
    };
    let scale = match encoding {
        Encoding::Normalized => {
            let max = readback
                .texels()
                .flat_map(channels)
                .map(f32::abs)
                .filter(|c| c.is_finite())
                .fold(0.0, f32::max);
            if max > 0.0 {
                1.0 / max
            } else {
                1.0
            }
        }
        _ => 1.0,
    };

    let mut pixels = Vec::with_capacity(readback.size.pixel_count() * 4);
    for rgb in readback.texels().map(channels) {
        pixels.extend(rgb.map(|c| match encoding {
            Encoding::Color => LinearRgba::linear_to_srgb_u8(c),
            Encoding::Signed => unorm8(c * 0.5 + 0.5),
            Encoding::Normalized => unorm8(c.abs() * scale),
        }));
        pixels.push(u8::MAX);
    }
    pixels
}

/// Writes a readback as a PNG file.
pub fn write_png(readback: &TextureReadback, encoding: Encoding, path: &Path) -> Result<()> {
    let size = readback.size;
    let image = RgbaImage::from_raw(size.width, size.height, to_rgba8(readback, encoding))
        .context("readback does not match its extent")?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    log::info!("Wrote {} ({size})", path.display());
    Ok(())
}
