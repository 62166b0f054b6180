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

//! Layout of the geometry buffer and the per-frame snapshot of it.

use crate::math::Extent2D;
use crate::renderer::api::{TextureFormat, TextureId, TextureKey};
use crate::renderer::resources::TextureHandle;
use std::fmt;

/// One attachment of the G-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GBufferAttachment {
    /// Diffuse reflectance.
    Albedo,
    /// View-space normal.
    Normal,
    /// Specular reflectance, gloss in alpha.
    Specular,
    /// View-space position, `w = 1` on covered pixels.
    ViewPosition,
    /// View-space depth in `x`; zero where nothing was drawn.
    ViewZ,
    /// Hardware depth.
    Depth,
}

impl GBufferAttachment {
    /// Every attachment, color attachments first in target order.
    pub const ALL: [GBufferAttachment; 6] = [
        GBufferAttachment::Albedo,
        GBufferAttachment::Normal,
        GBufferAttachment::Specular,
        GBufferAttachment::ViewPosition,
        GBufferAttachment::ViewZ,
        GBufferAttachment::Depth,
    ];

    /// The color attachments in the order the geometry program writes them.
    pub const COLOR: [GBufferAttachment; 5] = [
        GBufferAttachment::Albedo,
        GBufferAttachment::Normal,
        GBufferAttachment::Specular,
        GBufferAttachment::ViewPosition,
        GBufferAttachment::ViewZ,
    ];

    /// Returns the fixed format of the attachment.
    pub const fn format(&self) -> TextureFormat {
        match self {
            GBufferAttachment::Albedo | GBufferAttachment::Specular => TextureFormat::Rgba8Unorm,
            GBufferAttachment::Normal
            | GBufferAttachment::ViewPosition
            | GBufferAttachment::ViewZ => TextureFormat::Rgba16Float,
            GBufferAttachment::Depth => TextureFormat::Depth32Float,
        }
    }

    /// Returns a short, stable name used for labels and debug dumps.
    pub const fn name(&self) -> &'static str {
        match self {
            GBufferAttachment::Albedo => "albedo",
            GBufferAttachment::Normal => "normal",
            GBufferAttachment::Specular => "specular",
            GBufferAttachment::ViewPosition => "view_position",
            GBufferAttachment::ViewZ => "view_z",
            GBufferAttachment::Depth => "depth",
        }
    }

    /// Returns the key of this attachment at the given size.
    pub const fn key(&self, size: Extent2D) -> TextureKey {
        TextureKey::new(size, self.format())
    }
}

impl fmt::Display for GBufferAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The G-buffer textures produced for one frame.
///
/// Read-only to every consumer; the geometry lane owns the textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBufferSnapshot {
    /// Extent shared by every attachment.
    pub extent: Extent2D,
    /// Handles indexed like [`GBufferAttachment::ALL`].
    pub attachments: [TextureHandle; 6],
}

impl GBufferSnapshot {
    /// Returns the handle of `attachment`.
    pub fn handle(&self, attachment: GBufferAttachment) -> TextureHandle {
        self.attachments[attachment as usize]
    }

    /// Returns the texture id of `attachment`.
    pub fn texture(&self, attachment: GBufferAttachment) -> TextureId {
        self.handle(attachment).id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_and_color_share_order() {
        for (i, a) in GBufferAttachment::COLOR.iter().enumerate() {
            assert_eq!(GBufferAttachment::ALL[i], *a);
            assert_eq!(*a as usize, i);
        }
        assert_eq!(GBufferAttachment::Depth as usize, 5);
    }

    #[test]
    fn attachment_formats() {
        assert_eq!(GBufferAttachment::Albedo.format(), TextureFormat::Rgba8Unorm);
        assert_eq!(GBufferAttachment::Normal.format(), TextureFormat::Rgba16Float);
        assert_eq!(GBufferAttachment::Specular.format(), TextureFormat::Rgba8Unorm);
        assert_eq!(GBufferAttachment::ViewPosition.format(), TextureFormat::Rgba16Float);
        assert_eq!(GBufferAttachment::ViewZ.format(), TextureFormat::Rgba16Float);
        assert!(GBufferAttachment::Depth.format().is_depth());
    }
}
