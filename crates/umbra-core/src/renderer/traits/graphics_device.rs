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

//! Defines the `GraphicsDevice` trait, the abstract interface to a rendering backend.

use crate::math::Vec4;
use crate::renderer::api::{
    FullscreenDraw, MeshDraw, TextureDescriptor, TextureId, TextureReadback,
};
use crate::renderer::error::{RenderError, ResourceError};
use std::fmt::Debug;

/// Represents an abstract graphics device, the factory for textures and the
/// executor of draws.
///
/// This trait is the primary interface between the compositor lanes and a
/// backend. Every operation completes before it returns, so a draw's output
/// is fully visible to the next call. Implementations use interior
/// mutability so the device can be shared as `Arc<dyn GraphicsDevice>`.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    // --- Texture Management ---

    /// Creates a new texture. Its contents are zeroed.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture, freeing its storage.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Returns the descriptor a live texture was created with.
    fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor<'static>>;

    /// Returns the number of live textures.
    fn live_texture_count(&self) -> usize;

    /// Fills every texel of a texture with `value`, quantized to its format.
    ///
    /// Depth textures store `value.x`.
    fn clear_texture(&self, id: TextureId, value: Vec4) -> Result<(), ResourceError>;

    /// Copies `source` into `destination`.
    ///
    /// Identical descriptors copy bytes. Otherwise texels are converted through
    /// their decoded values and, if extents differ, sampled with the nearest
    /// texel.
    fn copy_texture(&self, source: TextureId, destination: TextureId) -> Result<(), ResourceError>;

    /// Reads back a texture's contents.
    fn read_texture(&self, id: TextureId) -> Result<TextureReadback, ResourceError>;

    // --- Draws ---

    /// Rasterizes a mesh with a program into the draw's targets.
    fn draw_mesh(&self, draw: &MeshDraw<'_>) -> Result<(), RenderError>;

    /// Runs a program once per pixel of the draw's target.
    fn draw_fullscreen(&self, draw: &FullscreenDraw<'_>) -> Result<(), RenderError>;
}
