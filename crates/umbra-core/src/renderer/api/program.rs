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

//! Shading-program contracts and draw descriptors.
//!
//! A program is plain Rust executed by the device for every vertex and
//! fragment. Inputs other than uniforms arrive through named texture slots,
//! and the slot names below are stable across frames.

use super::texture::TextureId;
use crate::math::{Extent2D, Vec2, Vec3, Vec4};
use crate::renderer::mesh::Mesh;

/// Maximum number of interpolated attributes a vertex stage can emit.
pub const MAX_VARYINGS: usize = 4;

/// Maximum number of color targets a single draw can write.
pub const MAX_COLOR_TARGETS: usize = 5;

/// Stable texture binding slot names shared by all programs.
pub mod slots {
    /// G-buffer albedo attachment.
    pub const ALBEDO: &str = "albedo";
    /// G-buffer view-space normal attachment.
    pub const NORMAL: &str = "normal";
    /// G-buffer specular attachment (gloss in alpha).
    pub const SPECULAR: &str = "specular";
    /// G-buffer view-space position attachment.
    pub const VIEW_POSITION: &str = "view_position";
    /// G-buffer view-space Z attachment.
    pub const VIEW_Z: &str = "view_z";
    /// A light-volume mask.
    pub const MASK: &str = "mask";
    /// The image being processed (accumulator or pass input).
    pub const MAIN: &str = "main";
}

/// Interpolated per-vertex attributes.
pub type Varyings = [Vec4; MAX_VARYINGS];

/// One vertex fetched from a mesh.
#[derive(Debug, Clone, Copy)]
pub struct VertexInput {
    /// Object-space position.
    pub position: Vec3,
    /// Object-space normal, zero when the mesh carries none.
    pub normal: Vec3,
}

/// The output of a vertex stage.
#[derive(Debug, Clone, Copy)]
pub struct VertexOutput {
    /// Clip-space position. `w` must be the view-space depth for perspective.
    pub clip: Vec4,
    /// Attributes interpolated perspective-correctly across the triangle.
    pub varyings: Varyings,
}

/// The per-fragment input of a program.
#[derive(Debug, Clone, Copy)]
pub struct FragmentInput {
    /// Integer pixel coordinates, `y = 0` at the top row.
    pub pixel: [u32; 2],
    /// Extent of the render target.
    pub extent: Extent2D,
    /// Normalized depth in `[0, 1]`.
    pub depth: f32,
    /// `true` if the triangle faces the camera.
    pub front_facing: bool,
    /// Interpolated varyings.
    pub varyings: Varyings,
}

/// The colors a fragment writes, indexed like the bound color targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentOutput {
    /// One value per color target; entries past the bound targets are ignored.
    pub colors: [Vec4; MAX_COLOR_TARGETS],
}

impl FragmentOutput {
    /// A fragment writing `value` to the first color target.
    pub fn single(value: Vec4) -> Self {
        let mut colors = [Vec4::ZERO; MAX_COLOR_TARGETS];
        colors[0] = value;
        Self { colors }
    }
}

/// Read access to the textures bound for a draw.
///
/// Loads are unfiltered texel fetches. Slots that are not bound, and
/// coordinates outside the bound texture, read as zero.
pub trait TextureSampler {
    /// Fetches the texel at `pixel` from the texture bound to `slot`.
    fn load(&self, slot: &str, pixel: [u32; 2]) -> Vec4;

    /// Returns `true` if a texture is bound to `slot`.
    fn is_bound(&self, slot: &str) -> bool;
}

/// A program run over rasterized mesh triangles.
pub trait MeshProgram: Send + Sync {
    /// Transforms one vertex.
    fn vertex(&self, input: &VertexInput) -> VertexOutput;

    /// Shades one covered pixel. Returning `None` discards the fragment,
    /// which also skips its depth write.
    fn fragment(&self, input: &FragmentInput, textures: &dyn TextureSampler)
        -> Option<FragmentOutput>;
}

/// A program run once for every pixel of its target.
pub trait FullscreenProgram: Send + Sync {
    /// Shades the pixel at `pixel`.
    fn shade(&self, pixel: [u32; 2], extent: Extent2D, textures: &dyn TextureSampler) -> Vec4;
}

/// Named texture inputs of a draw.
#[derive(Debug, Clone, Default)]
pub struct TextureBindings {
    entries: Vec<(&'static str, TextureId)>,
}

impl TextureBindings {
    /// Creates an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `texture` to `slot`, replacing any previous binding of that slot.
    pub fn bind(mut self, slot: &'static str, texture: TextureId) -> Self {
        self.entries.retain(|(s, _)| *s != slot);
        self.entries.push((slot, texture));
        self
    }

    /// Returns the texture bound to `slot`.
    pub fn get(&self, slot: &str) -> Option<TextureId> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, id)| *id)
    }

    /// Iterates over every `(slot, texture)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, TextureId)> + '_ {
        self.entries.iter().copied()
    }
}

/// Which triangles are discarded before rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// Keep every triangle.
    #[default]
    None,
    /// Discard triangles facing away from the camera.
    ///
    /// A triangle faces the camera when its vertices appear clockwise on screen.
    Back,
}

/// Comparison used by the depth test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunction {
    /// The test always passes.
    Always,
    /// Passes if the fragment depth is less than or equal to the stored depth.
    #[default]
    LessEqual,
}

/// A depth attachment and how it is used.
#[derive(Debug, Clone, Copy)]
pub struct DepthAttachment {
    /// The depth texture. Must have a depth format.
    pub texture: TextureId,
    /// The depth comparison.
    pub compare: CompareFunction,
    /// Whether passing fragments store their depth.
    pub write: bool,
}

/// Describes one mesh draw.
pub struct MeshDraw<'a> {
    /// A debug label used in logs and errors.
    pub label: &'a str,
    /// The geometry to rasterize.
    pub mesh: &'a Mesh,
    /// The program to run.
    pub program: &'a dyn MeshProgram,
    /// Color targets, all sharing one extent.
    pub color_targets: &'a [TextureId],
    /// Optional depth attachment with the same extent as the color targets.
    pub depth: Option<DepthAttachment>,
    /// Texture inputs. A target may not also appear here.
    pub bindings: &'a TextureBindings,
    /// Face culling.
    pub cull_mode: CullMode,
}

/// Describes one full-screen draw.
pub struct FullscreenDraw<'a> {
    /// A debug label used in logs and errors.
    pub label: &'a str,
    /// The program to run.
    pub program: &'a dyn FullscreenProgram,
    /// The single color target.
    pub target: TextureId,
    /// Texture inputs. The target may not also appear here.
    pub bindings: &'a TextureBindings,
}

/// Converts a pixel center to normalized device coordinates.
///
/// `x` grows to the right and `y` grows downwards in pixel space, while NDC
/// has +Y up.
#[inline]
pub fn pixel_to_ndc(pixel: [u32; 2], extent: Extent2D) -> Vec2 {
    let w = extent.width.max(1) as f32;
    let h = extent.height.max(1) as f32;
    Vec2::new(
        (pixel[0] as f32 + 0.5) / w * 2.0 - 1.0,
        1.0 - (pixel[1] as f32 + 0.5) / h * 2.0,
    )
}

/// Converts NDC to continuous pixel coordinates (inverse of [`pixel_to_ndc`]).
#[inline]
pub fn ndc_to_pixel(ndc: Vec2, extent: Extent2D) -> Vec2 {
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * extent.width as f32,
        (1.0 - ndc.y) * 0.5 * extent.height as f32,
    )
}
