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

//! The ray/volume intersection test behind light-volume masks.
//!
//! The proxy cone is rasterized only to find candidate pixels. Whether a
//! pixel is lit is decided per pixel by reconstructing the surface position
//! stored in the G-buffer and testing it against the analytic unit cone.

use umbra_core::math::{Extent2D, Mat4, Vec3, Vec4};
use umbra_core::renderer::api::{
    pixel_to_ndc, slots, FragmentInput, FragmentOutput, FullscreenProgram, MeshProgram,
    TextureSampler, VertexInput, VertexOutput, MAX_VARYINGS,
};
use umbra_core::renderer::camera::reconstruct_view_position;

/// Returns `true` if `local` lies inside the unit cone, within `epsilon`.
///
/// The unit cone has its apex at the origin and its base disc of radius 1 at
/// `z = 1`.
#[inline]
pub fn inside_unit_cone(local: Vec3, epsilon: f32) -> bool {
    if local.z < -epsilon || local.z > 1.0 + epsilon {
        return false;
    }
    let radial = (local.x * local.x + local.y * local.y).sqrt();
    radial <= local.z + epsilon
}

/// Returns `true` if the view-space `position` lies inside the volume that
/// `volume_to_view` places the unit cone at.
///
/// A singular transform encloses nothing.
///
/// # Examples
///
/// ```
/// use umbra_core::math::{Mat4, Vec3};
/// use umbra_lanes::render_lane::shaders::inside_volume;
///
/// // A cone of range 10 and radius 2 pointing down +Z from the origin.
/// let cone = Mat4::from_scale(Vec3::new(2.0, 2.0, 10.0));
/// assert!(inside_volume(Vec3::new(0.0, 0.0, 5.0), &cone, 0.001));
/// assert!(!inside_volume(Vec3::new(0.0, 0.0, 11.0), &cone, 0.001));
/// assert!(!inside_volume(Vec3::new(1.5, 0.0, 5.0), &cone, 0.001));
/// ```
pub fn inside_volume(position: Vec3, volume_to_view: &Mat4, epsilon: f32) -> bool {
    match volume_to_view.inverse() {
        Some(view_to_volume) => {
            inside_unit_cone(view_to_volume.transform_point3(position), epsilon)
        }
        None => false,
    }
}

/// Uniforms of the mask pass for one light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VolumeMaskUniforms {
    /// Unit cone to clip space.
    pub volume_to_clip: Mat4,
    /// View space to unit cone space.
    pub view_to_volume: Mat4,
    /// Inverse of the camera projection.
    pub inverse_projection: Mat4,
    /// x = intersection epsilon, yzw = padding.
    pub params: [f32; 4],
}

impl VolumeMaskUniforms {
    /// Builds the uniforms of a volume placed in view space by `volume_to_view`.
    ///
    /// Returns `None` if the volume or the projection is singular.
    pub fn new(
        volume_to_view: Mat4,
        projection: &Mat4,
        epsilon: f32,
    ) -> Option<Self> {
        Some(Self {
            volume_to_clip: *projection * volume_to_view,
            view_to_volume: volume_to_view.inverse()?,
            inverse_projection: projection.inverse()?,
            params: [epsilon, 0.0, 0.0, 0.0],
        })
    }
}

/// Rasterizes a proxy volume and writes 1 where the G-buffer surface lies
/// inside the light volume.
///
/// Pixels that fail the test are discarded, so the target must be cleared to
/// zero beforehand.
#[derive(Debug, Clone, Copy)]
pub struct VolumeMaskProgram {
    /// The volume being tested.
    pub uniforms: VolumeMaskUniforms,
}

impl VolumeMaskProgram {
    /// Tests the surface seen through `pixel`, given its view-space depth.
    pub fn covers(&self, pixel: [u32; 2], extent: Extent2D, view_z: f32) -> bool {
        // Background pixels keep the cleared depth of zero.
        if view_z <= 0.0 {
            return false;
        }
        let ndc = pixel_to_ndc(pixel, extent);
        let position = reconstruct_view_position(ndc, view_z, &self.uniforms.inverse_projection);
        let local = self.uniforms.view_to_volume.transform_point3(position);
        inside_unit_cone(local, self.uniforms.params[0])
    }
}

impl MeshProgram for VolumeMaskProgram {
    fn vertex(&self, input: &VertexInput) -> VertexOutput {
        VertexOutput {
            clip: self.uniforms.volume_to_clip * input.position.extend(1.0),
            varyings: [Vec4::ZERO; MAX_VARYINGS],
        }
    }

    fn fragment(
        &self,
        input: &FragmentInput,
        textures: &dyn TextureSampler,
    ) -> Option<FragmentOutput> {
        let view_z = textures.load(slots::VIEW_Z, input.pixel).x;
        self.covers(input.pixel, input.extent, view_z)
            .then(|| FragmentOutput::single(Vec4::ONE))
    }
}

/// Displays the mask bound to [`slots::MASK`] as an opaque grey-scale image.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskDebugProgram;

impl FullscreenProgram for MaskDebugProgram {
    fn shade(&self, pixel: [u32; 2], _extent: Extent2D, textures: &dyn TextureSampler) -> Vec4 {
        let m = textures.load(slots::MASK, pixel).x;
        Vec4::new(m, m, m, 1.0)
    }
}
