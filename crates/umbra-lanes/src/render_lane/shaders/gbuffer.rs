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

use umbra_core::math::{LinearRgba, Mat4, Vec4};
use umbra_core::renderer::api::{
    FragmentInput, FragmentOutput, MeshProgram, TextureSampler, VertexInput, VertexOutput,
    MAX_COLOR_TARGETS, MAX_VARYINGS,
};
use umbra_core::renderer::{Camera, GBufferAttachment};

const VARYING_VIEW_POSITION: usize = 0;
const VARYING_VIEW_NORMAL: usize = 1;

/// Per-surface data of the geometry pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GBufferUniforms {
    /// Object-to-view transform.
    pub model_view: Mat4,
    /// View-to-clip transform.
    pub projection: Mat4,
    /// Inverse transpose of `model_view`, for normals.
    pub normal_matrix: Mat4,
    /// Diffuse reflectance written to the albedo target.
    pub albedo: LinearRgba,
    /// Specular reflectance, gloss in alpha.
    pub specular: LinearRgba,
}

impl GBufferUniforms {
    /// Builds the uniforms of a surface placed by `model`.
    ///
    /// Returns `None` if the model-view transform cannot be inverted (a zero
    /// scale), in which case the surface has no area to render anyway.
    pub fn new(
        model: Mat4,
        camera: &Camera,
        albedo: LinearRgba,
        specular: LinearRgba,
    ) -> Option<Self> {
        let model_view = camera.view * model;
        let normal_matrix = model_view.inverse()?.transpose();
        Some(Self {
            model_view,
            projection: camera.projection,
            normal_matrix,
            albedo,
            specular,
        })
    }
}

/// Writes albedo, view-space normal, specular, view-space position and
/// view-space Z for every visible surface fragment.
#[derive(Debug, Clone, Copy)]
pub struct GBufferProgram {
    /// The uniforms of the surface being drawn.
    pub uniforms: GBufferUniforms,
}

impl MeshProgram for GBufferProgram {
    fn vertex(&self, input: &VertexInput) -> VertexOutput {
        let view_position = self.uniforms.model_view * input.position.extend(1.0);
        let view_normal = self.uniforms.normal_matrix * input.normal.extend(0.0);

        let mut varyings = [Vec4::ZERO; MAX_VARYINGS];
        varyings[VARYING_VIEW_POSITION] = view_position;
        varyings[VARYING_VIEW_NORMAL] = Vec4::from_vec3(view_normal.truncate(), 0.0);
        VertexOutput {
            clip: self.uniforms.projection * view_position,
            varyings,
        }
    }

    fn fragment(
        &self,
        input: &FragmentInput,
        _textures: &dyn TextureSampler,
    ) -> Option<FragmentOutput> {
        let position = input.varyings[VARYING_VIEW_POSITION].truncate();
        let normal = input.varyings[VARYING_VIEW_NORMAL].truncate().normalize();

        let mut colors = [Vec4::ZERO; MAX_COLOR_TARGETS];
        colors[GBufferAttachment::Albedo as usize] = self.uniforms.albedo.to_vec4();
        colors[GBufferAttachment::Normal as usize] = Vec4::from_vec3(normal, 1.0);
        colors[GBufferAttachment::Specular as usize] = self.uniforms.specular.to_vec4();
        colors[GBufferAttachment::ViewPosition as usize] = Vec4::from_vec3(position, 1.0);
        colors[GBufferAttachment::ViewZ as usize] = Vec4::new(position.z, 0.0, 0.0, 1.0);
        Some(FragmentOutput { colors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use umbra_core::math::{Extent2D, Vec3, FRAC_PI_2};

    fn camera() -> Camera {
        Camera::perspective(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::Z,
            Vec3::Y,
            FRAC_PI_2,
            0.1,
            100.0,
            Extent2D::new(8, 8),
        )
        .unwrap()
    }

    #[test]
    fn vertex_stage_outputs_view_space_and_clip_w() {
        let uniforms = GBufferUniforms::new(
            Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            &camera(),
            LinearRgba::WHITE,
            LinearRgba::BLACK,
        )
        .unwrap();
        let program = GBufferProgram { uniforms };
        let out = program.vertex(&VertexInput {
            position: Vec3::ZERO,
            normal: -Vec3::Z,
        });
        assert_relative_eq!(out.varyings[VARYING_VIEW_POSITION].x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(out.varyings[VARYING_VIEW_POSITION].z, 5.0, epsilon = 1e-5);
        assert_relative_eq!(out.clip.w, 5.0, epsilon = 1e-5);
        assert_relative_eq!(out.varyings[VARYING_VIEW_NORMAL].z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_model_has_no_uniforms() {
        let flat = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(GBufferUniforms::new(flat, &camera(), LinearRgba::WHITE, LinearRgba::BLACK).is_none());
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let uniforms = GBufferUniforms::new(
            Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0)),
            &camera(),
            LinearRgba::WHITE,
            LinearRgba::BLACK,
        )
        .unwrap();
        // A 45 degree normal in the XY plane tilts towards Y once X is stretched.
        let n = (uniforms.normal_matrix * Vec3::new(1.0, 1.0, 0.0).extend(0.0))
            .truncate()
            .normalize();
        assert!(n.y > n.x);
    }
}
