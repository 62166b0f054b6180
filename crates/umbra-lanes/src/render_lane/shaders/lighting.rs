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

use super::{half_vector, shininess};
use umbra_core::math::{Extent2D, LinearRgba, Mat4, Vec3, Vec4};
use umbra_core::renderer::api::{slots, FullscreenProgram, TextureSampler};
use umbra_core::renderer::LightDescriptor;

/// The direction from a surface towards the viewer in view space.
///
/// The base pass treats the viewer as infinitely distant along the camera axis.
pub const VIEW_DIRECTION: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Uniforms of the base lighting pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BaseLightingUniforms {
    /// Direction from a surface towards the light (xyz), in view space. `w` is padding.
    pub to_light: Vec4,
    /// Light color pre-multiplied by intensity.
    pub color: LinearRgba,
    /// x = shininess scale, yzw = padding.
    pub params: [f32; 4],
}

impl BaseLightingUniforms {
    /// Expresses a directional light in the view space of `view`.
    pub fn new(light: &LightDescriptor, view: &Mat4, shininess_scale: f32) -> Self {
        let to_light = view.transform_vector3(-light.forward).normalize();
        Self {
            to_light: Vec4::from_vec3(to_light, 0.0),
            color: light.premultiplied_color(),
            params: [shininess_scale, 0.0, 0.0, 0.0],
        }
    }
}

/// Blinn-Phong lighting of one directional light over the whole G-buffer.
#[derive(Debug, Clone, Copy)]
pub struct BaseLightingProgram {
    /// The light being resolved.
    pub uniforms: BaseLightingUniforms,
}

impl BaseLightingProgram {
    /// Lights one surface sample.
    ///
    /// Pixels the geometry pass never touched have zero albedo and specular
    /// and resolve to black.
    pub fn shade_sample(&self, albedo: Vec4, normal: Vec3, specular: Vec4) -> Vec4 {
        let l = self.uniforms.to_light.truncate();
        let color = self.uniforms.color.to_vec4().truncate();
        let n_dot_l = normal.dot(l).max(0.0);
        let n_dot_h = normal.dot(half_vector(l, VIEW_DIRECTION)).max(0.0);
        let exponent = shininess(specular.w, self.uniforms.params[0]);

        let diffuse = albedo.truncate() * color * n_dot_l;
        let highlight = specular.truncate() * color * n_dot_h.powf(exponent);
        Vec4::from_vec3(diffuse + highlight, 1.0)
    }
}

impl FullscreenProgram for BaseLightingProgram {
    fn shade(&self, pixel: [u32; 2], _extent: Extent2D, textures: &dyn TextureSampler) -> Vec4 {
        let albedo = textures.load(slots::ALBEDO, pixel);
        let normal = textures.load(slots::NORMAL, pixel).truncate();
        let specular = textures.load(slots::SPECULAR, pixel);
        self.shade_sample(albedo, normal, specular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn program(forward: Vec3, specular_scale: f32) -> BaseLightingProgram {
        let light = LightDescriptor::directional(forward, LinearRgba::rgb(1.0, 0.5, 0.25), 2.0);
        BaseLightingProgram {
            uniforms: BaseLightingUniforms::new(&light, &Mat4::IDENTITY, specular_scale),
        }
    }

    #[test]
    fn head_on_light_is_albedo_times_color() {
        let p = program(Vec3::Z, 128.0);
        let c = p.shade_sample(Vec4::new(0.5, 0.5, 0.5, 1.0), -Vec3::Z, Vec4::ZERO);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 0.5);
        assert_relative_eq!(c.z, 0.25);
        assert_eq!(c.w, 1.0);
    }

    #[test]
    fn light_behind_surface_contributes_nothing() {
        let p = program(-Vec3::Z, 128.0);
        let c = p.shade_sample(Vec4::ONE, -Vec3::Z, Vec4::ONE);
        assert_eq!(c.truncate(), Vec3::ZERO);
    }

    #[test]
    fn specular_peaks_on_mirror_direction() {
        let p = program(Vec3::Z, 128.0);
        let c = p.shade_sample(Vec4::ZERO, -Vec3::Z, Vec4::new(1.0, 1.0, 1.0, 0.5));
        // N.H == 1, so the exponent does not matter.
        assert_relative_eq!(c.x, 2.0);
    }

    #[test]
    fn background_resolves_to_black() {
        let p = program(Vec3::new(0.3, -1.0, 0.5), 128.0);
        let c = p.shade_sample(Vec4::ZERO, Vec3::ZERO, Vec4::ZERO);
        assert_eq!(c, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
}
