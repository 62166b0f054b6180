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
use umbra_core::math::{saturate, Extent2D, LinearRgba, Mat4, Vec3, Vec4, EPSILON};
use umbra_core::renderer::api::{slots, FullscreenProgram, TextureSampler};
use umbra_core::renderer::LightDescriptor;

/// Mask values at or above this threshold count as inside the light volume.
pub const MASK_THRESHOLD: f32 = 0.5;

/// One spot light, expressed in view space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLightUniforms {
    /// Position (xyz) and range (w).
    pub position_range: Vec4,
    /// Normalized direction (xyz) and cosine of the half angle (w).
    pub direction_cos_half: Vec4,
    /// Color pre-multiplied by intensity.
    pub color: LinearRgba,
    /// x = shininess scale, yzw = padding.
    pub params: [f32; 4],
}

impl SpotLightUniforms {
    /// Expresses `light` in the view space of `view`. Returns `None` for
    /// anything but a spot light.
    pub fn new(light: &LightDescriptor, view: &Mat4, shininess_scale: f32) -> Option<Self> {
        let (range, _) = light.spot_parameters()?;
        let cos_half = light.spot_cos_half_angle()?;
        let position = view.transform_point3(light.position);
        let direction = view.transform_vector3(light.forward).normalize();
        Some(Self {
            position_range: Vec4::from_vec3(position, range),
            direction_cos_half: Vec4::from_vec3(direction, cos_half),
            color: light.premultiplied_color(),
            params: [shininess_scale, 0.0, 0.0, 0.0],
        })
    }
}

/// Computes the light a spot light adds to one surface sample, in view space.
///
/// `specular.w` is the surface gloss.
pub fn spot_contribution(
    light: &SpotLightUniforms,
    position: Vec3,
    normal: Vec3,
    albedo: Vec3,
    specular: Vec4,
) -> Vec3 {
    let to_light = light.position_range.truncate() - position;
    let distance = to_light.length();
    let range = light.position_range.w;
    if distance <= EPSILON || range <= 0.0 {
        return Vec3::ZERO;
    }
    let l = to_light / distance;

    let cos_half = light.direction_cos_half.w;
    let cos_angle = (-l).dot(light.direction_cos_half.truncate());
    let spot = saturate((cos_angle - cos_half) / (1.0 - cos_half).max(EPSILON));
    let falloff = saturate(1.0 - (distance / range) * (distance / range));
    let attenuation = falloff * falloff;
    if spot <= 0.0 || attenuation <= 0.0 {
        return Vec3::ZERO;
    }

    let v = (-position).normalize();
    let n_dot_l = normal.dot(l).max(0.0);
    let n_dot_h = normal.dot(half_vector(l, v)).max(0.0);
    let exponent = shininess(specular.w, light.params[0]);

    let diffuse = albedo * n_dot_l;
    let highlight = specular.truncate() * (n_dot_h.powf(exponent) * n_dot_l);
    (diffuse + highlight) * light.color.to_vec4().truncate() * (attenuation * spot)
}

/// Adds one spot light onto the accumulator bound to [`slots::MAIN`] wherever
/// the mask bound to [`slots::MASK`] is set, and copies it elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct SpotBlendProgram {
    /// The light being blended.
    pub uniforms: SpotLightUniforms,
}

impl FullscreenProgram for SpotBlendProgram {
    fn shade(&self, pixel: [u32; 2], _extent: Extent2D, textures: &dyn TextureSampler) -> Vec4 {
        let previous = textures.load(slots::MAIN, pixel);
        if textures.load(slots::MASK, pixel).x < MASK_THRESHOLD {
            return previous;
        }
        let contribution = spot_contribution(
            &self.uniforms,
            textures.load(slots::VIEW_POSITION, pixel).truncate(),
            textures.load(slots::NORMAL, pixel).truncate(),
            textures.load(slots::ALBEDO, pixel).truncate(),
            textures.load(slots::SPECULAR, pixel),
        );
        previous + Vec4::from_vec3(contribution, 0.0)
    }
}
