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

//! Implements the full-screen pass resolving the base directional light.

use super::shaders::{BaseLightingProgram, BaseLightingUniforms};
use crate::passthrough::{run_or_passthrough, MissingInput, PassOutcome};
use umbra_core::lane::{Lane, LaneKind};
use umbra_core::math::Mat4;
use umbra_core::renderer::api::{
    slots, FullscreenDraw, TextureBindings, TextureFormat, TextureId, TextureKey,
};
use umbra_core::renderer::{
    GBufferAttachment, GBufferSnapshot, LightDescriptor, RenderError, ResourceManager,
    TargetSlot, TextureHandle,
};
use umbra_core::RenderSettings;

/// Shading parameters of the base lighting pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingMaterial {
    /// Specular exponent reached at full gloss.
    pub shininess_scale: f32,
}

/// Lights the G-buffer with one directional light into the persistent
/// lit-color buffer (slot [`TargetSlot::LitColor`]), then copies that buffer
/// to the pass output.
#[derive(Debug)]
pub struct BaseLightingLane {
    material: Option<LightingMaterial>,
    lit_format: TextureFormat,
}

impl BaseLightingLane {
    /// Creates a lane configured from `settings`.
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            material: Some(LightingMaterial {
                shininess_scale: settings.shininess_scale,
            }),
            lit_format: settings.lit_format,
        }
    }

    /// Replaces the shading material. With `None` the lane only passes
    /// frames through.
    pub fn set_material(&mut self, material: Option<LightingMaterial>) {
        self.material = material;
    }

    /// Returns the format of the lit-color buffer.
    pub fn lit_format(&self) -> TextureFormat {
        self.lit_format
    }

    /// Resolves `light` over `gbuffer` and writes the result to `destination`.
    ///
    /// Returns the lit-color buffer written this frame. Without a G-buffer,
    /// a material, or an enabled directional light, `source` is copied to
    /// `destination` and the lit buffer is left untouched.
    pub fn resolve(
        &mut self,
        resources: &mut ResourceManager,
        gbuffer: Option<&GBufferSnapshot>,
        light: Option<&LightDescriptor>,
        view: &Mat4,
        source: TextureId,
        destination: TextureId,
    ) -> Result<PassOutcome<TextureHandle>, RenderError> {
        let device = resources.device_arc();
        let material = self.material;
        let lit_format = self.lit_format;

        run_or_passthrough(device.as_ref(), "BaseLightingLane", source, destination, || {
            let gbuffer = gbuffer.ok_or(MissingInput::GBuffer)?;
            let material = material.ok_or(MissingInput::Material)?;
            let light = light
                .filter(|l| l.is_live() && !l.is_spot())
                .ok_or(MissingInput::DirectionalLight)?;

            let lit = resources.ensure(
                TargetSlot::LitColor,
                TextureKey::new(gbuffer.extent, lit_format),
            )?;
            let program = BaseLightingProgram {
                uniforms: BaseLightingUniforms::new(light, view, material.shininess_scale),
            };
            let bindings = TextureBindings::new()
                .bind(slots::ALBEDO, gbuffer.texture(GBufferAttachment::Albedo))
                .bind(slots::NORMAL, gbuffer.texture(GBufferAttachment::Normal))
                .bind(slots::SPECULAR, gbuffer.texture(GBufferAttachment::Specular));
            device.draw_fullscreen(&FullscreenDraw {
                label: "base_lighting",
                program: &program,
                target: lit.id,
                bindings: &bindings,
            })?;
            device.copy_texture(lit.id, destination)?;
            log::trace!("BaseLightingLane: resolved into {:?} (v{})", lit.id, lit.version);
            Ok(lit)
        })
    }
}

impl Lane for BaseLightingLane {
    fn strategy_name(&self) -> &'static str {
        "BaseLighting"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Lighting
    }

    fn execution_order(&self) -> u32 {
        10
    }

    fn on_shutdown(&mut self, resources: &mut ResourceManager) {
        if resources.release(TargetSlot::LitColor) {
            log::info!("BaseLightingLane: released the lit-color buffer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{camera, covering_plane, frame_pair, resources};
    use crate::render_lane::GBufferLane;
    use approx::assert_relative_eq;
    use umbra_core::math::{Extent2D, LinearRgba, Vec3, Vec4};

    struct Fixture {
        resources: ResourceManager,
        gbuffer: GBufferSnapshot,
        view: Mat4,
        source: TextureId,
        destination: TextureId,
    }

    fn fixture(settings: &RenderSettings) -> Fixture {
        let mut resources = resources();
        let cam = camera(Extent2D::new(6, 6));
        let plane = covering_plane(4.0, LinearRgba::rgb(0.2, 0.4, 0.6), LinearRgba::BLACK);
        let gbuffer = GBufferLane::new()
            .render(&mut resources, Some(&cam), &[plane])
            .unwrap();
        let (source, destination) = frame_pair(&resources, cam.viewport, settings.lit_format);
        resources
            .device()
            .clear_texture(source, Vec4::new(0.9, 0.1, 0.1, 1.0))
            .unwrap();
        Fixture {
            resources,
            gbuffer,
            view: cam.view,
            source,
            destination,
        }
    }

    fn sun() -> LightDescriptor {
        LightDescriptor::directional(Vec3::Z, LinearRgba::WHITE, 1.0)
    }

    #[test]
    fn head_on_sun_gives_uniform_albedo() {
        let settings = RenderSettings::default();
        let mut f = fixture(&settings);
        let mut lane = BaseLightingLane::new(&settings);
        let lit = lane
            .resolve(
                &mut f.resources,
                Some(&f.gbuffer),
                Some(&sun()),
                &f.view,
                f.source,
                f.destination,
            )
            .unwrap()
            .executed()
            .unwrap();

        let device = f.resources.device();
        let out = device.read_texture(f.destination).unwrap();
        assert_eq!(out, device.read_texture(lit.id).unwrap());
        for (_, _, c) in out.texels() {
            assert_relative_eq!(c.x, 0.2, epsilon = 1e-3);
            assert_relative_eq!(c.y, 0.4, epsilon = 1e-3);
            assert_relative_eq!(c.z, 0.6, epsilon = 1e-3);
        }
        assert_eq!(f.resources.get(TargetSlot::LitColor), Some(lit));
    }

    #[test]
    fn missing_inputs_pass_through() {
        let settings = RenderSettings::default();
        let mut f = fixture(&settings);
        let mut lane = BaseLightingLane::new(&settings);

        let disabled = sun().with_enabled(false);
        let spot = LightDescriptor::spot(Vec3::ZERO, Vec3::Z, 5.0, 0.3, LinearRgba::WHITE, 1.0);
        for light in [None, Some(&disabled), Some(&spot)] {
            let outcome = lane
                .resolve(&mut f.resources, Some(&f.gbuffer), light, &f.view, f.source, f.destination)
                .unwrap();
            assert!(outcome.is_passthrough());
        }
        let outcome = lane
            .resolve(&mut f.resources, None, Some(&sun()), &f.view, f.source, f.destination)
            .unwrap();
        assert!(outcome.is_passthrough());

        let device = f.resources.device();
        assert_eq!(
            device.read_texture(f.destination).unwrap().data,
            device.read_texture(f.source).unwrap().data
        );
        assert_eq!(f.resources.get(TargetSlot::LitColor), None);
    }

    #[test]
    fn no_material_passes_through() {
        let settings = RenderSettings::default();
        let mut f = fixture(&settings);
        let mut lane = BaseLightingLane::new(&settings);
        lane.set_material(None);
        let outcome = lane
            .resolve(&mut f.resources, Some(&f.gbuffer), Some(&sun()), &f.view, f.source, f.destination)
            .unwrap();
        assert_eq!(outcome, PassOutcome::PassedThrough);
    }

    #[test]
    fn shutdown_releases_lit_buffer() {
        let settings = RenderSettings::default();
        let mut f = fixture(&settings);
        let mut lane = BaseLightingLane::new(&settings);
        lane.resolve(&mut f.resources, Some(&f.gbuffer), Some(&sun()), &f.view, f.source, f.destination)
            .unwrap();
        let lit = f.resources.get(TargetSlot::LitColor).unwrap();
        lane.on_shutdown(&mut f.resources);
        assert!(f.resources.device().texture_descriptor(lit.id).is_none());
    }
}
