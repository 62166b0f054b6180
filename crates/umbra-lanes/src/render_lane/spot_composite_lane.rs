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

//! Implements the sequential spot-light compositor.
//!
//! The accumulator is a ping-pong pair of pooled textures. Each blended light
//! reads the current accumulator and writes a freshly acquired one; the old
//! one is released right after, so at most two are alive at any time.

use super::light_volume_mask_lane::MaskSet;
use super::shaders::{SpotBlendProgram, SpotLightUniforms};
use crate::passthrough::{run_or_passthrough, MissingInput, PassError, PassOutcome};
use umbra_core::lane::{Lane, LaneKind};
use umbra_core::renderer::api::{slots, FullscreenDraw, TextureBindings, TextureId};
use umbra_core::renderer::{
    Camera, GBufferAttachment, GBufferSnapshot, LightDescriptor, PooledTexture, RenderError,
    ResourceManager, TextureHandle,
};
use umbra_core::RenderSettings;

/// Shading parameters of the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeMaterial {
    /// Specular exponent reached at full gloss.
    pub shininess_scale: f32,
}

/// What one compositing pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Lights blended onto the accumulator.
    pub lights_blended: usize,
    /// Lights skipped (disabled, not a spot light, or without a mask).
    pub lights_skipped: usize,
    /// Highest number of accumulators alive at once.
    pub peak_accumulators: usize,
}

/// Blends every spot light's masked contribution onto the lit-color image.
#[derive(Debug)]
pub struct SpotCompositeLane {
    material: Option<CompositeMaterial>,
}

impl SpotCompositeLane {
    /// Creates a lane configured from `settings`.
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            material: Some(CompositeMaterial {
                shininess_scale: settings.shininess_scale,
            }),
        }
    }

    /// Replaces the shading material. With `None` the lane only passes
    /// frames through.
    pub fn set_material(&mut self, material: Option<CompositeMaterial>) {
        self.material = material;
    }

    /// Composites `lights` over `lit` and writes the result to `destination`.
    ///
    /// Lights are blended in list order; light `i` uses mask `i`. Without a
    /// material, G-buffer, lit buffer, masks or lights, `source` is copied to
    /// `destination` instead.
    #[allow(clippy::too_many_arguments)]
    pub fn composite(
        &mut self,
        resources: &mut ResourceManager,
        lit: Option<TextureHandle>,
        gbuffer: Option<&GBufferSnapshot>,
        lights: &[LightDescriptor],
        masks: Option<&MaskSet>,
        camera: &Camera,
        source: TextureId,
        destination: TextureId,
    ) -> Result<PassOutcome<CompositeStats>, RenderError> {
        let device = resources.device_arc();
        let material = self.material;

        run_or_passthrough(device.as_ref(), "SpotCompositeLane", source, destination, || {
            let material = material.ok_or(MissingInput::Material)?;
            let gbuffer = gbuffer.ok_or(MissingInput::GBuffer)?;
            let lit = lit.ok_or(MissingInput::LitBuffer)?;
            let masks = masks.ok_or(MissingInput::Masks)?;
            if lights.is_empty() {
                return Err(MissingInput::LightList.into());
            }

            let baseline = resources.transients().live_count();
            let mut current = resources.transients().acquire(lit.key)?;
            let blended = blend_lights(
                resources,
                material,
                lit,
                gbuffer,
                lights,
                masks,
                camera,
                destination,
                baseline,
                &mut current,
            );
            // The accumulator goes back to the pool whatever happened.
            resources.transients().release(current)?;
            let stats = blended?;

            log::debug!(
                "SpotCompositeLane: {} blended, {} skipped",
                stats.lights_blended,
                stats.lights_skipped
            );
            Ok(stats)
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn blend_lights(
    resources: &mut ResourceManager,
    material: CompositeMaterial,
    lit: TextureHandle,
    gbuffer: &GBufferSnapshot,
    lights: &[LightDescriptor],
    masks: &MaskSet,
    camera: &Camera,
    destination: TextureId,
    baseline: usize,
    current: &mut PooledTexture,
) -> Result<CompositeStats, PassError> {
    let device = resources.device_arc();
    device.copy_texture(lit.id, current.id())?;

    let mut stats = CompositeStats {
        peak_accumulators: 1,
        ..Default::default()
    };
    let surface_bindings = TextureBindings::new()
        .bind(slots::ALBEDO, gbuffer.texture(GBufferAttachment::Albedo))
        .bind(slots::NORMAL, gbuffer.texture(GBufferAttachment::Normal))
        .bind(slots::SPECULAR, gbuffer.texture(GBufferAttachment::Specular))
        .bind(slots::VIEW_POSITION, gbuffer.texture(GBufferAttachment::ViewPosition));

    for (index, light) in lights.iter().enumerate().take(masks.len()) {
        let mask = masks.get(index).filter(|_| light.is_live());
        let uniforms = SpotLightUniforms::new(light, &camera.view, material.shininess_scale);
        let (Some(mask), Some(uniforms)) = (mask, uniforms) else {
            log::trace!("SpotCompositeLane: light {index} skipped");
            stats.lights_skipped += 1;
            continue;
        };

        let next = resources.transients().acquire(lit.key)?;
        stats.peak_accumulators = stats
            .peak_accumulators
            .max(resources.transients_ref().live_count() - baseline);

        let bindings = surface_bindings
            .clone()
            .bind(slots::MAIN, current.id())
            .bind(slots::MASK, mask.id);
        let drawn = device.draw_fullscreen(&FullscreenDraw {
            label: "spot_blend",
            program: &SpotBlendProgram { uniforms },
            target: next.id(),
            bindings: &bindings,
        });
        if let Err(e) = drawn {
            resources.transients().release(next)?;
            return Err(e.into());
        }

        let previous = std::mem::replace(current, next);
        resources.transients().release(previous)?;
        stats.lights_blended += 1;
    }

    device.copy_texture(current.id(), destination)?;
    Ok(stats)
}

impl Lane for SpotCompositeLane {
    fn strategy_name(&self) -> &'static str {
        "SpotComposite"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Composite
    }

    fn execution_order(&self) -> u32 {
        20
    }

    fn on_shutdown(&mut self, resources: &mut ResourceManager) {
        // Accumulators never outlive a frame; only idle pool entries remain.
        let purged = resources.transients().purge();
        log::info!("SpotCompositeLane: purged {purged} pooled accumulators");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{camera, covering_plane, frame_pair, resources};
    use crate::render_lane::{
        BaseLightingLane, ConeVolumeBuilder, GBufferLane, LightVolumeMaskLane,
    };
    use umbra_core::math::{Extent2D, LinearRgba, Vec3, Vec4};
    use umbra_core::renderer::api::{TextureFormat, TextureReadback};

    const EXTENT: Extent2D = Extent2D::new(16, 16);

    struct Frame {
        resources: ResourceManager,
        camera: Camera,
        gbuffer: GBufferSnapshot,
        lit: TextureHandle,
        source: TextureId,
        destination: TextureId,
    }

    fn frame(settings: &RenderSettings) -> Frame {
        let mut resources = resources();
        let camera = camera(EXTENT);
        let plane = covering_plane(
            10.0,
            LinearRgba::rgb(0.2, 0.4, 0.6),
            LinearRgba::new(0.5, 0.5, 0.5, 0.25),
        );
        let gbuffer = GBufferLane::new()
            .render(&mut resources, Some(&camera), &[plane])
            .unwrap();
        let (source, destination) = frame_pair(&resources, EXTENT, settings.lit_format);
        let sun = LightDescriptor::directional(Vec3::Z, LinearRgba::WHITE, 0.5);
        let lit = BaseLightingLane::new(settings)
            .resolve(&mut resources, Some(&gbuffer), Some(&sun), &camera.view, source, destination)
            .unwrap()
            .executed()
            .unwrap();
        Frame {
            resources,
            camera,
            gbuffer,
            lit,
            source,
            destination,
        }
    }

    fn spot_at(builder: &mut ConeVolumeBuilder, x: f32, intensity: f32) -> LightDescriptor {
        builder.attach_proxy(
            LightDescriptor::spot(
                Vec3::new(x, 0.0, 5.0),
                Vec3::Z,
                8.0,
                0.4,
                LinearRgba::rgb(1.0, 0.8, 0.6),
                intensity,
            ),
            24,
        )
    }

    fn run(
        f: &mut Frame,
        settings: &RenderSettings,
        lights: &[LightDescriptor],
    ) -> (PassOutcome<CompositeStats>, TextureReadback) {
        let masks = LightVolumeMaskLane::new(settings)
            .generate_masks(&mut f.resources, Some(&f.gbuffer), lights, &f.camera, f.source, f.destination)
            .unwrap()
            .executed();
        let outcome = SpotCompositeLane::new(settings)
            .composite(
                &mut f.resources,
                Some(f.lit),
                Some(&f.gbuffer),
                lights,
                masks.as_ref(),
                &f.camera,
                f.source,
                f.destination,
            )
            .unwrap();
        let image = f.resources.device().read_texture(f.destination).unwrap();
        (outcome, image)
    }

    #[test]
    fn light_on_left_half_leaves_right_half_untouched() {
        let settings = RenderSettings::default();
        let mut f = frame(&settings);
        let base = f.resources.device().read_texture(f.lit.id).unwrap();
        let mut builder = ConeVolumeBuilder::new();
        let (outcome, image) = run(&mut f, &settings, &[spot_at(&mut builder, -5.0, 2.0)]);

        let stats = outcome.executed().unwrap();
        assert_eq!(stats.lights_blended, 1);
        let mut brighter = 0;
        for (x, y, c) in image.texels() {
            let b = base.texel(x, y);
            if x >= 8 {
                assert_eq!(c, b, "pixel ({x}, {y}) changed");
            } else if c != b {
                assert!(c.x >= b.x && c.y >= b.y && c.z >= b.z);
                brighter += 1;
            }
        }
        assert!(brighter > 0);
    }

    #[test]
    fn blending_order_does_not_matter() {
        let settings = RenderSettings {
            lit_format: TextureFormat::Rgba32Float,
            ..RenderSettings::default()
        };
        let mut builder = ConeVolumeBuilder::new();
        let a = spot_at(&mut builder, -2.0, 1.5);
        let b = spot_at(&mut builder, 1.0, 3.0);
        let c = spot_at(&mut builder, 0.0, 0.7);

        let mut f = frame(&settings);
        let (_, forward) = run(&mut f, &settings, &[a.clone(), b.clone(), c.clone()]);
        let (_, reversed) = run(&mut f, &settings, &[c, b, a]);
        for ((_, _, p), (_, _, q)) in forward.texels().zip(reversed.texels()) {
            for i in 0..4 {
                assert!((p[i] - q[i]).abs() <= 1e-5, "{p:?} vs {q:?}");
            }
        }
    }

    #[test]
    fn disabled_light_equals_absent_light() {
        let settings = RenderSettings::default();
        let mut builder = ConeVolumeBuilder::new();
        let on = spot_at(&mut builder, -3.0, 2.0);
        let off = spot_at(&mut builder, 3.0, 2.0).with_enabled(false);

        let mut f = frame(&settings);
        let (_, with_disabled) = run(&mut f, &settings, &[on.clone(), off]);
        let (_, without) = run(&mut f, &settings, &[on]);
        assert_eq!(with_disabled.data, without.data);
    }

    #[test]
    fn at_most_two_accumulators_are_alive() {
        let settings = RenderSettings::default();
        let mut builder = ConeVolumeBuilder::new();
        let lights: Vec<_> = (0..5)
            .map(|i| spot_at(&mut builder, i as f32 * 2.0 - 4.0, 1.0))
            .collect();
        let mut f = frame(&settings);
        let (outcome, _) = run(&mut f, &settings, &lights);
        let stats = outcome.executed().unwrap();
        assert_eq!(stats.lights_blended, 5);
        assert_eq!(stats.peak_accumulators, 2);
        assert_eq!(f.resources.transients_ref().live_count(), 0);
    }

    #[test]
    fn missing_lit_buffer_passes_through_byte_identical() {
        let settings = RenderSettings::default();
        let mut f = frame(&settings);
        f.resources
            .device()
            .clear_texture(f.source, Vec4::new(0.3, 0.6, 0.9, 1.0))
            .unwrap();
        let mut builder = ConeVolumeBuilder::new();
        let lights = [spot_at(&mut builder, 0.0, 1.0)];
        let outcome = SpotCompositeLane::new(&settings)
            .composite(
                &mut f.resources,
                None,
                Some(&f.gbuffer),
                &lights,
                Some(&MaskSet::default()),
                &f.camera,
                f.source,
                f.destination,
            )
            .unwrap();
        assert!(outcome.is_passthrough());
        let device = f.resources.device();
        assert_eq!(
            device.read_texture(f.destination).unwrap().data,
            device.read_texture(f.source).unwrap().data
        );
    }

    #[test]
    fn zero_lights_pass_through() {
        let settings = RenderSettings::default();
        let mut f = frame(&settings);
        let (outcome, _) = run(&mut f, &settings, &[]);
        assert!(outcome.is_passthrough());
        assert_eq!(f.resources.transients_ref().idle_count(), 0);
    }
}
