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

//! Implements the per-light volume mask pass.
//!
//! For every spot light the proxy cone is rasterized without depth test or
//! culling, so the mask is correct even with the camera inside the volume.
//! The fragment program then keeps only the pixels whose G-buffer surface
//! lies inside the analytic volume.

use super::cone_volume::fit_to_light;
use super::shaders::{MaskDebugProgram, VolumeMaskProgram, VolumeMaskUniforms};
use crate::passthrough::{run_or_passthrough, MissingInput, PassError, PassOutcome};
use umbra_core::lane::{Lane, LaneKind};
use umbra_core::math::Vec4;
use umbra_core::renderer::api::{
    slots, CullMode, FullscreenDraw, MeshDraw, TextureBindings, TextureFormat, TextureId,
    TextureKey,
};
use umbra_core::renderer::{
    Camera, GBufferAttachment, GBufferSnapshot, GraphicsDevice, LightDescriptor, RenderError,
    ResourceManager, TargetSlot, TextureHandle,
};
use umbra_core::RenderSettings;

/// Format of every light volume mask.
pub const MASK_FORMAT: TextureFormat = TextureFormat::R8Unorm;

/// Shading parameters of the mask pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskMaterial {
    /// Tolerance of the point-in-volume test.
    pub intersection_epsilon: f32,
}

/// The masks generated for one frame, indexed like the light list.
///
/// An absent entry means the light has no volume this frame (not a spot
/// light, or no proxy mesh) and must be treated as having no influence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskSet {
    masks: Vec<Option<TextureHandle>>,
}

impl MaskSet {
    /// Returns the mask of the light at `index`, if one was generated.
    pub fn get(&self, index: usize) -> Option<TextureHandle> {
        self.masks.get(index).copied().flatten()
    }

    /// Returns the number of light slots covered, present or not.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Returns `true` if the set covers no light.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Returns the number of masks actually generated.
    pub fn generated_count(&self) -> usize {
        self.masks.iter().flatten().count()
    }
}

/// Rasterizes one binary mask per spot light.
///
/// The mask pool (slots [`TargetSlot::Mask`]) grows to the largest light
/// count seen and is never shrunk automatically; [`Lane::on_shutdown`]
/// releases all of it.
#[derive(Debug)]
pub struct LightVolumeMaskLane {
    material: Option<MaskMaterial>,
    pool_len: usize,
    debug_mask: Option<usize>,
}

impl LightVolumeMaskLane {
    /// Creates a lane configured from `settings`.
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            material: Some(MaskMaterial {
                intersection_epsilon: settings.intersection_epsilon,
            }),
            pool_len: 0,
            debug_mask: settings.debug_mask,
        }
    }

    /// Replaces the shading material. With `None` the lane only passes
    /// frames through.
    pub fn set_material(&mut self, material: Option<MaskMaterial>) {
        self.material = material;
    }

    /// Selects a mask to display instead of the frame. The index is clamped
    /// to the pool when the frame is drawn.
    pub fn set_debug_mask(&mut self, index: Option<usize>) {
        self.debug_mask = index;
    }

    /// Returns the selected debug mask, if any.
    pub fn debug_mask(&self) -> Option<usize> {
        self.debug_mask
    }

    /// Returns the number of mask textures in the pool.
    pub fn pool_len(&self) -> usize {
        self.pool_len
    }

    /// Generates the masks of `lights` and writes the frame to `destination`.
    ///
    /// The frame is `source` copied unchanged, or the selected debug mask
    /// when debug display is on. Without a G-buffer or a material the lane
    /// passes through and generates nothing.
    pub fn generate_masks(
        &mut self,
        resources: &mut ResourceManager,
        gbuffer: Option<&GBufferSnapshot>,
        lights: &[LightDescriptor],
        camera: &Camera,
        source: TextureId,
        destination: TextureId,
    ) -> Result<PassOutcome<MaskSet>, RenderError> {
        let device = resources.device_arc();
        let material = self.material;
        let debug_mask = self.debug_mask;
        let pool_len = &mut self.pool_len;

        run_or_passthrough(device.as_ref(), "LightVolumeMaskLane", source, destination, || {
            let gbuffer = gbuffer.ok_or(MissingInput::GBuffer)?;
            let material = material.ok_or(MissingInput::Material)?;
            let key = TextureKey::new(gbuffer.extent, MASK_FORMAT);

            if lights.len() > *pool_len {
                log::debug!("LightVolumeMaskLane: pool grows {} -> {}", *pool_len, lights.len());
                *pool_len = lights.len();
            }
            let mut pool = Vec::with_capacity(*pool_len);
            for index in 0..*pool_len {
                pool.push(resources.ensure(TargetSlot::Mask(index), key)?);
            }

            let mut set = MaskSet {
                masks: vec![None; lights.len()],
            };
            for (index, light) in lights.iter().enumerate() {
                let mask = pool[index];
                if draw_mask(device.as_ref(), gbuffer, light, camera, mask.id, material)? {
                    set.masks[index] = Some(mask);
                } else {
                    log::trace!("LightVolumeMaskLane: light {index} has no volume");
                }
            }

            match debug_mask {
                Some(selected) if !pool.is_empty() => {
                    let shown = selected.min(pool.len() - 1);
                    let bindings = TextureBindings::new().bind(slots::MASK, pool[shown].id);
                    device.draw_fullscreen(&FullscreenDraw {
                        label: "mask_debug",
                        program: &MaskDebugProgram,
                        target: destination,
                        bindings: &bindings,
                    })?;
                }
                _ => device.copy_texture(source, destination)?,
            }

            log::debug!(
                "LightVolumeMaskLane: {}/{} masks generated",
                set.generated_count(),
                lights.len()
            );
            Ok(set)
        })
    }
}

/// Clears and draws the mask of one light. Returns `false`, leaving the
/// mask untouched, if the light has no volume.
fn draw_mask(
    device: &dyn GraphicsDevice,
    gbuffer: &GBufferSnapshot,
    light: &LightDescriptor,
    camera: &Camera,
    mask: TextureId,
    material: MaskMaterial,
) -> Result<bool, PassError> {
    let (Some(proxy), Some(fit)) = (light.proxy.as_ref(), fit_to_light(light)) else {
        return Ok(false);
    };
    let volume_to_view = camera.view * fit.to_matrix();
    let Some(uniforms) =
        VolumeMaskUniforms::new(volume_to_view, &camera.projection, material.intersection_epsilon)
    else {
        return Ok(false);
    };
    device.clear_texture(mask, Vec4::ZERO)?;
    let bindings =
        TextureBindings::new().bind(slots::VIEW_Z, gbuffer.texture(GBufferAttachment::ViewZ));
    device.draw_mesh(&MeshDraw {
        label: "light_volume_mask",
        mesh: proxy.as_ref(),
        program: &VolumeMaskProgram { uniforms },
        color_targets: &[mask],
        depth: None,
        bindings: &bindings,
        cull_mode: CullMode::None,
    })?;
    Ok(true)
}

impl Lane for LightVolumeMaskLane {
    fn strategy_name(&self) -> &'static str {
        "LightVolumeMask"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::VolumeMask
    }

    fn execution_order(&self) -> u32 {
        10
    }

    fn on_shutdown(&mut self, resources: &mut ResourceManager) {
        let released = resources.release_matching(|slot| matches!(slot, TargetSlot::Mask(_)));
        log::info!("LightVolumeMaskLane: released {released} masks");
        self.pool_len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{camera, covering_plane, frame_pair, resources};
    use crate::render_lane::{ConeVolumeBuilder, GBufferLane};
    use umbra_core::math::{Extent2D, LinearRgba, Vec3};
    use umbra_core::renderer::api::TextureReadback;

    const EXTENT: Extent2D = Extent2D::new(16, 16);

    struct Fixture {
        resources: ResourceManager,
        gbuffer: GBufferSnapshot,
        camera: Camera,
        source: TextureId,
        destination: TextureId,
    }

    fn fixture() -> Fixture {
        let mut resources = resources();
        let camera = camera(EXTENT);
        let plane = covering_plane(10.0, LinearRgba::WHITE, LinearRgba::BLACK);
        let gbuffer = GBufferLane::new()
            .render(&mut resources, Some(&camera), &[plane])
            .unwrap();
        let (source, destination) = frame_pair(&resources, EXTENT, TextureFormat::Rgba16Float);
        Fixture {
            resources,
            gbuffer,
            camera,
            source,
            destination,
        }
    }

    /// A spot light above the plane, pointing straight at it from `x`.
    fn spot_at(x: f32) -> LightDescriptor {
        let light = LightDescriptor::spot(
            Vec3::new(x, 0.0, 6.0),
            Vec3::Z,
            6.0,
            0.35,
            LinearRgba::WHITE,
            1.0,
        );
        ConeVolumeBuilder::new().attach_proxy(light, 24)
    }

    fn coverage(mask: &TextureReadback) -> (usize, usize) {
        let left = mask.texels().filter(|(x, _, m)| *x < 8 && m.x > 0.5).count();
        let right = mask.texels().filter(|(x, _, m)| *x >= 8 && m.x > 0.5).count();
        (left, right)
    }

    #[test]
    fn spot_light_marks_its_footprint_only() {
        let mut f = fixture();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        let lights = [spot_at(-5.0)];
        let set = lane
            .generate_masks(&mut f.resources, Some(&f.gbuffer), &lights, &f.camera, f.source, f.destination)
            .unwrap()
            .executed()
            .unwrap();

        let mask = set.get(0).unwrap();
        assert_eq!(mask.key, TextureKey::new(EXTENT, MASK_FORMAT));
        let (left, right) = coverage(&f.resources.device().read_texture(mask.id).unwrap());
        assert!(left > 0);
        assert_eq!(right, 0);
    }

    #[test]
    fn lights_without_volume_are_absent() {
        let mut f = fixture();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        let no_proxy = LightDescriptor::spot(Vec3::ZERO, Vec3::Z, 6.0, 0.3, LinearRgba::WHITE, 1.0);
        let sun = LightDescriptor::directional(Vec3::Z, LinearRgba::WHITE, 1.0);
        let lights = [no_proxy, sun, spot_at(0.0)];
        let set = lane
            .generate_masks(&mut f.resources, Some(&f.gbuffer), &lights, &f.camera, f.source, f.destination)
            .unwrap()
            .executed()
            .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.generated_count(), 1);
        assert!(set.get(0).is_none() && set.get(1).is_none());
        assert!(set.get(2).is_some());
        assert_eq!(lane.pool_len(), 3);
    }

    #[test]
    fn slots_without_volume_are_left_untouched() {
        let mut f = fixture();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        lane.generate_masks(&mut f.resources, Some(&f.gbuffer), &[spot_at(0.0)], &f.camera, f.source, f.destination)
            .unwrap();
        let slot = f.resources.get(TargetSlot::Mask(0)).unwrap();
        let before = f.resources.device().read_texture(slot.id).unwrap();
        assert!(before.texels().any(|(_, _, m)| m.x > 0.5));

        let no_proxy = LightDescriptor::spot(Vec3::ZERO, Vec3::Z, 6.0, 0.3, LinearRgba::WHITE, 1.0);
        let set = lane
            .generate_masks(&mut f.resources, Some(&f.gbuffer), &[no_proxy], &f.camera, f.source, f.destination)
            .unwrap()
            .executed()
            .unwrap();
        assert!(set.get(0).is_none());
        let after = f.resources.device().read_texture(slot.id).unwrap();
        assert_eq!(after.data, before.data);
    }

    #[test]
    fn pool_grows_but_never_shrinks() {
        let mut f = fixture();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        let many = [spot_at(-4.0), spot_at(0.0), spot_at(4.0)];
        lane.generate_masks(&mut f.resources, Some(&f.gbuffer), &many, &f.camera, f.source, f.destination)
            .unwrap();
        let set = lane
            .generate_masks(&mut f.resources, Some(&f.gbuffer), &many[..1], &f.camera, f.source, f.destination)
            .unwrap()
            .executed()
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(lane.pool_len(), 3);
        assert!(f.resources.get(TargetSlot::Mask(2)).is_some());

        lane.on_shutdown(&mut f.resources);
        assert_eq!(lane.pool_len(), 0);
        assert!(f.resources.get(TargetSlot::Mask(0)).is_none());
    }

    #[test]
    fn camera_inside_volume_still_masks() {
        let mut f = fixture();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        // Apex behind the camera, wide enough to hold the whole view.
        let light = ConeVolumeBuilder::new().attach_proxy(
            LightDescriptor::spot(Vec3::new(0.0, 0.0, -2.0), Vec3::Z, 30.0, 1.2, LinearRgba::WHITE, 1.0),
            24,
        );
        let set = lane
            .generate_masks(&mut f.resources, Some(&f.gbuffer), &[light], &f.camera, f.source, f.destination)
            .unwrap()
            .executed()
            .unwrap();
        let mask = f.resources.device().read_texture(set.get(0).unwrap().id).unwrap();
        assert!(mask.texels().all(|(_, _, m)| m.x > 0.5));
    }

    #[test]
    fn frame_is_copied_or_replaced_by_debug_mask() {
        let mut f = fixture();
        f.resources
            .device()
            .clear_texture(f.source, Vec4::new(0.25, 0.5, 0.75, 1.0))
            .unwrap();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        let lights = [spot_at(-5.0)];
        lane.generate_masks(&mut f.resources, Some(&f.gbuffer), &lights, &f.camera, f.source, f.destination)
            .unwrap();
        assert_eq!(
            f.resources.device().read_texture(f.destination).unwrap().data,
            f.resources.device().read_texture(f.source).unwrap().data
        );

        // Out-of-range indices clamp to the last pool entry.
        lane.set_debug_mask(Some(7));
        lane.generate_masks(&mut f.resources, Some(&f.gbuffer), &lights, &f.camera, f.source, f.destination)
            .unwrap();
        let shown = f.resources.device().read_texture(f.destination).unwrap();
        let (left, right) = coverage(&shown);
        assert!(left > 0);
        assert_eq!(right, 0);
    }

    #[test]
    fn missing_gbuffer_passes_through_without_allocating() {
        let mut f = fixture();
        let mut lane = LightVolumeMaskLane::new(&RenderSettings::default());
        let outcome = lane
            .generate_masks(&mut f.resources, None, &[spot_at(0.0)], &f.camera, f.source, f.destination)
            .unwrap();
        assert!(outcome.is_passthrough());
        assert_eq!(lane.pool_len(), 0);
    }
}
