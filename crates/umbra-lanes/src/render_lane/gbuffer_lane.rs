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

//! Implements the geometry pass that fills the G-buffer.

use super::shaders::{GBufferProgram, GBufferUniforms};
use umbra_core::lane::{Lane, LaneKind};
use umbra_core::math::Vec4;
use umbra_core::renderer::api::{
    CompareFunction, CullMode, DepthAttachment, MeshDraw, TextureBindings, TextureId,
};
use umbra_core::renderer::{
    Camera, GBufferAttachment, GBufferSnapshot, RenderError, ResourceManager, Surface,
    TargetSlot,
};

/// Renders every deferred surface into the G-buffer.
///
/// The lane owns the six attachments (slots [`TargetSlot::GBuffer`]). They
/// follow the viewport: a size change destroys and recreates all of them
/// before anything is drawn.
#[derive(Debug, Default)]
pub struct GBufferLane {
    snapshot: Option<GBufferSnapshot>,
}

impl GBufferLane {
    /// Creates an idle lane; attachments are allocated on the first frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshot published by the last frame, if any.
    pub fn snapshot(&self) -> Option<&GBufferSnapshot> {
        self.snapshot.as_ref()
    }

    /// Clears the G-buffer and renders `surfaces` into it.
    ///
    /// Surfaces whose material is not tagged for deferred shading are
    /// skipped. Without a camera, or with an empty viewport, the lane is
    /// inert and publishes no snapshot. A device failure also leaves the
    /// frame without a snapshot; it is logged and never returned.
    pub fn render(
        &mut self,
        resources: &mut ResourceManager,
        camera: Option<&Camera>,
        surfaces: &[Surface],
    ) -> Option<GBufferSnapshot> {
        self.snapshot = None;
        let Some(camera) = camera.filter(|c| !c.viewport.is_empty()) else {
            log::debug!("GBufferLane: no viewport, nothing rendered");
            return None;
        };
        match draw_surfaces(resources, camera, surfaces) {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("GBufferLane: no G-buffer this frame after device failure: {e}");
                None
            }
        }
    }
}

fn draw_surfaces(
    resources: &mut ResourceManager,
    camera: &Camera,
    surfaces: &[Surface],
) -> Result<GBufferSnapshot, RenderError> {
    let extent = camera.viewport;

    let mut ensure = |attachment: GBufferAttachment| {
        resources.ensure(TargetSlot::GBuffer(attachment), attachment.key(extent))
    };
    let snapshot = GBufferSnapshot {
        extent,
        attachments: [
            ensure(GBufferAttachment::Albedo)?,
            ensure(GBufferAttachment::Normal)?,
            ensure(GBufferAttachment::Specular)?,
            ensure(GBufferAttachment::ViewPosition)?,
            ensure(GBufferAttachment::ViewZ)?,
            ensure(GBufferAttachment::Depth)?,
        ],
    };

    let device = resources.device();
    for attachment in GBufferAttachment::COLOR {
        device.clear_texture(snapshot.texture(attachment), Vec4::ZERO)?;
    }
    let depth = snapshot.texture(GBufferAttachment::Depth);
    device.clear_texture(depth, Vec4::ONE)?;

    let color_targets: [TextureId; 5] = GBufferAttachment::COLOR.map(|a| snapshot.texture(a));
    let bindings = TextureBindings::new();
    let mut drawn = 0usize;
    for (index, surface) in surfaces.iter().enumerate() {
        if !surface.material.tag.is_deferred() {
            continue;
        }
        let Some(uniforms) = GBufferUniforms::new(
            surface.transform.to_matrix(),
            camera,
            surface.material.albedo,
            surface.material.specular,
        ) else {
            log::trace!("GBufferLane: surface {index} has a degenerate transform");
            continue;
        };
        let program = GBufferProgram { uniforms };
        let result = device.draw_mesh(&MeshDraw {
            label: "gbuffer",
            mesh: surface.mesh.as_ref(),
            program: &program,
            color_targets: &color_targets,
            depth: Some(DepthAttachment {
                texture: depth,
                compare: CompareFunction::LessEqual,
                write: true,
            }),
            bindings: &bindings,
            cull_mode: CullMode::Back,
        });
        match result {
            Ok(()) => drawn += 1,
            Err(RenderError::InvalidMesh { reason, .. }) => {
                log::warn!("GBufferLane: skipping surface {index}: {reason}");
            }
            Err(e) => return Err(e),
        }
    }

    log::debug!(
        "GBufferLane: {drawn}/{} surfaces rendered at {extent}",
        surfaces.len()
    );
    Ok(snapshot)
}

impl Lane for GBufferLane {
    fn strategy_name(&self) -> &'static str {
        "GBuffer"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::GeometryBuffer
    }

    fn execution_order(&self) -> u32 {
        0
    }

    fn on_shutdown(&mut self, resources: &mut ResourceManager) {
        let released = resources.release_matching(|slot| matches!(slot, TargetSlot::GBuffer(_)));
        log::info!("GBufferLane: released {released} attachments");
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::{camera, covering_plane, resources};
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use umbra_core::math::{Extent2D, LinearRgba};
    use umbra_core::renderer::api::{FullscreenDraw, TextureDescriptor, TextureReadback};
    use umbra_core::renderer::{GraphicsDevice, MaterialTag, ResourceError, SurfaceMaterial};
    use umbra_infra::SoftwareDevice;

    /// A software device whose mesh draws always fail.
    #[derive(Debug, Default)]
    struct LostDevice(SoftwareDevice);

    impl GraphicsDevice for LostDevice {
        fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
            self.0.create_texture(descriptor)
        }
        fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
            self.0.destroy_texture(id)
        }
        fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor<'static>> {
            self.0.texture_descriptor(id)
        }
        fn live_texture_count(&self) -> usize {
            self.0.live_texture_count()
        }
        fn clear_texture(&self, id: TextureId, value: Vec4) -> Result<(), ResourceError> {
            self.0.clear_texture(id, value)
        }
        fn copy_texture(&self, source: TextureId, destination: TextureId) -> Result<(), ResourceError> {
            self.0.copy_texture(source, destination)
        }
        fn read_texture(&self, id: TextureId) -> Result<TextureReadback, ResourceError> {
            self.0.read_texture(id)
        }
        fn draw_mesh(&self, _draw: &MeshDraw<'_>) -> Result<(), RenderError> {
            Err(ResourceError::BackendError("lost".into()).into())
        }
        fn draw_fullscreen(&self, draw: &FullscreenDraw<'_>) -> Result<(), RenderError> {
            self.0.draw_fullscreen(draw)
        }
    }

    #[test]
    fn covering_plane_fills_every_attachment() {
        let mut resources = resources();
        let mut lane = GBufferLane::new();
        let albedo = LinearRgba::rgb(0.2, 0.4, 0.6);
        let plane = covering_plane(5.0, albedo, LinearRgba::new(1.0, 1.0, 1.0, 0.5));
        let cam = camera(Extent2D::new(8, 8));

        let snapshot = lane.render(&mut resources, Some(&cam), &[plane]).unwrap();
        let device = resources.device();

        let albedo_px = device.read_texture(snapshot.texture(GBufferAttachment::Albedo)).unwrap();
        assert!(albedo_px.texels().all(|(_, _, c)| c == albedo.to_vec4()));

        let view_z = device.read_texture(snapshot.texture(GBufferAttachment::ViewZ)).unwrap();
        for (_, _, z) in view_z.texels() {
            assert_relative_eq!(z.x, 5.0, epsilon = 1e-2);
        }

        let normal = device.read_texture(snapshot.texture(GBufferAttachment::Normal)).unwrap();
        assert_relative_eq!(normal.texel(3, 3).z, -1.0, epsilon = 1e-3);

        let depth = device.read_texture(snapshot.texture(GBufferAttachment::Depth)).unwrap();
        assert!(depth.texels().all(|(_, _, d)| d.x > 0.0 && d.x < 1.0));
    }

    #[test]
    fn non_deferred_surfaces_are_skipped() {
        let mut resources = resources();
        let mut lane = GBufferLane::new();
        let mut plane = covering_plane(5.0, LinearRgba::WHITE, LinearRgba::BLACK);
        plane.material = SurfaceMaterial {
            tag: MaterialTag("Umbra/Unlit".into()),
            ..plane.material
        };
        let snapshot = lane
            .render(&mut resources, Some(&camera(Extent2D::new(4, 4))), &[plane])
            .unwrap();
        let view_z = resources
            .device()
            .read_texture(snapshot.texture(GBufferAttachment::ViewZ))
            .unwrap();
        assert!(view_z.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn no_camera_is_inert() {
        let mut resources = resources();
        let mut lane = GBufferLane::new();
        assert_eq!(lane.render(&mut resources, None, &[]), None);
        assert_eq!(resources.device().live_texture_count(), 0);

        let empty = camera(Extent2D::new(0, 0));
        assert_eq!(lane.render(&mut resources, Some(&empty), &[]), None);
        assert!(lane.snapshot().is_none());
    }

    #[test]
    fn device_failure_publishes_no_snapshot() {
        let mut resources = ResourceManager::new(Arc::new(LostDevice::default()));
        let mut lane = GBufferLane::new();
        let plane = covering_plane(5.0, LinearRgba::WHITE, LinearRgba::BLACK);
        let cam = camera(Extent2D::new(4, 4));

        assert_eq!(lane.render(&mut resources, Some(&cam), &[plane]), None);
        assert!(lane.snapshot().is_none());

        // Without deferred surfaces nothing is drawn, so the lane recovers.
        assert!(lane.render(&mut resources, Some(&cam), &[]).is_some());
    }

    #[test]
    fn resize_reallocates_every_attachment() {
        let mut resources = resources();
        let mut lane = GBufferLane::new();
        let small = lane
            .render(&mut resources, Some(&camera(Extent2D::new(4, 4))), &[])
            .unwrap();
        let large = lane
            .render(&mut resources, Some(&camera(Extent2D::new(6, 3))), &[])
            .unwrap();

        for attachment in GBufferAttachment::ALL {
            let (old, new) = (small.handle(attachment), large.handle(attachment));
            assert_ne!(old.version, new.version);
            assert_eq!(new.key.size, Extent2D::new(6, 3));
            assert_eq!(new.key.format, attachment.format());
            assert!(resources.device().texture_descriptor(old.id).is_none());
        }
        assert_eq!(resources.device().live_texture_count(), 6);

        lane.on_shutdown(&mut resources);
        assert_eq!(resources.device().live_texture_count(), 0);
    }
}
