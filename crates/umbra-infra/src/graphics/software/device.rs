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

use super::raster::{rasterize_triangle, Fragment};
use super::sampler::BoundTextures;
use super::storage::TextureStorage;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};

use umbra_core::math::{Extent2D, Vec3, Vec4};
use umbra_core::renderer::api::{
    CompareFunction, FragmentInput, FullscreenDraw, MeshDraw, TextureBindings, TextureDescriptor,
    TextureFormat, TextureId, TextureReadback, VertexInput, VertexOutput, MAX_COLOR_TARGETS,
};
use umbra_core::renderer::{GraphicsDevice, RenderError, ResourceError};

/// Counters describing the work a [`SoftwareDevice`] has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Mesh and full-screen draws executed.
    pub draw_calls: u64,
    /// Fragments that reached a program's fragment stage.
    pub fragments_shaded: u64,
    /// Textures created since the device was built.
    pub textures_created: u64,
    /// Bytes currently held by live textures.
    pub allocated_bytes: u64,
}

/// A graphics device that rasterizes on the CPU.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    textures: RwLock<HashMap<TextureId, TextureStorage>>,
    next_texture_id: AtomicUsize,
    draw_calls: AtomicU64,
    fragments_shaded: AtomicU64,
    textures_created: AtomicU64,
    allocated_bytes: AtomicU64,
}

impl SoftwareDevice {
    /// Creates a device with no textures.
    pub fn new() -> Self {
        log::info!("Software graphics device created");
        Self::default()
    }

    /// Returns a snapshot of the device counters.
    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            fragments_shaded: self.fragments_shaded.load(Ordering::Relaxed),
            textures_created: self.textures_created.load(Ordering::Relaxed),
            allocated_bytes: self.allocated_bytes.load(Ordering::Relaxed),
        }
    }

    fn write_textures(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<TextureId, TextureStorage>>, ResourceError> {
        self.textures.write().map_err(|e| {
            ResourceError::BackendError(format!("Software texture store poisoned: {e}"))
        })
    }

    /// Runs `pass` with `targets` taken out of the texture store so that the
    /// remaining store can be read through `bindings` without aliasing.
    ///
    /// Targets are put back whatever the pass returns.
    fn with_targets<R>(
        &self,
        targets: &[TextureId],
        bindings: &TextureBindings,
        pass: impl FnOnce(&mut [TextureStorage], &BoundTextures<'_>) -> Result<R, RenderError>,
    ) -> Result<R, RenderError> {
        let mut store = self.write_textures()?;

        for (slot, id) in bindings.iter() {
            if targets.contains(&id) {
                return Err(ResourceError::ReadWriteHazard {
                    id,
                    slot: slot.to_string(),
                }
                .into());
            }
            if !store.contains_key(&id) {
                return Err(ResourceError::NotFound { id }.into());
            }
        }

        let mut taken = Vec::with_capacity(targets.len());
        for &id in targets {
            match store.remove(&id) {
                Some(storage) => taken.push(storage),
                None => {
                    for (id, storage) in targets.iter().zip(taken) {
                        store.insert(*id, storage);
                    }
                    return Err(ResourceError::NotFound { id }.into());
                }
            }
        }

        let result = {
            let bound = BoundTextures::new(
                bindings
                    .iter()
                    .filter_map(|(slot, id)| store.get(&id).map(|s| (slot, s)))
                    .collect(),
            );
            pass(&mut taken, &bound)
        };

        for (id, storage) in targets.iter().zip(taken) {
            store.insert(*id, storage);
        }
        result
    }
}

/// Checks that every target shares one extent and returns it.
fn common_extent(targets: &[TextureStorage]) -> Result<Extent2D, ResourceError> {
    let extent = targets.first().map(TextureStorage::extent).unwrap_or_default();
    for t in targets {
        if t.extent() != extent {
            return Err(ResourceError::SizeMismatch {
                expected: extent,
                found: t.extent(),
            });
        }
    }
    Ok(extent)
}

impl GraphicsDevice for SoftwareDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.is_empty() {
            return Err(ResourceError::InvalidDescriptor {
                label: descriptor.label.as_deref().map(str::to_owned),
                reason: format!("zero-sized extent {}", descriptor.size),
            });
        }
        let storage = TextureStorage::new(descriptor.clone().into_owned());
        let bytes = storage.data.len() as u64;
        let id = TextureId(self.next_texture_id.fetch_add(1, Ordering::Relaxed));
        self.write_textures()?.insert(id, storage);

        self.textures_created.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(bytes, Ordering::Relaxed);
        log::trace!(
            "Created texture {id:?} '{}' {} {:?}",
            descriptor.label.as_deref().unwrap_or("unnamed"),
            descriptor.size,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let storage = self
            .write_textures()?
            .remove(&id)
            .ok_or(ResourceError::NotFound { id })?;
        self.allocated_bytes
            .fetch_sub(storage.data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor<'static>> {
        let store = self.textures.read().ok()?;
        store.get(&id).map(|t| t.descriptor.clone())
    }

    fn live_texture_count(&self) -> usize {
        self.textures.read().map(|s| s.len()).unwrap_or(0)
    }

    fn clear_texture(&self, id: TextureId, value: Vec4) -> Result<(), ResourceError> {
        self.write_textures()?
            .get_mut(&id)
            .ok_or(ResourceError::NotFound { id })?
            .fill(value);
        Ok(())
    }

    fn copy_texture(&self, source: TextureId, destination: TextureId) -> Result<(), ResourceError> {
        if source == destination {
            return Ok(());
        }
        let mut store = self.write_textures()?;
        let mut dst = store
            .remove(&destination)
            .ok_or(ResourceError::NotFound { id: destination })?;
        let result = match store.get(&source) {
            Some(src) => {
                dst.blit_from(src);
                Ok(())
            }
            None => Err(ResourceError::NotFound { id: source }),
        };
        store.insert(destination, dst);
        result
    }

    fn read_texture(&self, id: TextureId) -> Result<TextureReadback, ResourceError> {
        let store = self.textures.read().map_err(|e| {
            ResourceError::BackendError(format!("Software texture store poisoned: {e}"))
        })?;
        let t = store.get(&id).ok_or(ResourceError::NotFound { id })?;
        Ok(TextureReadback {
            size: t.extent(),
            format: t.format(),
            data: t.data.clone(),
        })
    }

    fn draw_mesh(&self, draw: &MeshDraw<'_>) -> Result<(), RenderError> {
        if draw.color_targets.len() > MAX_COLOR_TARGETS {
            return Err(RenderError::TooManyColorTargets {
                count: draw.color_targets.len(),
                max: MAX_COLOR_TARGETS,
            });
        }
        if draw.color_targets.is_empty() && draw.depth.is_none() {
            return Err(RenderError::NoRenderTarget {
                label: draw.label.to_owned(),
            });
        }
        draw.mesh
            .validate()
            .map_err(|reason| RenderError::InvalidMesh {
                label: draw.label.to_owned(),
                reason,
            })?;

        // Color targets first, then the optional depth target.
        let mut targets: Vec<TextureId> = draw.color_targets.to_vec();
        if let Some(depth) = draw.depth {
            targets.push(depth.texture);
        }
        let color_count = draw.color_targets.len();

        let shaded = self.with_targets(&targets, draw.bindings, |storages, bound| {
            let extent = common_extent(storages)?;
            for (i, s) in storages.iter().enumerate() {
                let is_depth_slot = i >= color_count;
                if s.format().is_depth() != is_depth_slot {
                    return Err(ResourceError::FormatMismatch {
                        id: targets[i],
                        expected: if is_depth_slot {
                            TextureFormat::Depth32Float
                        } else {
                            TextureFormat::Rgba16Float
                        },
                        found: s.format(),
                    }
                    .into());
                }
            }
            let (colors, depth_target) = storages.split_at_mut(color_count);
            let mut depth_target = depth_target.first_mut();

            let transformed: Vec<VertexOutput> = (0..draw.mesh.vertex_count())
                .map(|i| {
                    draw.program.vertex(&VertexInput {
                        position: draw.mesh.positions[i],
                        normal: draw.mesh.normals.get(i).copied().unwrap_or(Vec3::ZERO),
                    })
                })
                .collect();

            let mut shaded = 0u64;
            for tri in draw.mesh.triangles() {
                let verts = tri.map(|i| transformed[i as usize]);
                rasterize_triangle(verts, extent, draw.cull_mode, |frag: Fragment| {
                    let [x, y] = frag.pixel;
                    if let (Some(attachment), Some(depth_buffer)) =
                        (draw.depth, depth_target.as_deref())
                    {
                        if !(0.0..=1.0).contains(&frag.depth) {
                            return;
                        }
                        if attachment.compare == CompareFunction::LessEqual
                            && frag.depth > depth_buffer.load(x, y).x
                        {
                            return;
                        }
                    }

                    shaded += 1;
                    let input = FragmentInput {
                        pixel: frag.pixel,
                        extent,
                        depth: frag.depth,
                        front_facing: frag.front_facing,
                        varyings: frag.varyings,
                    };
                    let Some(output) = draw.program.fragment(&input, bound) else {
                        return;
                    };
                    for (target, value) in colors.iter_mut().zip(output.colors) {
                        target.store(x, y, value);
                    }
                    if let (Some(attachment), Some(depth_buffer)) =
                        (draw.depth, depth_target.as_deref_mut())
                    {
                        if attachment.write {
                            depth_buffer.store(x, y, Vec4::new(frag.depth, 0.0, 0.0, 1.0));
                        }
                    }
                });
            }
            Ok(shaded)
        })?;

        self.draw_calls.fetch_add(1, Ordering::Relaxed);
        self.fragments_shaded.fetch_add(shaded, Ordering::Relaxed);
        log::trace!("Draw '{}' shaded {shaded} fragments", draw.label);
        Ok(())
    }

    fn draw_fullscreen(&self, draw: &FullscreenDraw<'_>) -> Result<(), RenderError> {
        let shaded = self.with_targets(&[draw.target], draw.bindings, |storages, bound| {
            let target = &mut storages[0];
            if target.format().is_depth() {
                return Err(ResourceError::FormatMismatch {
                    id: draw.target,
                    expected: TextureFormat::Rgba16Float,
                    found: target.format(),
                }
                .into());
            }
            let extent = target.extent();
            for y in 0..extent.height {
                for x in 0..extent.width {
                    let value = draw.program.shade([x, y], extent, bound);
                    target.store(x, y, value);
                }
            }
            Ok(extent.pixel_count() as u64)
        })?;

        self.draw_calls.fetch_add(1, Ordering::Relaxed);
        self.fragments_shaded.fetch_add(shaded, Ordering::Relaxed);
        log::trace!("Fullscreen draw '{}' shaded {shaded} pixels", draw.label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::{Mat4, FRAC_PI_2};
    use umbra_core::renderer::api::{
        slots, CullMode, DepthAttachment, FragmentOutput, FullscreenProgram, MeshProgram,
        TextureKey, TextureSampler, MAX_VARYINGS,
    };
    use umbra_core::renderer::Mesh;

    fn texture(device: &SoftwareDevice, w: u32, h: u32, format: TextureFormat) -> TextureId {
        device
            .create_texture(&TextureDescriptor::from_key(
                "test",
                TextureKey::new(Extent2D::new(w, h), format),
            ))
            .unwrap()
    }

    /// Projects object space through a fixed camera and writes a flat color.
    struct FlatProgram {
        view_projection: Mat4,
        color: Vec4,
    }

    impl MeshProgram for FlatProgram {
        fn vertex(&self, input: &VertexInput) -> VertexOutput {
            VertexOutput {
                clip: self.view_projection * input.position.extend(1.0),
                varyings: [Vec4::ZERO; MAX_VARYINGS],
            }
        }

        fn fragment(
            &self,
            _input: &FragmentInput,
            _textures: &dyn TextureSampler,
        ) -> Option<FragmentOutput> {
            Some(FragmentOutput::single(self.color))
        }
    }

    /// Copies the `main` binding, inverted.
    struct InvertProgram;

    impl FullscreenProgram for InvertProgram {
        fn shade(&self, pixel: [u32; 2], _extent: Extent2D, textures: &dyn TextureSampler) -> Vec4 {
            Vec4::ONE - textures.load(slots::MAIN, pixel)
        }
    }

    fn projection() -> Mat4 {
        Mat4::perspective_lh_zo(FRAC_PI_2, 1.0, 0.1, 100.0).unwrap()
    }

    fn plane_at(z: f32, half: f32) -> Mesh {
        let mut mesh = Mesh::plane(half);
        for p in &mut mesh.positions {
            p.z = z;
        }
        mesh
    }

    #[test]
    fn texture_lifecycle_tracks_bytes() {
        let device = SoftwareDevice::new();
        let id = texture(&device, 4, 4, TextureFormat::Rgba16Float);
        assert_eq!(device.live_texture_count(), 1);
        assert_eq!(device.stats().allocated_bytes, 4 * 4 * 8);
        device.destroy_texture(id).unwrap();
        assert_eq!(device.stats().allocated_bytes, 0);
        assert!(matches!(
            device.destroy_texture(id),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn zero_sized_textures_are_rejected() {
        let device = SoftwareDevice::new();
        let result = device.create_texture(&TextureDescriptor::from_key(
            "empty",
            TextureKey::new(Extent2D::new(0, 4), TextureFormat::R8Unorm),
        ));
        assert!(matches!(result, Err(ResourceError::InvalidDescriptor { .. })));
    }

    #[test]
    fn depth_test_keeps_nearest_surface() {
        let device = SoftwareDevice::new();
        let color = texture(&device, 16, 16, TextureFormat::Rgba8Unorm);
        let depth = texture(&device, 16, 16, TextureFormat::Depth32Float);
        device.clear_texture(depth, Vec4::ONE).unwrap();

        let near = FlatProgram {
            view_projection: projection(),
            color: Vec4::new(1.0, 0.0, 0.0, 1.0),
        };
        let far = FlatProgram {
            view_projection: projection(),
            color: Vec4::new(0.0, 1.0, 0.0, 1.0),
        };
        let bindings = TextureBindings::new();
        let attachment = Some(DepthAttachment {
            texture: depth,
            compare: CompareFunction::LessEqual,
            write: true,
        });
        let near_mesh = plane_at(2.0, 10.0);
        let far_mesh = plane_at(4.0, 10.0);

        for (mesh, program) in [(&near_mesh, &near), (&far_mesh, &far)] {
            device
                .draw_mesh(&MeshDraw {
                    label: "plane",
                    mesh,
                    program,
                    color_targets: &[color],
                    depth: attachment,
                    bindings: &bindings,
                    cull_mode: CullMode::Back,
                })
                .unwrap();
        }

        let pixels = device.read_texture(color).unwrap();
        assert!(pixels.texels().all(|(_, _, c)| c == Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert!(device.stats().draw_calls >= 2);
    }

    #[test]
    fn culled_back_face_writes_nothing() {
        let device = SoftwareDevice::new();
        let color = texture(&device, 8, 8, TextureFormat::Rgba8Unorm);
        let mut mesh = plane_at(3.0, 10.0);
        mesh.indices = vec![0, 2, 1, 0, 3, 2];
        let program = FlatProgram {
            view_projection: projection(),
            color: Vec4::ONE,
        };
        device
            .draw_mesh(&MeshDraw {
                label: "reversed",
                mesh: &mesh,
                program: &program,
                color_targets: &[color],
                depth: None,
                bindings: &TextureBindings::new(),
                cull_mode: CullMode::Back,
            })
            .unwrap();
        let pixels = device.read_texture(color).unwrap();
        assert!(pixels.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn binding_a_target_is_a_hazard() {
        let device = SoftwareDevice::new();
        let a = texture(&device, 4, 4, TextureFormat::Rgba8Unorm);
        let bindings = TextureBindings::new().bind(slots::MAIN, a);
        let err = device
            .draw_fullscreen(&FullscreenDraw {
                label: "self-read",
                program: &InvertProgram,
                target: a,
                bindings: &bindings,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::ResourceError(ResourceError::ReadWriteHazard { .. })
        ));
        // The target survives the failed draw.
        assert!(device.texture_descriptor(a).is_some());
    }

    #[test]
    fn mismatched_target_sizes_are_rejected() {
        let device = SoftwareDevice::new();
        let a = texture(&device, 4, 4, TextureFormat::Rgba8Unorm);
        let b = texture(&device, 8, 4, TextureFormat::Rgba8Unorm);
        let program = FlatProgram {
            view_projection: projection(),
            color: Vec4::ONE,
        };
        let err = device
            .draw_mesh(&MeshDraw {
                label: "mrt",
                mesh: &plane_at(3.0, 1.0),
                program: &program,
                color_targets: &[a, b],
                depth: None,
                bindings: &TextureBindings::new(),
                cull_mode: CullMode::None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::ResourceError(ResourceError::SizeMismatch { .. })
        ));
        assert_eq!(device.live_texture_count(), 2);
    }

    #[test]
    fn fullscreen_reads_bindings_and_copy_converts() {
        let device = SoftwareDevice::new();
        let src = texture(&device, 4, 4, TextureFormat::Rgba32Float);
        let dst = texture(&device, 4, 4, TextureFormat::Rgba16Float);
        device
            .clear_texture(src, Vec4::new(0.25, 0.5, 0.75, 1.0))
            .unwrap();
        device
            .draw_fullscreen(&FullscreenDraw {
                label: "invert",
                program: &InvertProgram,
                target: dst,
                bindings: &TextureBindings::new().bind(slots::MAIN, src),
            })
            .unwrap();
        let out = device.read_texture(dst).unwrap();
        assert_eq!(out.texel(3, 3), Vec4::new(0.75, 0.5, 0.25, 0.0));

        let small = texture(&device, 2, 2, TextureFormat::Rgba8Unorm);
        device.copy_texture(dst, small).unwrap();
        let texel = device.read_texture(small).unwrap().texel(1, 1);
        assert_eq!(texel.x, 191.0 / 255.0);
    }
}
