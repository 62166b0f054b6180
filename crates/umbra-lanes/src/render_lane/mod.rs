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

//! Rendering lanes of the deferred spotlight pipeline.
//!
//! Each lane owns one stage: [`GBufferLane`] rasterizes surfaces,
//! [`BaseLightingLane`] resolves the directional light, [`LightVolumeMaskLane`]
//! marks the pixels each spot light can reach and [`SpotCompositeLane`] blends
//! the spot lights onto the lit image. Lanes hold configuration only; textures
//! live in the [`ResourceManager`](umbra_core::renderer::ResourceManager).

mod base_lighting_lane;
mod cone_volume;
mod gbuffer_lane;
mod light_volume_mask_lane;
pub mod shaders;
mod spot_composite_lane;

pub use base_lighting_lane::*;
pub use cone_volume::*;
pub use gbuffer_lane::*;
pub use light_volume_mask_lane::*;
pub use spot_composite_lane::*;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use umbra_core::math::{AffineTransform, Extent2D, LinearRgba, Vec3, FRAC_PI_2};
    use umbra_core::renderer::api::{TextureDescriptor, TextureFormat, TextureId, TextureKey};
    use umbra_core::renderer::{Camera, Mesh, ResourceManager, Surface, SurfaceMaterial};
    use umbra_infra::SoftwareDevice;

    pub fn resources() -> ResourceManager {
        ResourceManager::new(Arc::new(SoftwareDevice::new()))
    }

    /// A 90 degree camera at the origin looking down +Z.
    pub fn camera(extent: Extent2D) -> Camera {
        Camera::perspective(Vec3::ZERO, Vec3::Z, Vec3::Y, FRAC_PI_2, 0.1, 100.0, extent).unwrap()
    }

    /// A plane at depth `z` large enough to fill the view of [`camera`].
    pub fn covering_plane(z: f32, albedo: LinearRgba, specular: LinearRgba) -> Surface {
        Surface {
            mesh: Arc::new(Mesh::plane(100.0)),
            transform: AffineTransform::from_translation(Vec3::new(0.0, 0.0, z)),
            material: SurfaceMaterial::deferred(albedo, specular),
        }
    }

    /// The caller-owned input and output textures of one frame.
    pub fn frame_pair(
        resources: &ResourceManager,
        extent: Extent2D,
        format: TextureFormat,
    ) -> (TextureId, TextureId) {
        let key = TextureKey::new(extent, format);
        let device = resources.device();
        (
            device.create_texture(&TextureDescriptor::from_key("source", key)).unwrap(),
            device.create_texture(&TextureDescriptor::from_key("destination", key)).unwrap(),
        )
    }
}
