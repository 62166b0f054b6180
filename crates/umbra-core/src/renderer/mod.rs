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

//! Rendering contracts, scene inputs and render-target ownership.

pub mod api;
pub mod camera;
pub mod error;
pub mod gbuffer;
pub mod light;
pub mod mesh;
pub mod resources;
pub mod surface;
pub mod traits;

pub use self::camera::Camera;
pub use self::error::{RenderError, ResourceError};
pub use self::gbuffer::{GBufferAttachment, GBufferSnapshot};
pub use self::light::{LightDescriptor, LightKind};
pub use self::mesh::Mesh;
pub use self::resources::{
    PooledTexture, ResourceManager, TargetSlot, TextureHandle, TransientPool,
};
pub use self::surface::{MaterialTag, Surface, SurfaceMaterial};
pub use self::traits::GraphicsDevice;
