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

//! Shading programs of the deferred compositor.
//!
//! Each program is the CPU counterpart of a GPU shader: a uniform block laid
//! out for GPU consumption (`#[repr(C)]`, `Pod`) and the per-vertex or
//! per-pixel functions the device runs. Inputs other than uniforms are read
//! through the binding names in [`slots`](umbra_core::renderer::api::slots).
//!
//! # Available Programs
//!
//! - [`GBufferProgram`] - writes surface attributes into the five G-buffer color targets
//! - [`BaseLightingProgram`] - one directional light, Blinn-Phong, full screen
//! - [`VolumeMaskProgram`] - marks pixels whose surface lies inside a light volume
//! - [`MaskDebugProgram`] - shows a mask as a grey-scale image
//! - [`SpotBlendProgram`] - adds one masked spot light onto the accumulator

mod gbuffer;
mod lighting;
mod spot_blend;
mod volume_mask;

pub use gbuffer::*;
pub use lighting::*;
pub use spot_blend::*;
pub use volume_mask::*;

use umbra_core::math::Vec3;

/// Computes the Blinn-Phong half vector, or zero if `l` and `v` cancel out.
#[inline]
pub(crate) fn half_vector(l: Vec3, v: Vec3) -> Vec3 {
    (l + v).normalize()
}

/// Maps the specular alpha channel (gloss) to a Blinn-Phong exponent, at least 1.
#[inline]
pub fn shininess(gloss: f32, scale: f32) -> f32 {
    (gloss * scale).max(1.0)
}
