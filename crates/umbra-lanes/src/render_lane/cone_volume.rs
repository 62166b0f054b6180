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

//! Proxy geometry for spot-light volumes.
//!
//! A single unit cone serves every spot light: [`fit_to_light`] stretches it
//! to the light's range and angle and places it at the light. The mesh only
//! needs to cover the light's screen footprint; inclusion itself is decided
//! analytically by the mask program.

use std::collections::HashMap;
use std::sync::Arc;

use umbra_core::math::{AffineTransform, Quaternion, Vec3, TAU};
use umbra_core::renderer::{LightDescriptor, Mesh};

/// Fewest ring segments a cone can be built with.
pub const MIN_CONE_SEGMENTS: u32 = 3;

/// Builds the unit cone: apex at the origin, base disc of radius 1 at `z = 1`.
///
/// Vertex 0 is the apex, followed by `segments + 1` ring vertices (the first
/// one repeated to close the ring) and the base center. Side faces wind
/// apex, `ring[i + 1]`, `ring[i]`; cap faces wind center, `ring[i]`,
/// `ring[i + 1]`. For every face `(b - a) x (c - a)` points out of the cone,
/// which makes it clockwise on screen when seen from outside.
///
/// `segments` below [`MIN_CONE_SEGMENTS`] is raised to it.
pub fn build_unit_cone(segments: u32) -> Mesh {
    let segments = segments.max(MIN_CONE_SEGMENTS);
    let ring_len = segments + 1;

    let mut positions = Vec::with_capacity(ring_len as usize + 2);
    positions.push(Vec3::ZERO);
    for i in 0..ring_len {
        // `i % segments` makes the closing vertex bit-identical to the first.
        let theta = TAU * (i % segments) as f32 / segments as f32;
        positions.push(Vec3::new(theta.cos(), theta.sin(), 1.0));
    }
    positions.push(Vec3::Z);

    let apex = 0u32;
    let ring = |i: u32| 1 + i;
    let center = ring_len + 1;

    let mut indices = Vec::with_capacity(segments as usize * 6);
    for i in 0..segments {
        indices.extend_from_slice(&[apex, ring(i + 1), ring(i)]);
    }
    for i in 0..segments {
        indices.extend_from_slice(&[center, ring(i), ring(i + 1)]);
    }

    Mesh {
        positions,
        normals: Vec::new(),
        indices,
    }
}

/// Places the unit cone on a spot light.
///
/// The cone's +Z axis is aimed along the light's forward direction and it is
/// scaled to `(tan(half_angle) * range, tan(half_angle) * range, range)`.
/// Returns `None` for lights that are not spot lights. The result is derived
/// from the light every time; it is never cached.
pub fn fit_to_light(light: &LightDescriptor) -> Option<AffineTransform> {
    let (range, half_angle) = light.spot_parameters()?;
    let radius = half_angle.tan() * range;
    let rotation = Quaternion::from_rotation_arc(Vec3::Z, light.forward);
    Some(AffineTransform::from_trs(
        light.position,
        rotation,
        Vec3::new(radius, radius, range),
    ))
}

/// Hands out shared unit-cone meshes, one per segment count.
#[derive(Debug, Default)]
pub struct ConeVolumeBuilder {
    cache: HashMap<u32, Arc<Mesh>>,
}

impl ConeVolumeBuilder {
    /// Creates a builder with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unit cone with `segments` ring segments, building it once.
    pub fn unit_cone(&mut self, segments: u32) -> Arc<Mesh> {
        let segments = segments.max(MIN_CONE_SEGMENTS);
        self.cache
            .entry(segments)
            .or_insert_with(|| {
                log::trace!("Building unit cone with {segments} segments");
                Arc::new(build_unit_cone(segments))
            })
            .clone()
    }

    /// Returns a copy of `light` carrying the shared cone as its proxy volume.
    ///
    /// Lights that are not spot lights are returned unchanged.
    pub fn attach_proxy(&mut self, light: LightDescriptor, segments: u32) -> LightDescriptor {
        if light.is_spot() {
            light.with_proxy(self.unit_cone(segments))
        } else {
            light
        }
    }

    /// Returns the number of distinct meshes built so far.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
