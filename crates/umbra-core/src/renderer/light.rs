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

//! Defines the light descriptors consumed by the lighting passes.
//!
//! Lights are supplied by the caller every frame and are never mutated by
//! the compositor; passes only read them and re-express them in view space.

use crate::math::{LinearRgba, Vec3};
use crate::renderer::mesh::Mesh;
use std::sync::Arc;

/// The kind of a light, with the parameters only that kind has.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// An infinitely distant light shining along the descriptor's `forward`.
    Directional,
    /// A cone of light starting at `position` and opening along `forward`.
    Spot {
        /// Distance at which the light's influence reaches zero.
        range: f32,
        /// Angle between the cone axis and its edge, in radians.
        half_angle: f32,
    },
}

/// A light as seen by the compositor.
///
/// # Examples
///
/// ```
/// use umbra_core::renderer::light::LightDescriptor;
/// use umbra_core::math::{LinearRgba, Vec3};
///
/// let lamp = LightDescriptor::spot(
///     Vec3::new(0.0, 3.0, 0.0),
///     Vec3::new(0.0, -1.0, 0.0),
///     8.0,
///     0.4,
///     LinearRgba::rgb(1.0, 0.9, 0.7),
///     2.0,
/// );
/// assert!(lamp.is_spot());
/// assert_eq!(lamp.premultiplied_color().r, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct LightDescriptor {
    /// Kind-specific parameters.
    pub kind: LightKind,
    /// World-space position. Ignored by directional lights.
    pub position: Vec3,
    /// World-space direction the light points to (from the light into the scene).
    pub forward: Vec3,
    /// Linear color.
    pub color: LinearRgba,
    /// Multiplier applied to `color`.
    pub intensity: f32,
    /// Whether the light component is enabled.
    pub enabled: bool,
    /// Whether the owning object is active in the scene.
    pub active: bool,
    /// The proxy volume rasterized to build this light's mask.
    pub proxy: Option<Arc<Mesh>>,
}

impl LightDescriptor {
    /// Creates an enabled directional light.
    pub fn directional(forward: Vec3, color: LinearRgba, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            forward: forward.normalize(),
            color,
            intensity,
            enabled: true,
            active: true,
            proxy: None,
        }
    }

    /// Creates an enabled spot light without a proxy volume.
    pub fn spot(
        position: Vec3,
        forward: Vec3,
        range: f32,
        half_angle: f32,
        color: LinearRgba,
        intensity: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot { range, half_angle },
            position,
            forward: forward.normalize(),
            color,
            intensity,
            enabled: true,
            active: true,
            proxy: None,
        }
    }

    /// Attaches a proxy volume mesh.
    pub fn with_proxy(mut self, proxy: Arc<Mesh>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns `true` for spot lights.
    pub fn is_spot(&self) -> bool {
        matches!(self.kind, LightKind::Spot { .. })
    }

    /// Returns `true` when the light is both enabled and active.
    pub fn is_live(&self) -> bool {
        self.enabled && self.active
    }

    /// Returns the light color multiplied by its intensity. Alpha is kept.
    pub fn premultiplied_color(&self) -> LinearRgba {
        self.color * self.intensity
    }

    /// Returns `(range, half_angle)` for spot lights.
    pub fn spot_parameters(&self) -> Option<(f32, f32)> {
        match self.kind {
            LightKind::Spot { range, half_angle } => Some((range, half_angle)),
            LightKind::Directional => None,
        }
    }

    /// Returns the cosine of the spot half-angle.
    pub fn spot_cos_half_angle(&self) -> Option<f32> {
        self.spot_parameters().map(|(_, half)| half.cos())
    }
}
