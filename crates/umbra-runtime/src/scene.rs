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

//! Scene files: a TOML description of the viewport, camera, surfaces and
//! lights, turned into the values the render agent consumes.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use umbra_core::math::{AffineTransform, Extent2D, LinearRgba, Quaternion, Vec3};
use umbra_core::renderer::{Camera, LightDescriptor, MaterialTag, Mesh, Surface, SurfaceMaterial};
use umbra_core::RenderSettings;
use umbra_lanes::render_lane::ConeVolumeBuilder;

/// A complete scene as read from disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub viewport: Extent2D,
    /// Color of the frame entering the compositor.
    #[serde(default = "default_background")]
    pub background: LinearRgba,
    pub camera: CameraConfig,
    #[serde(default)]
    pub settings: RenderSettings,
    #[serde(default)]
    pub surfaces: Vec<SurfaceConfig>,
    pub directional: Option<DirectionalConfig>,
    #[serde(default)]
    pub spots: Vec<SpotConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub eye: Vec3,
    pub direction: Vec3,
    #[serde(default = "default_up")]
    pub up: Vec3,
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Plane,
    Cube,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceConfig {
    pub shape: Shape,
    #[serde(default = "default_half_extent")]
    pub half_extent: f32,
    #[serde(default)]
    pub translation: Vec3,
    /// Direction the shape's -Z side is turned towards. A plane is visible
    /// from this side only.
    pub facing: Option<Vec3>,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    pub albedo: LinearRgba,
    /// Specular color; alpha is the glossiness.
    #[serde(default)]
    pub specular: LinearRgba,
    /// Material tag; surfaces with another tag than the deferred one are
    /// not drawn into the G-buffer.
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionalConfig {
    pub direction: Vec3,
    #[serde(default = "default_color")]
    pub color: LinearRgba,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpotConfig {
    pub position: Vec3,
    pub direction: Vec3,
    pub range: f32,
    pub half_angle_degrees: f32,
    #[serde(default = "default_color")]
    pub color: LinearRgba,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Whether the light carries a cone volume. Without one it is never
    /// composited.
    #[serde(default = "default_enabled")]
    pub proxy: bool,
}

fn default_background() -> LinearRgba {
    LinearRgba::BLACK
}
fn default_up() -> Vec3 {
    Vec3::Y
}
fn default_fov() -> f32 {
    60.0
}
fn default_near() -> f32 {
    0.1
}
fn default_far() -> f32 {
    100.0
}
fn default_half_extent() -> f32 {
    1.0
}
fn default_scale() -> Vec3 {
    Vec3::ONE
}
fn default_color() -> LinearRgba {
    LinearRgba::WHITE
}
fn default_intensity() -> f32 {
    1.0
}
fn default_enabled() -> bool {
    true
}

impl Scene {
    /// Reads and validates a scene file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file at '{}'", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Failed to load scene from '{}'", path.display()))
    }

    /// Parses and validates a scene from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let scene: Scene = toml::from_str(text).context("Failed to parse scene TOML")?;
        scene.validate()?;
        Ok(scene)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.camera;
        ensure!(
            c.fov_degrees > 0.0 && c.fov_degrees < 180.0,
            "camera fov_degrees must be in (0, 180), got {}",
            c.fov_degrees
        );
        ensure!(
            c.near > 0.0 && c.far > c.near,
            "camera needs 0 < near < far, got near {} far {}",
            c.near,
            c.far
        );
        for (i, surface) in self.surfaces.iter().enumerate() {
            ensure!(surface.half_extent > 0.0, "surface {i}: half_extent must be positive");
            if let Some(facing) = surface.facing {
                ensure!(facing.length_squared() > 0.0, "surface {i}: facing is a zero vector");
            }
        }
        for (i, spot) in self.spots.iter().enumerate() {
            ensure!(spot.range > 0.0, "spot {i}: range must be positive");
            ensure!(
                spot.half_angle_degrees > 0.0 && spot.half_angle_degrees < 90.0,
                "spot {i}: half_angle_degrees must be in (0, 90), got {}",
                spot.half_angle_degrees
            );
            ensure!(spot.direction.length_squared() > 0.0, "spot {i}: direction is a zero vector");
        }
        Ok(())
    }

    /// Overrides the viewport size, keeping the other dimension.
    pub fn resize(&mut self, width: Option<u32>, height: Option<u32>) {
        self.viewport = Extent2D::new(
            width.unwrap_or(self.viewport.width),
            height.unwrap_or(self.viewport.height),
        );
    }

    /// Builds the camera, or fails if its basis is degenerate.
    pub fn camera(&self) -> Result<Camera> {
        let c = &self.camera;
        Camera::perspective(
            c.eye,
            c.direction,
            c.up,
            c.fov_degrees.to_radians(),
            c.near,
            c.far,
            self.viewport,
        )
        .context("camera direction is zero or parallel to its up vector")
    }

    pub fn surfaces(&self) -> Vec<Surface> {
        self.surfaces
            .iter()
            .map(|s| {
                let mesh = match s.shape {
                    Shape::Plane => Mesh::plane(s.half_extent),
                    Shape::Cube => Mesh::cube(s.half_extent),
                };
                let rotation = s
                    .facing
                    .map_or(Quaternion::IDENTITY, |f| Quaternion::from_rotation_arc(-Vec3::Z, f));
                let tag = s.tag.clone().map_or_else(MaterialTag::deferred, MaterialTag);
                Surface {
                    mesh: Arc::new(mesh),
                    transform: AffineTransform::from_trs(s.translation, rotation, s.scale),
                    material: SurfaceMaterial {
                        tag,
                        albedo: s.albedo,
                        specular: s.specular,
                    },
                }
            })
            .collect()
    }

    pub fn directional_light(&self) -> Option<LightDescriptor> {
        self.directional
            .as_ref()
            .map(|d| LightDescriptor::directional(d.direction, d.color, d.intensity))
    }

    /// Spot lights in file order, which is also the compositing order.
    ///
    /// Lights with `proxy` set share one unit cone of
    /// `settings.cone_segments` segments.
    pub fn spot_lights(&self) -> Vec<LightDescriptor> {
        let mut cones = ConeVolumeBuilder::new();
        self.spots
            .iter()
            .map(|s| {
                let light = LightDescriptor::spot(
                    s.position,
                    s.direction,
                    s.range,
                    s.half_angle_degrees.to_radians(),
                    s.color,
                    s.intensity,
                )
                .with_enabled(s.enabled);
                if s.proxy {
                    cones.attach_proxy(light, self.settings.cone_segments)
                } else {
                    light
                }
            })
            .collect()
    }
}
