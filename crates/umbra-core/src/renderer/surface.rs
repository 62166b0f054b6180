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

//! Scene surfaces handed to the geometry pass.

use crate::math::{AffineTransform, LinearRgba};
use crate::renderer::mesh::Mesh;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Names the shading path a material belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialTag(pub String);

impl MaterialTag {
    /// The tag carried by surfaces written into the G-buffer.
    pub const DEFERRED: &'static str = "Umbra/GBuffer";

    /// Returns the deferred-surface tag.
    pub fn deferred() -> Self {
        Self(Self::DEFERRED.to_owned())
    }

    /// Returns `true` if this is the deferred-surface tag.
    pub fn is_deferred(&self) -> bool {
        self.0 == Self::DEFERRED
    }
}

/// Surface attributes written into the G-buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    /// Which shading path consumes the surface.
    pub tag: MaterialTag,
    /// Diffuse reflectance.
    pub albedo: LinearRgba,
    /// Specular reflectance in RGB, glossiness in alpha.
    pub specular: LinearRgba,
}

impl SurfaceMaterial {
    /// Creates a deferred material.
    pub fn deferred(albedo: LinearRgba, specular: LinearRgba) -> Self {
        Self {
            tag: MaterialTag::deferred(),
            albedo,
            specular,
        }
    }
}

/// One drawable object of the scene.
#[derive(Debug, Clone)]
pub struct Surface {
    /// Shared geometry.
    pub mesh: Arc<Mesh>,
    /// Local-to-world transform.
    pub transform: AffineTransform,
    /// Material attributes.
    pub material: SurfaceMaterial,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_deferred_tag_is_deferred() {
        assert!(MaterialTag::deferred().is_deferred());
        assert!(!MaterialTag("Umbra/Unlit".into()).is_deferred());
        let material = SurfaceMaterial::deferred(LinearRgba::WHITE, LinearRgba::BLACK);
        assert!(material.tag.is_deferred());
    }
}
