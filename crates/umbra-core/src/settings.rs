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

//! Tunables of the compositor.

use crate::renderer::api::TextureFormat;
use serde::{Deserialize, Serialize};

/// Quality and diagnostic settings read by the render agent.
///
/// Every field has a default, so partial configuration files are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Ring segments of the cone proxy volume (clamped to at least 3).
    pub cone_segments: u32,
    /// Tolerance of the point-in-volume test at the volume boundary.
    pub intersection_epsilon: f32,
    /// Format of the lit-color buffer and of the compositing accumulators.
    pub lit_format: TextureFormat,
    /// Specular exponent reached at full glossiness.
    pub shininess_scale: f32,
    /// When set, the frame shows this mask instead of the composited image.
    pub debug_mask: Option<usize>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            cone_segments: 24,
            intersection_epsilon: 0.001,
            lit_format: TextureFormat::Rgba16Float,
            shininess_scale: 128.0,
            debug_mask: None,
        }
    }
}
