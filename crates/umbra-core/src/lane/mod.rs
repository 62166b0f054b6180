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

//! # Lane Abstraction
//!
//! A **Lane** is one pass of the compositor: a self-contained processing step
//! driven by the render agent. Each lane owns the persistent targets it
//! produces (through the [`ResourceManager`]) and exposes a domain-specific
//! entry point; this trait only carries what the agent needs to order,
//! identify and tear lanes down.

use crate::renderer::ResourceManager;
use std::fmt;

/// Classification of compositor lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LaneKind {
    /// Writes surface attributes into the G-buffer.
    GeometryBuffer,
    /// Resolves the base directional light.
    Lighting,
    /// Rasterizes per-light volume masks.
    VolumeMask,
    /// Accumulates masked light contributions.
    Composite,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::GeometryBuffer => write!(f, "GeometryBuffer"),
            LaneKind::Lighting => write!(f, "Lighting"),
            LaneKind::VolumeMask => write!(f, "VolumeMask"),
            LaneKind::Composite => write!(f, "Composite"),
        }
    }
}

/// The base trait shared by every compositor lane.
pub trait Lane: Send + Sync {
    /// A short, stable name used in logs.
    fn strategy_name(&self) -> &'static str;

    /// The lane classification.
    fn lane_kind(&self) -> LaneKind;

    /// Position of the lane in the frame; lower runs earlier.
    ///
    /// Lanes with no data dependency on each other may share ordering slack,
    /// but a consumer always has a strictly greater value than its producers.
    fn execution_order(&self) -> u32;

    /// Releases every persistent target the lane owns.
    fn on_shutdown(&mut self, resources: &mut ResourceManager);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_kind_display() {
        assert_eq!(LaneKind::GeometryBuffer.to_string(), "GeometryBuffer");
        assert_eq!(LaneKind::Composite.to_string(), "Composite");
    }
}
