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

//! Acts as the **[A]gent** for the deferred compositor.
//!
//! The agent runs the lanes in strict order every frame (G-buffer, base
//! lighting, volume masks, spot compositing), detects viewport changes, routes
//! the debug mask display and tears every target down when disabled. The
//! per-pixel work itself lives in `umbra_lanes::render_lane`.

mod agent;

pub use agent::*;
