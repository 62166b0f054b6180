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

//! Hot-path passes of the deferred compositor.
//!
//! Every pass is a lane that takes the frame's image in and writes it out,
//! either transformed or, when an input is missing, copied unchanged through
//! [`run_or_passthrough`].

#![warn(missing_docs)]

pub mod passthrough;
pub mod render_lane;

pub use passthrough::{run_or_passthrough, MissingInput, PassError, PassOutcome};
