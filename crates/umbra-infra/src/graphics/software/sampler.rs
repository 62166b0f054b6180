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

use super::storage::TextureStorage;
use umbra_core::math::Vec4;
use umbra_core::renderer::api::TextureSampler;

/// The textures bound to one draw, resolved to their storage.
pub(crate) struct BoundTextures<'a> {
    entries: Vec<(&'static str, &'a TextureStorage)>,
}

impl<'a> BoundTextures<'a> {
    pub fn new(entries: Vec<(&'static str, &'a TextureStorage)>) -> Self {
        Self { entries }
    }

    fn find(&self, slot: &str) -> Option<&'a TextureStorage> {
        self.entries
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, storage)| *storage)
    }
}

impl TextureSampler for BoundTextures<'_> {
    fn load(&self, slot: &str, pixel: [u32; 2]) -> Vec4 {
        self.find(slot)
            .map(|t| t.load(pixel[0], pixel[1]))
            .unwrap_or(Vec4::ZERO)
    }

    fn is_bound(&self, slot: &str) -> bool {
        self.find(slot).is_some()
    }
}
