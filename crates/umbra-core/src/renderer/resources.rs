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

//! Explicit ownership of render targets.
//!
//! Persistent targets (G-buffer attachments, the lit-color buffer, light
//! masks) live in named slots of a [`ResourceManager`]. A lane asks for a
//! slot with [`ResourceManager::ensure`], which reallocates the texture when
//! its `(size, format)` key changed and otherwise hands back the existing one.
//!
//! Frame-scoped textures come from the [`TransientPool`]. Acquiring returns a
//! [`PooledTexture`] token that is neither `Clone` nor `Copy`; releasing
//! consumes it, so a released texture cannot be used again by mistake.

use crate::math::Extent2D;
use crate::renderer::api::{TextureDescriptor, TextureId, TextureKey};
use crate::renderer::error::ResourceError;
use crate::renderer::gbuffer::GBufferAttachment;
use crate::renderer::traits::GraphicsDevice;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Identifies a persistent render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetSlot {
    /// One G-buffer attachment.
    GBuffer(GBufferAttachment),
    /// The base lighting output.
    LitColor,
    /// The light-volume mask of the light at this index.
    Mask(usize),
}

impl fmt::Display for TargetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSlot::GBuffer(attachment) => write!(f, "gbuffer/{attachment}"),
            TargetSlot::LitColor => f.write_str("lit_color"),
            TargetSlot::Mask(index) => write!(f, "mask/{index}"),
        }
    }
}

/// A versioned reference to a persistent render target.
///
/// The version changes every time the slot is reallocated, so two handles
/// with the same version are guaranteed to name the same allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle {
    /// The device texture.
    pub id: TextureId,
    /// The size and format the texture was allocated with.
    pub key: TextureKey,
    /// Allocation counter value at creation.
    pub version: u64,
}

/// Owns every persistent render target and the transient pool.
///
/// There is no ambient state: each lane receives the manager explicitly.
pub struct ResourceManager {
    device: Arc<dyn GraphicsDevice>,
    slots: HashMap<TargetSlot, TextureHandle>,
    next_version: u64,
    transients: TransientPool,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("slots", &self.slots.len())
            .field("next_version", &self.next_version)
            .field("transients", &self.transients)
            .finish()
    }
}

impl ResourceManager {
    /// Creates an empty manager allocating from `device`.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            transients: TransientPool::new(device.clone()),
            device,
            slots: HashMap::new(),
            next_version: 1,
        }
    }

    /// Returns the device textures are allocated from.
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// Returns a shared handle to the device.
    pub fn device_arc(&self) -> Arc<dyn GraphicsDevice> {
        self.device.clone()
    }

    /// Returns the texture in `slot`, allocating or reallocating it so that it
    /// matches `key`.
    ///
    /// On a key mismatch the old texture is destroyed before the new one is
    /// created, and the returned handle carries a new version.
    pub fn ensure(
        &mut self,
        slot: TargetSlot,
        key: TextureKey,
    ) -> Result<TextureHandle, ResourceError> {
        if let Some(existing) = self.slots.get(&slot) {
            if existing.key == key && self.device.texture_descriptor(existing.id).is_some() {
                return Ok(*existing);
            }
        }

        if let Some(stale) = self.slots.remove(&slot) {
            log::info!(
                "Reallocating {slot}: {} {:?} -> {} {:?}",
                stale.key.size,
                stale.key.format,
                key.size,
                key.format
            );
            self.destroy_quietly(stale.id);
        }

        let label = slot.to_string();
        let id = self
            .device
            .create_texture(&TextureDescriptor::from_key(label.as_str(), key))?;
        let handle = TextureHandle {
            id,
            key,
            version: self.next_version,
        };
        self.next_version += 1;
        self.slots.insert(slot, handle);
        log::debug!("Allocated {slot} as {id:?} (v{})", handle.version);
        Ok(handle)
    }

    /// Returns the current handle of `slot`, if allocated.
    pub fn get(&self, slot: TargetSlot) -> Option<TextureHandle> {
        self.slots.get(&slot).copied()
    }

    /// Destroys the texture in `slot`. Returns `true` if one was allocated.
    pub fn release(&mut self, slot: TargetSlot) -> bool {
        match self.slots.remove(&slot) {
            Some(handle) => {
                self.destroy_quietly(handle.id);
                true
            }
            None => false,
        }
    }

    /// Destroys every slot matching `predicate` and returns how many were released.
    pub fn release_matching(&mut self, predicate: impl Fn(&TargetSlot) -> bool) -> usize {
        let doomed: Vec<TargetSlot> = self.slots.keys().copied().filter(predicate).collect();
        for slot in &doomed {
            self.release(*slot);
        }
        doomed.len()
    }

    /// Destroys every persistent target and every idle transient texture.
    pub fn release_all(&mut self) {
        let count = self.release_matching(|_| true);
        let purged = self.transients.purge();
        log::info!("Released {count} persistent targets and {purged} pooled textures");
    }

    /// Iterates over every allocated slot.
    pub fn slots(&self) -> impl Iterator<Item = (TargetSlot, TextureHandle)> + '_ {
        self.slots.iter().map(|(s, h)| (*s, *h))
    }

    /// Returns the transient pool.
    pub fn transients(&mut self) -> &mut TransientPool {
        &mut self.transients
    }

    /// Returns the transient pool for inspection.
    pub fn transients_ref(&self) -> &TransientPool {
        &self.transients
    }

    fn destroy_quietly(&self, id: TextureId) {
        if let Err(e) = self.device.destroy_texture(id) {
            log::warn!("Failed to destroy texture {id:?}: {e}");
        }
    }
}

/// A frame-scoped texture checked out of a [`TransientPool`].
///
/// The token must be handed back with [`TransientPool::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct PooledTexture {
    id: TextureId,
    key: TextureKey,
}

impl PooledTexture {
    /// Returns the device texture.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Returns the size and format of the texture.
    pub fn key(&self) -> TextureKey {
        self.key
    }
}

/// Recycles frame-scoped textures by `(size, format)` key.
pub struct TransientPool {
    device: Arc<dyn GraphicsDevice>,
    free: HashMap<TextureKey, Vec<TextureId>>,
    checked_out: HashSet<TextureId>,
    peak_checked_out: usize,
}

impl fmt::Debug for TransientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientPool")
            .field("idle", &self.idle_count())
            .field("live", &self.checked_out.len())
            .field("peak_live", &self.peak_checked_out)
            .finish()
    }
}

impl TransientPool {
    /// Creates an empty pool.
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            free: HashMap::new(),
            checked_out: HashSet::new(),
            peak_checked_out: 0,
        }
    }

    /// Checks out a texture matching `key`, reusing an idle one when possible.
    ///
    /// The contents of a reused texture are whatever it last held.
    pub fn acquire(&mut self, key: TextureKey) -> Result<PooledTexture, ResourceError> {
        let id = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(id) => id,
            None => {
                let id = self
                    .device
                    .create_texture(&TextureDescriptor::from_key("transient", key))?;
                log::trace!("Transient pool grew: {id:?} {} {:?}", key.size, key.format);
                id
            }
        };
        self.checked_out.insert(id);
        self.peak_checked_out = self.peak_checked_out.max(self.checked_out.len());
        Ok(PooledTexture { id, key })
    }

    /// Returns a texture to the pool.
    pub fn release(&mut self, texture: PooledTexture) -> Result<(), ResourceError> {
        if !self.checked_out.remove(&texture.id) {
            return Err(ResourceError::ForeignPooledTexture { id: texture.id });
        }
        self.free.entry(texture.key).or_default().push(texture.id);
        Ok(())
    }

    /// Returns the number of textures currently checked out.
    pub fn live_count(&self) -> usize {
        self.checked_out.len()
    }

    /// Returns the highest number of simultaneously checked-out textures
    /// since creation or the last [`Self::reset_peak`].
    pub fn peak_live_count(&self) -> usize {
        self.peak_checked_out
    }

    /// Resets the peak counter to the current live count.
    pub fn reset_peak(&mut self) {
        self.peak_checked_out = self.checked_out.len();
    }

    /// Returns the number of idle textures kept for reuse.
    pub fn idle_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Destroys idle textures whose size differs from `size`.
    pub fn retain_size(&mut self, size: Extent2D) -> usize {
        let stale: Vec<TextureKey> = self.free.keys().filter(|k| k.size != size).copied().collect();
        let mut destroyed = 0;
        for key in stale {
            for id in self.free.remove(&key).unwrap_or_default() {
                self.destroy_quietly(id);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Destroys every idle texture. Checked-out textures are untouched.
    pub fn purge(&mut self) -> usize {
        let mut destroyed = 0;
        for (_, ids) in self.free.drain() {
            for id in ids {
                if let Err(e) = self.device.destroy_texture(id) {
                    log::warn!("Failed to destroy pooled texture {id:?}: {e}");
                }
                destroyed += 1;
            }
        }
        destroyed
    }

    fn destroy_quietly(&self, id: TextureId) {
        if let Err(e) = self.device.destroy_texture(id) {
            log::warn!("Failed to destroy pooled texture {id:?}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec4;
    use crate::renderer::api::{
        FullscreenDraw, MeshDraw, TextureFormat, TextureReadback,
    };
    use crate::renderer::error::RenderError;
    use std::sync::Mutex;

    /// A device that only tracks texture descriptors.
    #[derive(Debug, Default)]
    struct BookkeepingDevice {
        textures: Mutex<HashMap<TextureId, TextureDescriptor<'static>>>,
        next_id: Mutex<usize>,
    }

    impl GraphicsDevice for BookkeepingDevice {
        fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let id = TextureId(*next);
            self.textures
                .lock()
                .unwrap()
                .insert(id, descriptor.clone().into_owned());
            Ok(id)
        }

        fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
            self.textures
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or(ResourceError::NotFound { id })
        }

        fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor<'static>> {
            self.textures.lock().unwrap().get(&id).cloned()
        }

        fn live_texture_count(&self) -> usize {
            self.textures.lock().unwrap().len()
        }

        fn clear_texture(&self, _id: TextureId, _value: Vec4) -> Result<(), ResourceError> {
            Ok(())
        }

        fn copy_texture(&self, _s: TextureId, _d: TextureId) -> Result<(), ResourceError> {
            Ok(())
        }

        fn read_texture(&self, id: TextureId) -> Result<TextureReadback, ResourceError> {
            Err(ResourceError::NotFound { id })
        }

        fn draw_mesh(&self, _draw: &MeshDraw<'_>) -> Result<(), RenderError> {
            Ok(())
        }

        fn draw_fullscreen(&self, _draw: &FullscreenDraw<'_>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn key(w: u32, h: u32, format: TextureFormat) -> TextureKey {
        TextureKey::new(Extent2D::new(w, h), format)
    }

    #[test]
    fn ensure_reuses_matching_allocation() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut manager = ResourceManager::new(device.clone());
        let k = key(64, 64, TextureFormat::Rgba16Float);

        let a = manager.ensure(TargetSlot::LitColor, k).unwrap();
        let b = manager.ensure(TargetSlot::LitColor, k).unwrap();
        assert_eq!(a, b);
        assert_eq!(device.live_texture_count(), 1);
    }

    #[test]
    fn ensure_reallocates_on_resize_and_bumps_version() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut manager = ResourceManager::new(device.clone());

        let a = manager
            .ensure(TargetSlot::Mask(0), key(64, 64, TextureFormat::R8Unorm))
            .unwrap();
        let b = manager
            .ensure(TargetSlot::Mask(0), key(32, 48, TextureFormat::R8Unorm))
            .unwrap();

        assert_ne!(a.id, b.id);
        assert!(b.version > a.version);
        assert!(device.texture_descriptor(a.id).is_none());
        let desc = device.texture_descriptor(b.id).unwrap();
        assert_eq!(desc.size, Extent2D::new(32, 48));
        assert_eq!(desc.format, TextureFormat::R8Unorm);
        assert_eq!(desc.label.as_deref(), Some("mask/0"));
    }

    #[test]
    fn ensure_recovers_from_externally_destroyed_texture() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut manager = ResourceManager::new(device.clone());
        let k = key(8, 8, TextureFormat::Rgba8Unorm);
        let a = manager.ensure(TargetSlot::LitColor, k).unwrap();
        device.destroy_texture(a.id).unwrap();
        let b = manager.ensure(TargetSlot::LitColor, k).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn release_matching_only_touches_selected_slots() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut manager = ResourceManager::new(device.clone());
        let k = key(4, 4, TextureFormat::R8Unorm);
        for i in 0..3 {
            manager.ensure(TargetSlot::Mask(i), k).unwrap();
        }
        manager.ensure(TargetSlot::LitColor, k).unwrap();

        let released = manager.release_matching(|s| matches!(s, TargetSlot::Mask(_)));
        assert_eq!(released, 3);
        assert!(manager.get(TargetSlot::LitColor).is_some());
        assert_eq!(device.live_texture_count(), 1);

        manager.release_all();
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn pool_recycles_by_key_and_tracks_peak() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut pool = TransientPool::new(device.clone());
        let k = key(16, 16, TextureFormat::Rgba16Float);

        let a = pool.acquire(k).unwrap();
        let b = pool.acquire(k).unwrap();
        assert_eq!(pool.live_count(), 2);
        let a_id = a.id();
        pool.release(a).unwrap();
        let c = pool.acquire(k).unwrap();
        assert_eq!(c.id(), a_id);
        pool.release(b).unwrap();
        pool.release(c).unwrap();

        assert_eq!(pool.peak_live_count(), 2);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(device.live_texture_count(), 2);

        assert_eq!(pool.purge(), 2);
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn pool_rejects_foreign_tokens() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut pool = TransientPool::new(device.clone());
        let mut other = TransientPool::new(device);
        let token = other.acquire(key(2, 2, TextureFormat::R8Unorm)).unwrap();
        assert!(matches!(
            pool.release(token),
            Err(ResourceError::ForeignPooledTexture { .. })
        ));
    }

    #[test]
    fn retain_size_drops_other_extents() {
        let device = Arc::new(BookkeepingDevice::default());
        let mut pool = TransientPool::new(device.clone());
        let small = pool.acquire(key(8, 8, TextureFormat::Rgba16Float)).unwrap();
        let large = pool.acquire(key(16, 16, TextureFormat::Rgba16Float)).unwrap();
        pool.release(small).unwrap();
        pool.release(large).unwrap();
        assert_eq!(pool.retain_size(Extent2D::new(16, 16)), 1);
        assert_eq!(pool.idle_count(), 1);
    }
}
