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

//! Defines the DeferredRenderAgent, the orchestrator of the compositor lanes.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::{Duration, Instant};
use umbra_core::lane::Lane;
use umbra_core::math::Extent2D;
use umbra_core::renderer::api::{TextureId, TextureKey};
use umbra_core::renderer::{
    Camera, GBufferSnapshot, GraphicsDevice, LightDescriptor, RenderError, ResourceManager,
    Surface, TextureHandle,
};
use umbra_core::RenderSettings;
use umbra_lanes::render_lane::{
    BaseLightingLane, CompositeStats, GBufferLane, LightVolumeMaskLane, MaskSet,
    SpotCompositeLane,
};

/// Everything the agent needs to render one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// The viewing camera. Without one the frame is passed through.
    pub camera: Option<&'a Camera>,
    /// Scene surfaces; only deferred ones reach the G-buffer.
    pub surfaces: &'a [Surface],
    /// The directional light resolved by the base lighting pass.
    pub directional_light: Option<&'a LightDescriptor>,
    /// Local lights, composited in this order. A spot light without a
    /// proxy volume gets no mask and is skipped.
    pub lights: &'a [LightDescriptor],
    /// The image entering the compositor.
    pub source: TextureId,
    /// Where the final image is written.
    pub output: TextureId,
}

/// What happened during one call to [`DeferredRenderAgent::render_frame`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// One-based index of the frame.
    pub frame_index: u64,
    /// The viewport the frame was rendered at.
    pub viewport: Extent2D,
    /// Whether the viewport changed since the previous frame.
    pub resized: bool,
    /// The G-buffer, if one was rendered.
    pub gbuffer: Option<GBufferSnapshot>,
    /// The lit-color buffer, if the base lighting pass ran.
    pub lit: Option<TextureHandle>,
    /// The light volume masks, if the mask pass ran.
    pub masks: Option<MaskSet>,
    /// The compositor statistics, if the compositor ran.
    pub composite: Option<CompositeStats>,
    /// Whether the output shows a debug mask instead of the composited frame.
    pub debug_mask_shown: bool,
}

/// The agent responsible for running the deferred compositor each frame.
///
/// It owns the [`ResourceManager`] shared by the lanes and calls them in a
/// fixed order: G-buffer, base lighting, volume masks, then the compositor.
/// Two pooled frame textures carry the image between passes.
pub struct DeferredRenderAgent {
    // Persistent targets and the transient pool.
    resources: ResourceManager,
    settings: RenderSettings,
    gbuffer_lane: GBufferLane,
    base_lane: BaseLightingLane,
    mask_lane: LightVolumeMaskLane,
    composite_lane: SpotCompositeLane,
    // Viewport of the previous frame, to detect resizes.
    viewport: Option<Extent2D>,
    enabled: bool,
    // --- Frame statistics ---
    last_frame_time: Duration,
    frame_count: u64,
}

impl DeferredRenderAgent {
    /// Creates an agent rendering on `device` with `settings`.
    pub fn new(device: Arc<dyn GraphicsDevice>, settings: RenderSettings) -> Self {
        let agent = Self {
            resources: ResourceManager::new(device),
            settings,
            gbuffer_lane: GBufferLane::new(),
            base_lane: BaseLightingLane::new(&settings),
            mask_lane: LightVolumeMaskLane::new(&settings),
            composite_lane: SpotCompositeLane::new(&settings),
            viewport: None,
            enabled: true,
            last_frame_time: Duration::ZERO,
            frame_count: 0,
        };
        let names: Vec<&str> = agent.lanes().iter().map(|l| l.strategy_name()).collect();
        log::info!("DeferredRenderAgent: lanes [{}]", names.join(" -> "));
        agent
    }

    /// Returns the lanes in execution order.
    pub fn lanes(&self) -> [&dyn Lane; 4] {
        let mut lanes: [&dyn Lane; 4] = [
            &self.gbuffer_lane,
            &self.base_lane,
            &self.mask_lane,
            &self.composite_lane,
        ];
        lanes.sort_by_key(|lane| lane.execution_order());
        lanes
    }

    /// Returns the settings the agent was created with.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Returns the resource manager holding every target.
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Shows mask `index` (clamped to the pool) instead of the composited
    /// frame, or turns the debug display off with `None`.
    pub fn set_debug_mask(&mut self, index: Option<usize>) {
        self.settings.debug_mask = index;
        self.mask_lane.set_debug_mask(index);
    }

    /// Returns the number of mask textures currently pooled.
    pub fn mask_pool_len(&self) -> usize {
        self.mask_lane.pool_len()
    }

    /// Returns whether frames are being rendered.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns rendering back on. Targets are reallocated by the next frame.
    pub fn enable(&mut self) {
        if !self.enabled {
            log::info!("DeferredRenderAgent: enabled");
            self.enabled = true;
        }
    }

    /// Turns rendering off and releases every target the lanes own, the
    /// mask pool and the pooled transients.
    ///
    /// While disabled, frames are copied from input to output unchanged.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;

        let mut lanes: [&mut dyn Lane; 4] = [
            &mut self.gbuffer_lane,
            &mut self.base_lane,
            &mut self.mask_lane,
            &mut self.composite_lane,
        ];
        // Consumers first.
        lanes.sort_by_key(|lane| Reverse(lane.execution_order()));
        for lane in lanes {
            lane.on_shutdown(&mut self.resources);
        }
        self.resources.release_all();
        self.viewport = None;
        log::info!("DeferredRenderAgent: disabled, all targets released");
    }

    /// Renders one frame from `input.source` into `input.output`.
    ///
    /// Missing inputs never fail the frame: each pass degrades to a copy.
    /// An error means a copy itself failed.
    pub fn render_frame(&mut self, input: &FrameInput<'_>) -> Result<FrameReport, RenderError> {
        let started = Instant::now();
        self.frame_count += 1;
        let mut report = FrameReport {
            frame_index: self.frame_count,
            ..Default::default()
        };

        if !self.enabled {
            self.resources
                .device()
                .copy_texture(input.source, input.output)?;
            return Ok(report);
        }

        if let Some(camera) = input.camera {
            report.viewport = camera.viewport;
            report.resized = self.track_viewport(camera.viewport);
        }

        let gbuffer = self
            .gbuffer_lane
            .render(&mut self.resources, input.camera, input.surfaces);
        report.gbuffer = gbuffer;

        let (Some(camera), Some(gbuffer)) = (input.camera, gbuffer) else {
            log::debug!("DeferredRenderAgent: no G-buffer, frame passed through");
            self.resources
                .device()
                .copy_texture(input.source, input.output)?;
            self.last_frame_time = started.elapsed();
            return Ok(report);
        };

        let key = TextureKey::new(gbuffer.extent, self.settings.lit_format);
        let lit_frame = self.resources.transients().acquire(key)?;
        let mask_frame = match self.resources.transients().acquire(key) {
            Ok(texture) => texture,
            Err(e) => {
                self.resources.transients().release(lit_frame)?;
                return Err(e.into());
            }
        };

        let passes = self.run_passes(
            input,
            camera,
            &gbuffer,
            [lit_frame.id(), mask_frame.id()],
            &mut report,
        );
        let released_lit = self.resources.transients().release(lit_frame);
        let released_mask = self.resources.transients().release(mask_frame);
        passes?;
        released_lit?;
        released_mask?;

        self.last_frame_time = started.elapsed();
        log::debug!(
            "DeferredRenderAgent: frame {} at {} in {:?} ({} lights, {} blended)",
            report.frame_index,
            report.viewport,
            self.last_frame_time,
            input.lights.len(),
            report.composite.map_or(0, |s| s.lights_blended),
        );
        Ok(report)
    }

    fn run_passes(
        &mut self,
        input: &FrameInput<'_>,
        camera: &Camera,
        gbuffer: &GBufferSnapshot,
        [lit_frame, mask_frame]: [TextureId; 2],
        report: &mut FrameReport,
    ) -> Result<(), RenderError> {
        // Only this frame's lit buffer may reach the compositor.
        report.lit = self
            .base_lane
            .resolve(
                &mut self.resources,
                Some(gbuffer),
                input.directional_light,
                &camera.view,
                input.source,
                lit_frame,
            )?
            .executed();

        let masks = self
            .mask_lane
            .generate_masks(
                &mut self.resources,
                Some(gbuffer),
                input.lights,
                camera,
                lit_frame,
                mask_frame,
            )?
            .executed();

        if self.mask_lane.debug_mask().is_some() {
            report.debug_mask_shown = self.mask_lane.pool_len() > 0;
            self.resources
                .device()
                .copy_texture(mask_frame, input.output)?;
        } else {
            report.composite = self
                .composite_lane
                .composite(
                    &mut self.resources,
                    report.lit,
                    Some(gbuffer),
                    input.lights,
                    masks.as_ref(),
                    camera,
                    mask_frame,
                    input.output,
                )?
                .executed();
        }
        report.masks = masks;
        Ok(())
    }

    /// Records the frame's viewport and returns whether it changed.
    fn track_viewport(&mut self, viewport: Extent2D) -> bool {
        match self.viewport.replace(viewport) {
            Some(previous) if previous != viewport => {
                let dropped = self.resources.transients().retain_size(viewport);
                log::info!(
                    "DeferredRenderAgent: viewport {previous} -> {viewport}, {dropped} pooled textures dropped"
                );
                true
            }
            _ => false,
        }
    }

    /// Returns the duration of the last frame.
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }

    /// Returns the total number of frames rendered.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
