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

//! Command-line renderer: loads a TOML scene, renders it through the
//! deferred compositor on the software device and writes PNGs.

mod output;
mod scene;

use anyhow::{bail, Context, Result};
use clap::Parser;
use output::Encoding;
use scene::Scene;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use umbra_agents::render_agent::{DeferredRenderAgent, FrameInput, FrameReport};
use umbra_core::renderer::api::{TextureDescriptor, TextureKey};
use umbra_core::renderer::{GBufferAttachment, GraphicsDevice};
use umbra_infra::SoftwareDevice;

#[derive(Debug, Parser)]
#[command(version, about = "Renders a deferred spotlight scene to PNG")]
struct Cli {
    /// Scene description (TOML).
    #[arg(long)]
    scene: PathBuf,

    /// Where the final frame is written.
    #[arg(long, default_value = "frame.png")]
    output: PathBuf,

    /// Number of frames to render; the last one is written.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    frames: u32,

    /// Overrides the scene's viewport width.
    #[arg(long)]
    width: Option<u32>,

    /// Overrides the scene's viewport height.
    #[arg(long)]
    height: Option<u32>,

    /// Writes this light's volume mask instead of the composited frame.
    #[arg(long, value_name = "INDEX")]
    debug_mask: Option<usize>,

    /// Also writes every G-buffer attachment and mask into this directory.
    #[arg(long, value_name = "DIR")]
    dump_gbuffer: Option<PathBuf>,
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
    run(&Cli::parse())
}

fn run(cli: &Cli) -> Result<()> {
    let mut scene = Scene::load(&cli.scene)?;
    scene.resize(cli.width, cli.height);
    if cli.debug_mask.is_some() {
        scene.settings.debug_mask = cli.debug_mask;
    }
    if scene.viewport.is_empty() {
        bail!("viewport {} has no pixels", scene.viewport);
    }

    let camera = scene.camera()?;
    let surfaces = scene.surfaces();
    let directional = scene.directional_light();
    let lights = scene.spot_lights();

    let device = Arc::new(SoftwareDevice::new());
    let mut agent = DeferredRenderAgent::new(device.clone(), scene.settings);

    let key = TextureKey::new(scene.viewport, scene.settings.lit_format);
    let source = device
        .create_texture(&TextureDescriptor::from_key("frame_source", key))
        .context("Failed to create the source frame")?;
    let output = device
        .create_texture(&TextureDescriptor::from_key("frame_output", key))
        .context("Failed to create the output frame")?;
    device.clear_texture(source, scene.background.to_vec4())?;

    let input = FrameInput {
        camera: Some(&camera),
        surfaces: &surfaces,
        directional_light: directional.as_ref(),
        lights: &lights,
        source,
        output,
    };
    let mut last = FrameReport::default();
    for _ in 0..cli.frames {
        last = agent
            .render_frame(&input)
            .with_context(|| format!("Frame {} failed", agent.frame_count()))?;
    }

    let stats = device.stats();
    log::info!(
        "Rendered {} frame(s) at {} in {:?} (last): {} lights blended, {} draws, {} fragments",
        cli.frames,
        scene.viewport,
        agent.last_frame_time(),
        last.composite.map_or(0, |c| c.lights_blended),
        stats.draw_calls,
        stats.fragments_shaded,
    );

    output::write_png(&device.read_texture(output)?, Encoding::Color, &cli.output)?;
    if let Some(dir) = &cli.dump_gbuffer {
        dump_targets(&*device, &last, dir)?;
    }

    agent.disable();
    Ok(())
}

/// Writes the frame's G-buffer attachments and masks as PNGs.
fn dump_targets(device: &dyn GraphicsDevice, report: &FrameReport, dir: &Path) -> Result<()> {
    let Some(gbuffer) = report.gbuffer else {
        log::warn!("No G-buffer was rendered, nothing to dump");
        return Ok(());
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create '{}'", dir.display()))?;

    for attachment in GBufferAttachment::ALL {
        let encoding = match attachment {
            GBufferAttachment::Albedo | GBufferAttachment::Specular => Encoding::Color,
            GBufferAttachment::Normal => Encoding::Signed,
            GBufferAttachment::ViewPosition | GBufferAttachment::ViewZ | GBufferAttachment::Depth => {
                Encoding::Normalized
            }
        };
        let readback = device.read_texture(gbuffer.texture(attachment))?;
        let path = dir.join(format!("gbuffer_{}.png", attachment.name()));
        output::write_png(&readback, encoding, &path)?;
    }

    if let Some(masks) = &report.masks {
        for index in 0..masks.len() {
            if let Some(mask) = masks.get(index) {
                let readback = device.read_texture(mask.id)?;
                let path = dir.join(format!("mask_{index}.png"));
                output::write_png(&readback, Encoding::Normalized, &path)?;
            }
        }
    }
    Ok(())
}
