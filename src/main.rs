//! Command-line driver: blur a PNG through the filter.

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use composite_blur::gpu::backend::{
    GraphicsBackend, GraphicsScope, TextureFormat, TextureId,
};
use composite_blur::gpu::cpu::{CpuBackend, CpuImage};
use composite_blur::gpu::shader_loader::ShaderLoader;
use composite_blur::gpu::wgpu_backend::WgpuBackend;
use composite_blur::{
    BlurError, CompositeBlurFilter, FilterOptions, FrameInputs, FrameOutput,
    Settings,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Software reference renderer
    Cpu,
    /// Headless wgpu device
    Wgpu,
}

#[derive(Parser)]
#[command(name = "composite-blur")]
#[command(about = "Blur a PNG frame through the composite blur filter")]
#[command(version)]
struct Cli {
    /// Input PNG
    input: PathBuf,

    /// Output PNG
    #[arg(short, long, default_value = "blurred.png")]
    output: PathBuf,

    /// Host settings file (.toml or .json, flat keys)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Typed options preset (.toml); applied after --settings
    #[arg(short, long)]
    preset: Option<PathBuf>,

    /// Background PNG composited under the input
    #[arg(short, long)]
    background: Option<PathBuf>,

    /// PNG used as the source mask
    #[arg(short, long)]
    mask_source: Option<PathBuf>,

    /// Number of frames to render (temporal blur accumulates across them)
    #[arg(short, long, default_value = "1")]
    frames: u32,

    /// Frame rate driving the animation clock
    #[arg(long, default_value = "60")]
    fps: f32,

    /// Device to render on
    #[arg(long, value_enum, default_value = "cpu")]
    backend: Backend,

    /// Load shaders from this directory instead of the embedded sources
    #[arg(long)]
    shader_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::with_defaults(),
    };
    let mut filter = CompositeBlurFilter::create(&settings);
    if let Some(path) = &cli.preset {
        filter.set_options(FilterOptions::load(path)?);
    }
    if let Some(dir) = &cli.shader_dir {
        filter = filter.with_shader_loader(ShaderLoader::from_dir(dir));
    }

    let image = match cli.backend {
        Backend::Cpu => {
            let mut backend = CpuBackend::new();
            let output = run(&cli, &mut filter, &mut backend)?;
            let image = backend
                .image(output)
                .map(CpuImage::to_rgba8)
                .ok_or(BlurError::UnknownTexture(output))?;
            filter.destroy(&mut backend);
            image
        }
        Backend::Wgpu => {
            let mut backend = WgpuBackend::new()?;
            let output = run(&cli, &mut filter, &mut backend)?;
            let (width, height) = (filter.width(), filter.height());
            let texels = backend.read_texture(output)?;
            let image = CpuImage::from_texels(
                width,
                height,
                TextureFormat::Rgba16Float,
                &texels,
            )
            .as_ref()
            .map(CpuImage::to_rgba8)
            .ok_or_else(|| BlurError::Readback("size mismatch".to_owned()))?;
            filter.destroy(&mut backend);
            image
        }
    };
    image.save(&cli.output)?;
    log::info!("wrote {}", cli.output.display());
    Ok(())
}

/// Upload the inputs and render `cli.frames` frames; returns the last output.
fn run(
    cli: &Cli,
    filter: &mut CompositeBlurFilter,
    backend: &mut dyn GraphicsBackend,
) -> Result<TextureId, Box<dyn Error>> {
    let source = image::open(&cli.input)?.to_rgba8();
    let (width, height) = source.dimensions();
    let inputs = {
        let mut gfx = GraphicsScope::enter(backend)?;
        FrameInputs {
            source: upload(&mut gfx, &source)?,
            background: load_optional(&mut gfx, cli.background.as_deref())?,
            mask_source: load_optional(&mut gfx, cli.mask_source.as_deref())?,
        }
    };
    log::info!(
        "{}: {width}x{height}, {:?}",
        cli.input.display(),
        filter.options().blur.algorithm
    );

    let step = 1.0 / cli.fps.max(1.0);
    let mut last = FrameOutput::Skip;
    for _ in 0..cli.frames.max(1) {
        filter.video_tick(step, width, height);
        last = filter.video_render(backend, &inputs, None);
    }
    last.texture()
        .ok_or_else(|| "the last frame was skipped".into())
}

fn upload(
    gfx: &mut GraphicsScope<'_>,
    image: &image::RgbaImage,
) -> Result<TextureId, BlurError> {
    let texels = CpuImage::from_rgba8(image).to_texels();
    gfx.create_texture(
        image.width(),
        image.height(),
        TextureFormat::Rgba8Unorm,
        &texels,
    )
}

fn load_optional(
    gfx: &mut GraphicsScope<'_>,
    path: Option<&Path>,
) -> Result<Option<TextureId>, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let image = image::open(path)?.to_rgba8();
    Ok(Some(upload(gfx, &image)?))
}
