use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "visor", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the full-resolution composite to a PNG.
    Export(ExportArgs),
    /// Render one preview-sized frame to a PNG.
    Preview(PreviewArgs),
}

#[derive(Parser, Debug)]
struct SceneArgs {
    /// User photo: a file path or a base64 `data:` URI.
    #[arg(long)]
    user: String,

    /// Helmet overlay graphic.
    #[arg(long)]
    helmet: String,

    /// Background image; enables the circular visor clip.
    #[arg(long)]
    background: Option<String>,

    /// Scene snapshot JSON. When given, the transform flags below are ignored.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Helmet center, as fractions of the surface.
    #[arg(long, default_value_t = 0.5)]
    helmet_x: f64,
    #[arg(long, default_value_t = 0.5)]
    helmet_y: f64,
    #[arg(long, default_value_t = visor::transform::HELMET_SCALE_DEFAULT)]
    helmet_scale: f64,

    /// User photo center, as fractions of the surface (may exceed [0,1]).
    #[arg(long, default_value_t = 0.5)]
    image_x: f64,
    #[arg(long, default_value_t = 0.5)]
    image_y: f64,
    #[arg(long, default_value_t = 1.0)]
    image_scale: f64,
    #[arg(long, default_value_t = 0.0)]
    rotation: f64,
    #[arg(long)]
    flip: bool,
    #[arg(long, default_value_t = 0.0)]
    perspective_x: f64,
    #[arg(long, default_value_t = 0.0)]
    perspective_y: f64,

    /// Use the dark-theme fallback fill when no background is set.
    #[arg(long)]
    dark: bool,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    scene: SceneArgs,

    /// Preview surface side length in pixels.
    #[arg(long, default_value_t = 512)]
    size: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => {
            let (snapshot, bitmaps) = load_inputs(&args.scene)?;
            let mut compositor = visor::Compositor::new();
            let frame = visor::render_scene(
                &mut compositor,
                &snapshot,
                visor::RenderMode::Export,
                &bitmaps,
            )?;
            write_png(&args.out, &frame)
        }
        Command::Preview(args) => {
            let (snapshot, bitmaps) = load_inputs(&args.scene)?;
            let mut compositor = visor::Compositor::new();
            let frame = visor::render_scene(
                &mut compositor,
                &snapshot,
                visor::RenderMode::Preview {
                    container_px: args.size,
                },
                &bitmaps,
            )?;
            write_png(&args.out, &frame)
        }
    }
}

fn load_inputs(args: &SceneArgs) -> anyhow::Result<(visor::SceneSnapshot, visor::SceneBitmaps)> {
    let snapshot = match &args.scene {
        Some(path) => read_scene_json(path)?,
        None => visor::SceneSnapshot {
            helmet: visor::HelmetState {
                position: visor::Frac2::new(args.helmet_x, args.helmet_y),
                scale: args.helmet_scale,
            },
            user_image: visor::UserImageState {
                position: visor::Frac2::new(args.image_x, args.image_y),
                scale: args.image_scale,
                rotation_deg: args.rotation,
                flipped: args.flip,
                perspective_x: args.perspective_x,
                perspective_y: args.perspective_y,
            },
            use_background: args.background.is_some(),
            dark_mode: args.dark,
        },
    };

    let sources = visor::SceneSources {
        user: args.user.clone(),
        helmet: args.helmet.clone(),
        background: args.background.clone(),
    };
    let bitmaps = visor::SceneBitmaps::load(&sources)?;
    Ok((snapshot, bitmaps))
}

fn read_scene_json(path: &Path) -> anyhow::Result<visor::SceneSnapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("open scene '{}'", path.display()))?;
    let snapshot = visor::SceneSnapshot::from_json(&json)
        .with_context(|| format!("parse scene '{}'", path.display()))?;
    Ok(snapshot)
}

fn write_png(out: &Path, frame: &visor::RenderedFrame) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        out,
        &frame.to_straight_rgba(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("wrote {}", out.display());
    Ok(())
}
