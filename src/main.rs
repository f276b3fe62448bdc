use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glam::{Quat, UVec3, Vec3, Vec4};

use foamview::output;
use foamview::util::Timed;
use radiant_foam::lattice::{self, LatticeConfig};
use radiant_foam::{
    Background, BlendMode, BoundaryTextures, BoundingBox, Camera, EntryMode, FoamStore, GammaMode,
    RenderSettings, Renderer, ShDegree, TraceSettings,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliCamera {
    Perspective,
    Fisheye,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliEntry {
    /// Every ray starts in the cell containing the camera
    #[value(name = "camera-cell")]
    CameraCell,
    /// Per-ray nearest-generator scan (slow, exact)
    Nearest,
    /// Baked box-face textures (requires --bounds-size)
    Boundary,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliGamma {
    #[value(name = "per-step")]
    PerStep,
    Final,
    Off,
}

impl From<CliGamma> for GammaMode {
    fn from(value: CliGamma) -> Self {
        match value {
            CliGamma::PerStep => GammaMode::PerStep,
            CliGamma::Final => GammaMode::Final,
            CliGamma::Off => GammaMode::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliBlend {
    Lerp,
    Under,
}

impl From<CliBlend> for BlendMode {
    fn from(value: CliBlend) -> Self {
        match value {
            CliBlend::Lerp => BlendMode::Lerp,
            CliBlend::Under => BlendMode::Under,
        }
    }
}

fn parse_floats(s: &str) -> Result<Vec<f32>, String> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("Invalid number '{}': {}", part, e))
        })
        .collect()
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    match parse_floats(s)?.as_slice() {
        [v] => Ok(Vec3::splat(*v)),
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("Expected 'x,y,z' or a single value, got '{}'", s)),
    }
}

fn parse_color(s: &str) -> Result<Vec4, String> {
    match parse_floats(s)?.as_slice() {
        [r, g, b] => Ok(Vec4::new(*r, *g, *b, 1.0)),
        [r, g, b, a] => Ok(Vec4::new(*r, *g, *b, *a)),
        _ => Err(format!("Expected 'r,g,b' or 'r,g,b,a', got '{}'", s)),
    }
}

/// foamview - headless radiance-field foam renderer
#[derive(Parser, Debug)]
#[command(name = "foamview", version, about)]
struct Cli {
    /// Foam file to render (.json or .json.gz). Renders a synthetic lattice when omitted.
    #[arg(long, value_name = "FILE")]
    foam: Option<PathBuf>,

    /// Lattice cells per axis
    #[arg(long, default_value_t = 16)]
    grid: u32,

    /// Lattice seed (random colors and densities); a gradient when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Lattice base density
    #[arg(long, default_value_t = 0.5)]
    density: f32,

    /// Lattice SH degree (0-3)
    #[arg(long, default_value_t = 0)]
    degree: u32,

    /// Make the lattice's outer shell transparent
    #[arg(long)]
    transparent_shell: bool,

    #[arg(long, value_enum, default_value_t = CliCamera::Perspective)]
    camera: CliCamera,

    /// Camera position (defaults to the foam centroid)
    #[arg(long, value_parser = parse_vec3)]
    eye: Option<Vec3>,

    /// Look-at point (defaults to straight down -Z)
    #[arg(long, value_parser = parse_vec3)]
    target: Option<Vec3>,

    /// Vertical field of view in degrees (fisheye: off-axis angle at the unit NDC circle)
    #[arg(long, default_value_t = 60.0)]
    fov: f32,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Bounding box center
    #[arg(long, value_parser = parse_vec3)]
    bounds_center: Option<Vec3>,

    /// Bounding box size; enables box clipping
    #[arg(long, value_parser = parse_vec3)]
    bounds_size: Option<Vec3>,

    /// Bounding box rotation about +Y in degrees
    #[arg(long, default_value_t = 0.0)]
    bounds_yaw: f32,

    #[arg(long, value_enum, default_value_t = CliEntry::CameraCell)]
    entry: CliEntry,

    /// Texels per side of each baked boundary texture
    #[arg(long, default_value_t = 128, value_parser = clap::value_parser!(u32).range(1..))]
    texture_resolution: u32,

    #[arg(long, value_enum, default_value_t = CliGamma::PerStep)]
    gamma: CliGamma,

    #[arg(long, value_enum, default_value_t = CliBlend::Lerp)]
    blend: CliBlend,

    /// Background color 'r,g,b[,a]' in display space
    #[arg(long, value_parser = parse_color, default_value = "0,0,0,1")]
    background: Vec4,

    /// Background image (overrides --background)
    #[arg(long, value_name = "FILE")]
    background_image: Option<PathBuf>,

    /// Traversal step budget per ray
    #[arg(long, default_value_t = radiant_foam::traverse::DEFAULT_MAX_STEPS)]
    max_steps: u32,

    /// Stop a ray once its transmittance falls below this
    #[arg(long, default_value_t = radiant_foam::traverse::DEFAULT_TRANSMITTANCE_THRESHOLD)]
    threshold: f32,

    /// Output image
    #[arg(short, long, default_value = "frame.png")]
    output: PathBuf,

    /// Export the rendered foam (supports .json and .json.gz)
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let foam = load_scene(&cli)?;
    let centroid = foam.positions().iter().copied().sum::<Vec3>() / foam.num_cells() as f32;

    let eye = cli.eye.unwrap_or(centroid);
    let target = cli.target.unwrap_or(eye - Vec3::Z);
    let camera = match cli.camera {
        CliCamera::Perspective => Camera::perspective(
            eye,
            target,
            cli.fov.to_radians(),
            cli.width as f32 / cli.height.max(1) as f32,
        ),
        CliCamera::Fisheye => Camera::fisheye(eye, target, cli.fov),
    };

    let bounds = cli.bounds_size.map(|size| {
        BoundingBox::from_center_size_rotation(
            cli.bounds_center.unwrap_or(centroid),
            size,
            Quat::from_rotation_y(cli.bounds_yaw.to_radians()),
        )
    });

    let entry = match cli.entry {
        CliEntry::CameraCell => EntryMode::CameraCell,
        CliEntry::Nearest => EntryMode::NearestCell,
        CliEntry::Boundary => match &bounds {
            Some(bounds) => {
                EntryMode::Boundary(bake_boundary(&foam, bounds, cli.texture_resolution)?)
            }
            None => {
                log::warn!("--entry boundary needs --bounds-size; using the camera cell");
                EntryMode::CameraCell
            }
        },
    };

    let background = match &cli.background_image {
        Some(path) => Background::Image(
            output::load_background(path)
                .with_context(|| format!("Failed to load background {}", path.display()))?,
        ),
        None => Background::Solid(cli.background),
    };

    let settings = RenderSettings {
        width: cli.width,
        height: cli.height,
        blend: cli.blend.into(),
        trace: TraceSettings {
            max_steps: cli.max_steps,
            transmittance_threshold: cli.threshold,
            gamma: cli.gamma.into(),
        },
        ..Default::default()
    };

    let mut renderer = Renderer::new(&foam)
        .with_settings(settings)
        .with_entry(entry)
        .with_background(background);
    renderer.bounds = bounds;

    let rays = cli.width as u64 * cli.height as u64;
    let result = {
        let _t = Timed::info("Render").with_throughput(rays, "ray");
        renderer.render(&camera)
    };

    let d = &result.diagnostics;
    log::info!(
        "{} rays traced ({} without a ray, {} outside the box), mean {:.1} steps, max {}",
        d.traced,
        d.no_ray,
        d.missed_bounds,
        d.mean_steps(),
        d.max_steps
    );

    output::save_frame(&result.frame, &cli.output)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    log::info!("Wrote {}", cli.output.display());

    if let Some(path) = &cli.export {
        let _t = Timed::info("Export");
        radiant_foam::save_foam(&foam, path)
            .with_context(|| format!("Failed to export foam to {}", path.display()))?;
    }

    Ok(())
}

fn load_scene(cli: &Cli) -> Result<FoamStore> {
    if let Some(path) = &cli.foam {
        let _t = Timed::info("Load foam");
        return radiant_foam::load_foam(path)
            .with_context(|| format!("Failed to load foam {}", path.display()));
    }

    let config = LatticeConfig {
        dims: UVec3::splat(cli.grid),
        density: cli.density,
        seed: cli.seed,
        degree: ShDegree::from_u32(cli.degree)?,
        transparent_shell: cli.transparent_shell,
        ..Default::default()
    };
    let _t = Timed::info("Build lattice").with_throughput(config.num_cells() as u64, "cell");
    lattice::build(&config).context("Failed to build lattice")
}

fn bake_boundary(
    foam: &FoamStore,
    bounds: &BoundingBox,
    resolution: u32,
) -> Result<BoundaryTextures> {
    let texels = 6 * resolution as u64 * resolution as u64;
    let _t = Timed::info("Bake boundary textures").with_throughput(texels, "texel");
    BoundaryTextures::bake(resolution, |local| {
        foam.nearest_cell(bounds.local_to_world().transform_point3(local))
    })
    .context("Failed to bake boundary textures")
}
