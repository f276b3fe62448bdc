//! Benchmark frame rendering over synthetic lattices.
//!
//! Run with: cargo run --release --bin bench_render
//!
//! Usage:
//!   bench_render               Run default size (64k cells)
//!   bench_render 8k 64k 1m     Run multiple sizes
//!   bench_render -n 10         Run 10 iterations (for profiling)
//!   bench_render --fisheye     Use a 180 degree fisheye camera

use std::time::Instant;

use clap::Parser;
use glam::{UVec3, Vec3};

use foamview::util::format_rate;
use radiant_foam::lattice::{self, LatticeConfig};
use radiant_foam::{Camera, RenderSettings, Renderer, ShDegree, Termination};

fn parse_count(s: &str) -> Result<usize, String> {
    let s = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix('k') {
        (n, 1_000)
    } else {
        (s.as_str(), 1)
    };

    num_str
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as usize)
        .map_err(|e| format!("Invalid number '{}': {}", s, e))
}

fn format_num(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{}k", n / 1_000)
    } else {
        format!("{}", n)
    }
}

#[derive(Parser)]
#[command(name = "bench_render")]
#[command(about = "Benchmark foam ray traversal at various scales")]
struct Args {
    /// Approximate cell counts to benchmark (e.g., 8k, 64k, 1m)
    #[arg(value_parser = parse_count)]
    sizes: Vec<usize>,

    /// Random seed for lattice colors and densities
    #[arg(short, long, default_value_t = 12345)]
    seed: u64,

    /// SH degree of the lattice (0-3)
    #[arg(long, default_value_t = 3)]
    degree: u32,

    #[arg(long, default_value_t = 512)]
    width: u32,

    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Lattice base density
    #[arg(long, default_value_t = 0.2)]
    density: f32,

    /// Render through a fisheye camera instead of a perspective one
    #[arg(long)]
    fisheye: bool,

    /// Number of iterations to run (useful for profiling)
    #[arg(short = 'n', long, default_value_t = 3)]
    repeat: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let sizes = if args.sizes.is_empty() {
        vec![64_000]
    } else {
        args.sizes.clone()
    };
    let degree = ShDegree::from_u32(args.degree)?;

    println!(
        "bench_render: {}x{}, SH degree {}, {} iteration(s), {} threads",
        args.width,
        args.height,
        args.degree,
        args.repeat,
        rayon::current_num_threads()
    );

    for &size in &sizes {
        let side = (size as f64).cbrt().round().max(2.0) as u32;
        let config = LatticeConfig {
            dims: UVec3::splat(side),
            density: args.density,
            seed: Some(args.seed),
            degree,
            transparent_shell: true,
            ..Default::default()
        };

        let start = Instant::now();
        let foam = lattice::build(&config)?;
        let build_ms = start.elapsed().as_secs_f64() * 1000.0;

        let center = config.center();
        let eye = center + Vec3::new(0.13, 0.07, 0.05) * config.spacing;
        let target = eye + Vec3::new(0.3, -0.2, -1.0);
        let camera = if args.fisheye {
            Camera::fisheye(eye, target, 180.0)
        } else {
            Camera::perspective(eye, target, 1.0, args.width as f32 / args.height as f32)
        };

        let renderer = Renderer::new(&foam).with_settings(RenderSettings {
            width: args.width,
            height: args.height,
            ..Default::default()
        });

        println!(
            "\n{} cells ({}^3), {} faces, built in {:.1}ms",
            format_num(foam.num_cells()),
            side,
            foam.num_faces(),
            build_ms
        );

        let rays = args.width as u64 * args.height as u64;
        let mut best = f64::INFINITY;
        let mut last = None;
        for i in 0..args.repeat.max(1) {
            let start = Instant::now();
            let output = renderer.render(&camera);
            let elapsed = start.elapsed();
            best = best.min(elapsed.as_secs_f64());
            println!(
                "  run {}: {:.1}ms ({})",
                i + 1,
                elapsed.as_secs_f64() * 1000.0,
                format_rate(rays, elapsed, "ray")
            );
            last = Some(output.diagnostics);
        }

        if let Some(d) = last {
            println!(
                "  best {:.1}ms ({}), mean {:.1} steps/ray, max {}",
                best * 1000.0,
                format_rate(rays, std::time::Duration::from_secs_f64(best), "ray"),
                d.mean_steps(),
                d.max_steps
            );
            let counts: Vec<String> = Termination::ALL
                .iter()
                .map(|t| format!("{:?}={}", t, d.count(*t)))
                .collect();
            println!("  terminations: {}", counts.join(" "));
        }
    }

    Ok(())
}
