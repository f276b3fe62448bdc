//! Public API integration tests for radiant-foam.

use glam::{UVec3, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use radiant_foam::lattice::{self, LatticeConfig};
use radiant_foam::packed::PackedPosition;
use radiant_foam::{
    render, render_with, trace, trace_with, Background, BlendMode, BoundaryTextures, BoundingBox,
    Camera, EntryMode, FoamError, FoamParts, FoamStore, GammaMode, Ray, RenderSettings, Renderer,
    ShDegree, Termination, TraceSettings,
};

fn linear_settings() -> TraceSettings {
    TraceSettings {
        gamma: GammaMode::Off,
        ..Default::default()
    }
}

/// Two cells split by the plane x = 0; only the left one absorbs.
fn two_cell_foam(color: Vec3) -> FoamStore {
    FoamStore::new(FoamParts {
        degree: ShDegree::Zero,
        positions: vec![Vec3::new(-0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0)],
        adjacency_end: vec![1, 2],
        neighbors: vec![1, 0],
        densities: vec![1.0, 0.0],
        harmonics: vec![color - 0.5, Vec3::ZERO],
    })
    .expect("two-cell foam is valid")
}

fn random_direction<R: Rng>(rng: &mut R) -> Vec3 {
    use std::f32::consts::PI;
    let z: f32 = rng.gen_range(-1.0..1.0);
    let theta: f32 = rng.gen_range(0.0..2.0 * PI);
    let r = (1.0 - z * z).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

#[test]
fn test_two_cell_walkthrough() {
    let color = Vec3::new(0.8, 0.4, 0.2);
    let foam = two_cell_foam(color);
    let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::X).unwrap();

    let mut steps = Vec::new();
    let result = trace_with(&foam, &ray, 0, 0.0, 10.0, &linear_settings(), |s| {
        steps.push(*s)
    });

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].cell, 0);
    assert!((steps[0].t_1 - 1.0).abs() < 1e-6, "exit face at x = 0");
    assert_eq!(steps[1].cell, 1);
    assert_eq!(steps[1].alpha, 0.0);
    assert_eq!(result.termination, Termination::LeftFoam);

    let expected_t = (-1.0f32).exp();
    assert!((result.transmittance() - expected_t).abs() < 1e-5);
    assert!((result.color() - color * (1.0 - expected_t)).length() < 1e-5);
}

#[test]
fn test_invalid_buffers_are_rejected() {
    let parts = FoamParts {
        degree: ShDegree::Zero,
        positions: vec![Vec3::ZERO, Vec3::X],
        adjacency_end: vec![1, 2],
        neighbors: vec![1, 0],
        densities: vec![1.0, 1.0],
        harmonics: vec![Vec3::ZERO; 2],
    };
    assert!(FoamStore::new(parts.clone()).is_ok());

    let mut bad = parts.clone();
    bad.adjacency_end = vec![2, 1];
    assert!(matches!(
        FoamStore::new(bad),
        Err(FoamError::NonMonotoneAdjacency { .. })
    ));

    let mut bad = parts.clone();
    bad.neighbors = vec![1, 2];
    assert!(matches!(
        FoamStore::new(bad),
        Err(FoamError::NeighborOutOfRange { neighbor: 2, .. })
    ));

    let mut bad = parts.clone();
    bad.positions[1] = Vec3::ZERO;
    assert!(matches!(
        FoamStore::new(bad),
        Err(FoamError::DegenerateFace { .. })
    ));

    let mut bad = parts.clone();
    bad.degree = ShDegree::One;
    assert!(matches!(
        FoamStore::new(bad),
        Err(FoamError::LengthMismatch { .. })
    ));

    let mut bad = parts;
    bad.densities[0] = f32::NAN;
    assert!(matches!(
        FoamStore::new(bad),
        Err(FoamError::InvalidDensity { cell: 0, .. })
    ));

    assert!(matches!(
        FoamStore::new(FoamParts::default()),
        Err(FoamError::Empty)
    ));
}

#[test]
fn test_packed_buffers_rebuild_the_same_foam() {
    let foam = lattice::build(&LatticeConfig {
        dims: UVec3::new(3, 3, 2),
        seed: Some(5),
        ..Default::default()
    })
    .unwrap();

    let packed = foam.packed_positions();
    let bytes: &[u8] = bytemuck::cast_slice(&packed);
    assert_eq!(bytes.len(), foam.num_cells() * 16);
    let back: &[PackedPosition] = bytemuck::cast_slice(bytes);

    let mut words = Vec::new();
    for coeffs in foam.harmonics().chunks_exact(1) {
        radiant_foam::packed::encode_harmonics(coeffs, ShDegree::Zero, &mut words);
    }
    let rebuilt = FoamStore::from_packed(
        ShDegree::Zero,
        back,
        foam.neighbors().to_vec(),
        foam.densities().to_vec(),
        &words,
    )
    .unwrap();

    assert_eq!(rebuilt.positions(), foam.positions());
    assert_eq!(rebuilt.adjacency_ends(), foam.adjacency_ends());
    for face in 0..foam.num_faces() {
        assert_eq!(rebuilt.face_diff(face), foam.face_diff(face));
    }
}

#[test]
fn test_random_rays_stay_physical() {
    let foam = lattice::build(&LatticeConfig {
        dims: UVec3::splat(6),
        seed: Some(2024),
        degree: ShDegree::Three,
        ..Default::default()
    })
    .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let settings = TraceSettings::default();

    for _ in 0..200 {
        let origin = Vec3::new(
            rng.gen_range(0.2..4.8),
            rng.gen_range(0.2..4.8),
            rng.gen_range(0.2..4.8),
        );
        let ray = Ray::new(origin, random_direction(&mut rng)).unwrap();
        let start = foam.nearest_cell(origin);

        let mut last_t = 0.0f32;
        let mut last_transmittance = 1.0f32;
        let result = trace_with(&foam, &ray, start, 0.0, 100.0, &settings, |s| {
            assert!(s.t_1 >= s.t_0, "segments never run backwards");
            assert!(s.t_0 >= last_t, "segments are ordered along the ray");
            assert!(s.transmittance <= last_transmittance);
            last_t = s.t_1;
            last_transmittance = s.transmittance;
        });

        let t = result.transmittance();
        assert!((0.0..=1.0).contains(&t), "transmittance {} out of range", t);
        assert!(result.color().min_element() >= 0.0);
        assert!(result.steps <= settings.max_steps);
        assert_ne!(result.termination, Termination::StepBudget);
    }
}

#[test]
fn test_render_is_deterministic() {
    let foam = lattice::build(&LatticeConfig {
        seed: Some(3),
        ..Default::default()
    })
    .unwrap();
    let camera = Camera::perspective(Vec3::new(1.6, 1.4, 1.3), Vec3::new(5.0, 0.0, 0.0), 1.0, 1.5);
    let settings = RenderSettings {
        width: 24,
        height: 16,
        ..Default::default()
    };
    let a = render(&foam, &camera, settings);
    let b = render(&foam, &camera, settings);
    assert_eq!(a.frame, b.frame);
    assert_eq!(a.diagnostics, b.diagnostics);
}

#[test]
fn test_degree_zero_ignores_view_direction() {
    let foam = lattice::build(&LatticeConfig {
        dims: UVec3::splat(3),
        ..Default::default()
    })
    .unwrap();
    let center = foam.position(13);
    let settings = TraceSettings {
        max_steps: 1,
        ..linear_settings()
    };

    let mut colors = Vec::new();
    for dir in [Vec3::X, Vec3::NEG_Y, Vec3::new(1.0, 1.0, 1.0)] {
        let ray = Ray::new(center, dir).unwrap();
        let result = trace(&foam, &ray, 13, 0.0, 0.25, &settings);
        colors.push(result.color());
    }
    assert_eq!(colors[0], colors[1]);
    assert_eq!(colors[0], colors[2]);
}

#[test]
fn test_transparent_foam_shows_background() {
    let mut foam = lattice::build(&LatticeConfig::default()).unwrap();
    foam.make_transparent(0..foam.num_cells() as u32).unwrap();

    let bg = Vec4::new(0.25, 0.5, 0.75, 1.0);
    let camera = Camera::fisheye(Vec3::splat(1.5), Vec3::new(1.5, 1.5, -3.0), 120.0);
    let settings = RenderSettings {
        width: 10,
        height: 10,
        blend: BlendMode::Under,
        ..Default::default()
    };
    let out = render_with(&foam, &camera, settings, None, Background::Solid(bg));
    for px in &out.frame.pixels {
        assert!((*px - bg).length() < 1e-5, "{} vs {}", px, bg);
    }
}

#[test]
fn test_boundary_entry_matches_nearest_cell() {
    let config = LatticeConfig {
        dims: UVec3::splat(5),
        spacing: 0.4,
        origin: Vec3::splat(-0.8),
        seed: Some(11),
        ..Default::default()
    };
    let foam = lattice::build(&config).unwrap();
    let bounds = BoundingBox::axis_aligned(Vec3::ZERO, Vec3::splat(2.0));
    let textures = BoundaryTextures::bake(64, |local| {
        foam.nearest_cell(bounds.local_to_world().transform_point3(local))
    })
    .unwrap();

    let camera = Camera::perspective(Vec3::new(0.3, 0.5, 4.0), Vec3::ZERO, 0.7, 1.0);
    let settings = RenderSettings {
        width: 12,
        height: 12,
        trace: linear_settings(),
        ..Default::default()
    };
    let baked = Renderer::new(&foam)
        .with_settings(settings)
        .with_bounds(bounds)
        .with_entry(EntryMode::Boundary(textures))
        .render(&camera);
    let scanned = Renderer::new(&foam)
        .with_settings(settings)
        .with_bounds(bounds)
        .with_entry(EntryMode::NearestCell)
        .render(&camera);

    assert!(baked.diagnostics.traced > 0);
    let differing = baked
        .frame
        .pixels
        .iter()
        .zip(&scanned.frame.pixels)
        .filter(|(a, b)| (**a - **b).length() > 1e-4)
        .count();
    // Texel quantization may pick a neighbor right at a cell edge.
    assert!(
        differing * 10 < baked.frame.pixels.len(),
        "{} of {} pixels differ",
        differing,
        baked.frame.pixels.len()
    );
}

#[test]
fn test_boundary_entry_from_inside_the_box() {
    let foam = lattice::build(&LatticeConfig {
        dims: UVec3::splat(5),
        spacing: 0.4,
        origin: Vec3::splat(-0.8),
        seed: Some(11),
        ..Default::default()
    })
    .unwrap();
    let bounds = BoundingBox::axis_aligned(Vec3::ZERO, Vec3::splat(2.0));
    let textures = BoundaryTextures::bake(64, |local| {
        foam.nearest_cell(bounds.local_to_world().transform_point3(local))
    })
    .unwrap();

    let camera = Camera::perspective(Vec3::new(0.1, 0.05, 0.0), Vec3::new(0.4, 0.2, -3.0), 1.2, 1.0);
    let settings = RenderSettings {
        width: 12,
        height: 12,
        trace: linear_settings(),
        ..Default::default()
    };
    let baked = Renderer::new(&foam)
        .with_settings(settings)
        .with_bounds(bounds)
        .with_entry(EntryMode::Boundary(textures))
        .render(&camera);
    let scanned = Renderer::new(&foam)
        .with_settings(settings)
        .with_bounds(bounds)
        .with_entry(EntryMode::NearestCell)
        .render(&camera);

    assert_eq!(baked.diagnostics.traced, 144);
    assert_eq!(baked.frame, scanned.frame, "rays from inside start in the camera cell");
}

#[test]
fn test_zero_resolution_textures_are_rejected() {
    assert!(matches!(
        BoundaryTextures::bake(0, |_| 0),
        Err(FoamError::BadTexture { .. })
    ));
}

#[test]
fn test_moving_generators_changes_the_frame() {
    let mut foam = lattice::build(&LatticeConfig {
        seed: Some(8),
        ..Default::default()
    })
    .unwrap();
    let camera = Camera::perspective(Vec3::new(1.5, 1.5, 1.4), Vec3::new(1.5, 1.5, -5.0), 0.9, 1.0);
    let settings = RenderSettings {
        width: 8,
        height: 8,
        ..Default::default()
    };
    let before = render(&foam, &camera, settings);

    let moved: Vec<Vec3> = foam.positions().iter().map(|p| *p * 1.3).collect();
    foam.set_positions(moved).unwrap();
    assert!((foam.face_diff(0).length() - 1.3).abs() < 1e-5);
    let after = render(&foam, &camera, settings);
    assert_ne!(before.frame, after.frame);

    let wrong_len = vec![Vec3::ZERO; 3];
    assert!(foam.set_positions(wrong_len).is_err());
}
