//! Cell Traversal Engine.
//!
//! A ray is walked cell to cell through the foam. Each cell is convex and
//! bounded exactly by the bisector planes to its neighbors, so the exit
//! point is the nearest forward plane crossing past the entry distance; a
//! linear scan over the cell's faces finds it without any acceleration
//! structure.

use glam::Vec3;

use crate::composite::{Accumulator, GammaMode};
use crate::sh::{shade, ShBasis};
use crate::{FoamStore, Ray};

/// Stop once transmittance drops below this by default.
pub const DEFAULT_TRANSMITTANCE_THRESHOLD: f32 = 0.01;
/// Default per-ray step budget.
pub const DEFAULT_MAX_STEPS: u32 = 512;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceSettings {
    /// Hard cap on cells visited per ray; guards against malformed topology.
    pub max_steps: u32,
    /// Early-out once this little light gets through. Higher values are
    /// faster and less accurate.
    pub transmittance_threshold: f32,
    pub gamma: GammaMode,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            transmittance_threshold: DEFAULT_TRANSMITTANCE_THRESHOLD,
            gamma: GammaMode::default(),
        }
    }
}

/// Why a walk ended. None of these is an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The cell had no forward-facing face: an unbounded hull cell.
    LeftFoam,
    /// The next face lies at or beyond the far bound.
    ReachedDepth,
    /// Transmittance fell below the threshold.
    Opaque,
    /// The step budget ran out.
    StepBudget,
}

impl Termination {
    pub const ALL: [Termination; 4] = [
        Termination::LeftFoam,
        Termination::ReachedDepth,
        Termination::Opaque,
        Termination::StepBudget,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One composited segment, reported to [`trace_with`] observers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceStep {
    pub cell: u32,
    pub t_0: f32,
    pub t_1: f32,
    pub alpha: f32,
    /// Transmittance after this segment.
    pub transmittance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceResult {
    /// Accumulated, not yet resolved against the background. In
    /// [`GammaMode::Final`] this is still display-space.
    pub accumulator: Accumulator,
    pub steps: u32,
    pub termination: Termination,
}

impl TraceResult {
    #[inline]
    pub fn color(&self) -> Vec3 {
        self.accumulator.color
    }

    #[inline]
    pub fn transmittance(&self) -> f32 {
        self.accumulator.transmittance
    }
}

/// Result of scanning one cell for its exit face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExitFace {
    /// Winning face index, if any face is crossed in `(t_0, t_max)`.
    pub face: Option<usize>,
    /// Distance of that crossing, or `t_max` when there is none.
    pub t: f32,
    /// Whether the cell had any face the ray moves toward.
    pub any_forward: bool,
}

/// Scan `cell`'s faces for the nearest bisector crossing in `(t_0, t_max)`.
///
/// Face `f` with normal `diff` passes through `position + diff / 2`; the ray
/// crosses it at `dot(mid - origin, diff) / dot(diff, dir)`. Only faces with
/// `dot(diff, dir) > 0` can be exits. Ties keep the first face scanned.
#[inline]
pub fn find_exit_face(foam: &FoamStore, cell: u32, ray: &Ray, t_0: f32, t_max: f32) -> ExitFace {
    let position = foam.position(cell);
    let to_cell = position - ray.origin;

    let mut t_1 = t_max;
    let mut face = None;
    let mut any_forward = false;

    for f in foam.adjacency_range(cell) {
        let diff = foam.face_diff(f);
        let denom = diff.dot(ray.direction);
        if denom <= 0.0 {
            continue;
        }
        any_forward = true;
        let mid = to_cell + diff * 0.5;
        let t = mid.dot(diff) / denom;
        if t > t_0 && t < t_1 {
            t_1 = t;
            face = Some(f);
        }
    }

    ExitFace {
        face,
        t: t_1,
        any_forward,
    }
}

/// Walk `ray` from `start_cell` over `[t_enter, t_exit)`.
pub fn trace(
    foam: &FoamStore,
    ray: &Ray,
    start_cell: u32,
    t_enter: f32,
    t_exit: f32,
    settings: &TraceSettings,
) -> TraceResult {
    trace_with(foam, ray, start_cell, t_enter, t_exit, settings, |_| {})
}

/// [`trace`], calling `on_step` after every composited segment.
pub fn trace_with(
    foam: &FoamStore,
    ray: &Ray,
    start_cell: u32,
    t_enter: f32,
    t_exit: f32,
    settings: &TraceSettings,
    mut on_step: impl FnMut(&TraceStep),
) -> TraceResult {
    let basis = ShBasis::new(ray.direction, foam.degree());
    let mut acc = Accumulator::default();
    let mut cell = start_cell;
    let mut t_0 = t_enter;

    for step in 0..settings.max_steps {
        let exit = find_exit_face(foam, cell, ray, t_0, t_exit);
        let t_1 = exit.t;

        let attrs = foam.attributes(cell);
        let rgb = settings.gamma.step_color(shade(attrs.harmonics, &basis));
        let alpha = acc.absorb(attrs.density, t_1 - t_0, rgb);

        on_step(&TraceStep {
            cell,
            t_0,
            t_1,
            alpha,
            transmittance: acc.transmittance,
        });

        let termination = match exit.face {
            None if !exit.any_forward => Some(Termination::LeftFoam),
            None => Some(Termination::ReachedDepth),
            Some(_) if t_1 >= t_exit => Some(Termination::ReachedDepth),
            Some(_) if acc.transmittance < settings.transmittance_threshold => {
                Some(Termination::Opaque)
            }
            Some(_) => None,
        };
        if let Some(termination) = termination {
            return TraceResult {
                accumulator: acc,
                steps: step + 1,
                termination,
            };
        }

        if let Some(face) = exit.face {
            cell = foam.neighbor(face);
        }
        t_0 = t_1;
    }

    TraceResult {
        accumulator: acc,
        steps: settings.max_steps,
        termination: Termination::StepBudget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FoamParts, ShDegree};

    fn gray(v: f32) -> Vec3 {
        Vec3::splat(v - 0.5)
    }

    /// Two cells split by the plane x = 0.
    fn two_cells(density_0: f32, density_1: f32) -> FoamStore {
        FoamStore::new(FoamParts {
            degree: ShDegree::Zero,
            positions: vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            adjacency_end: vec![1, 2],
            neighbors: vec![1, 0],
            densities: vec![density_0, density_1],
            harmonics: vec![gray(0.8), gray(0.3)],
        })
        .unwrap()
    }

    fn off() -> TraceSettings {
        TraceSettings {
            gamma: GammaMode::Off,
            transmittance_threshold: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_cell_scenario() {
        let foam = two_cells(1.0, 0.0);
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::X).unwrap();

        let mut steps = Vec::new();
        let result = trace_with(&foam, &ray, 0, 0.0, 10.0, &off(), |s| steps.push(*s));

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].cell, 0);
        assert!((steps[0].t_1 - 1.0).abs() < 1e-6, "exit at x = 0");
        assert!((steps[0].alpha - 0.632_120_56).abs() < 1e-5);
        assert_eq!(steps[1].cell, 1);
        assert_eq!(steps[1].t_1, 10.0);
        assert_eq!(steps[1].alpha, 0.0);

        assert_eq!(result.termination, Termination::LeftFoam);
        assert!((result.transmittance() - 0.367_879_44).abs() < 1e-5);
        let expected = Vec3::splat(0.8 * 0.632_120_56);
        assert!((result.color() - expected).length() < 1e-5, "{:?}", result.color());
    }

    #[test]
    fn test_isolated_cell_composites_once_to_depth() {
        let foam = FoamStore::new(FoamParts {
            degree: ShDegree::Zero,
            positions: vec![Vec3::ZERO],
            adjacency_end: vec![0],
            neighbors: vec![],
            densities: vec![0.1],
            harmonics: vec![gray(0.6)],
        })
        .unwrap();
        let ray = Ray::new(Vec3::ZERO, Vec3::Y).unwrap();
        let result = trace(&foam, &ray, 0, 0.0, 5.0, &off());

        assert_eq!(result.steps, 1);
        assert_eq!(result.termination, Termination::LeftFoam);
        let t = (-0.5f32).exp();
        assert!((result.transmittance() - t).abs() < 1e-6);
        assert!((result.color() - Vec3::splat(0.6 * (1.0 - t))).length() < 1e-6);
    }

    #[test]
    fn test_far_bound_stops_inside_cell() {
        let foam = two_cells(2.0, 2.0);
        let ray = Ray::new(Vec3::new(-3.0, 0.0, 0.0), Vec3::X).unwrap();
        let result = trace(&foam, &ray, 0, 0.0, 2.5, &off());
        assert_eq!(result.termination, Termination::ReachedDepth);
        assert_eq!(result.steps, 1);
        assert!((result.transmittance() - (-5.0f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_opacity_threshold_stops_early() {
        let foam = two_cells(50.0, 1.0);
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::X).unwrap();
        let settings = TraceSettings {
            transmittance_threshold: 0.05,
            ..off()
        };
        let result = trace(&foam, &ray, 0, 0.0, 10.0, &settings);
        assert_eq!(result.termination, Termination::Opaque);
        assert_eq!(result.steps, 1);
    }

    #[test]
    fn test_step_budget_truncates() {
        let foam = two_cells(0.0, 0.0);
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::X).unwrap();
        let settings = TraceSettings {
            max_steps: 1,
            ..off()
        };
        let result = trace(&foam, &ray, 0, 0.0, 10.0, &settings);
        assert_eq!(result.termination, Termination::StepBudget);
        assert_eq!(result.steps, 1);
    }

    #[test]
    fn test_backward_faces_are_never_exits() {
        let foam = two_cells(1.0, 1.0);
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::NEG_X).unwrap();
        let exit = find_exit_face(&foam, 0, &ray, 0.0, 100.0);
        assert_eq!(exit.face, None);
        assert!(!exit.any_forward);
        assert_eq!(exit.t, 100.0);
    }

    #[test]
    fn test_faces_behind_t0_are_skipped() {
        let foam = two_cells(1.0, 1.0);
        let ray = Ray::new(Vec3::new(-3.0, 0.0, 0.0), Vec3::X).unwrap();
        // Crossing at t = 3 lies before the entry distance.
        let exit = find_exit_face(&foam, 0, &ray, 4.0, 100.0);
        assert_eq!(exit.face, None);
        assert!(exit.any_forward);
    }

    #[test]
    fn test_degree_zero_is_view_independent() {
        let foam = two_cells(3.0, 3.0);
        let settings = TraceSettings::default();
        let colors: Vec<Vec3> = [Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::new(1.0, -0.3, 0.8)]
            .iter()
            .map(|&d| {
                let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), d).unwrap();
                let r = trace(&foam, &ray, 0, 0.0, 0.5, &settings);
                r.color() / (1.0 - r.transmittance())
            })
            .collect();
        for c in &colors[1..] {
            assert!((*c - colors[0]).length() < 1e-5, "{:?} vs {:?}", c, colors[0]);
        }
    }
}
