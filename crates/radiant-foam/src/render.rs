//! Frame driver: one independent task per pixel, rows spread over rayon.

use glam::{Vec2, Vec4, Vec4Swizzles};
use rayon::prelude::*;

use crate::camera::pixel_to_ndc;
use crate::composite::{Accumulator, BlendMode};
use crate::entry::{BoundaryLookup, EntryQuery, EntryStrategy, NearestCell, StartCell};
use crate::traverse::{trace, Termination, TraceSettings};
use crate::{BoundaryTextures, BoundingBox, Camera, FoamStore};

/// Far bound for rays when no bounding box is configured.
pub const DEFAULT_SCENE_DEPTH: f32 = 10_000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Maximum ray distance without a bounding box.
    pub scene_depth: f32,
    pub blend: BlendMode,
    pub trace: TraceSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            scene_depth: DEFAULT_SCENE_DEPTH,
            blend: BlendMode::default(),
            trace: TraceSettings::default(),
        }
    }
}

/// An RGBA image in display space, row-major from the top.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl Frame {
    pub fn filled(width: u32, height: u32, color: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// What shows through where the volume is transparent (display space).
#[derive(Clone, Debug, PartialEq)]
pub enum Background {
    Solid(Vec4),
    /// Nearest-sampled when its size differs from the frame.
    Image(Frame),
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid(Vec4::new(0.0, 0.0, 0.0, 1.0))
    }
}

impl Background {
    #[inline]
    pub fn sample(&self, x: u32, y: u32, width: u32, height: u32) -> Vec4 {
        match self {
            Background::Solid(c) => *c,
            Background::Image(img) => {
                let sx = (x as u64 * img.width as u64 / width as u64) as u32;
                let sy = (y as u64 * img.height as u64 / height as u64) as u32;
                img.get(sx.min(img.width - 1), sy.min(img.height - 1))
            }
        }
    }
}

/// How each ray picks its first cell.
#[derive(Clone, Debug, Default)]
pub enum EntryMode {
    /// The cell containing the camera, found once per frame.
    #[default]
    CameraCell,
    /// Per-ray scan for the cell nearest the entry point.
    NearestCell,
    /// Box-face lookup textures; needs a bounding box, otherwise every ray
    /// starts in the camera cell.
    Boundary(BoundaryTextures),
}

/// What happened to one pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelOutcome {
    /// The camera produced no ray (outside the fisheye cone).
    NoRay,
    /// The ray missed the bounding box.
    MissedBounds,
    Traced { steps: u32, termination: Termination },
}

/// Per-frame counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderDiagnostics {
    pub no_ray: u64,
    pub missed_bounds: u64,
    pub traced: u64,
    pub total_steps: u64,
    pub max_steps: u32,
    /// Indexed by [`Termination::index`].
    pub terminations: [u64; 4],
}

impl RenderDiagnostics {
    pub fn record(&mut self, outcome: PixelOutcome) {
        match outcome {
            PixelOutcome::NoRay => self.no_ray += 1,
            PixelOutcome::MissedBounds => self.missed_bounds += 1,
            PixelOutcome::Traced { steps, termination } => {
                self.traced += 1;
                self.total_steps += steps as u64;
                self.max_steps = self.max_steps.max(steps);
                self.terminations[termination.index()] += 1;
            }
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.no_ray += other.no_ray;
        self.missed_bounds += other.missed_bounds;
        self.traced += other.traced;
        self.total_steps += other.total_steps;
        self.max_steps = self.max_steps.max(other.max_steps);
        for (a, b) in self.terminations.iter_mut().zip(other.terminations) {
            *a += b;
        }
        self
    }

    pub fn count(&self, termination: Termination) -> u64 {
        self.terminations[termination.index()]
    }

    pub fn mean_steps(&self) -> f32 {
        if self.traced == 0 {
            0.0
        } else {
            self.total_steps as f32 / self.traced as f32
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub frame: Frame,
    pub diagnostics: RenderDiagnostics,
}

/// Everything constant across a frame.
pub struct FrameContext<'a> {
    pub foam: &'a FoamStore,
    pub camera: &'a Camera,
    pub settings: &'a RenderSettings,
    pub bounds: Option<&'a BoundingBox>,
    pub entry: &'a dyn EntryStrategy,
}

impl FrameContext<'_> {
    /// Shade one pixel over `background` (display space).
    pub fn shade_pixel(&self, ndc: Vec2, background: Vec4) -> (Vec4, PixelOutcome) {
        let Some(ray) = self.camera.ray(ndc) else {
            return (background, PixelOutcome::NoRay);
        };

        let (t_enter, t_exit, box_hit) = match self.bounds {
            Some(bounds) => match bounds.clip(&ray) {
                Some(hit) => (hit.t_enter, hit.t_exit, Some(hit)),
                None => return (background, PixelOutcome::MissedBounds),
            },
            None => (0.0, self.settings.scene_depth, None),
        };

        let query = EntryQuery {
            ray: &ray,
            t_enter,
            box_hit: box_hit.as_ref(),
        };
        let start = self.entry.entry_cell(self.foam, &query);
        let trace_settings = &self.settings.trace;
        let result = trace(self.foam, &ray, start, t_enter, t_exit, trace_settings);

        let outcome = PixelOutcome::Traced {
            steps: result.steps,
            termination: result.termination,
        };
        // Nothing absorbed: keep the background bit-exact.
        if result.transmittance() == 1.0 {
            return (background, outcome);
        }

        let gamma = trace_settings.gamma;
        let bg = gamma.decode_display(background.xyz()).extend(background.w);
        let resolved = resolve(&result.accumulator, bg, self.settings);
        let color = gamma.encode_display(resolved.xyz()).extend(resolved.w);

        (color, outcome)
    }

    /// Render every pixel; rows run in parallel, nothing is shared mutably.
    pub fn render(&self, background: &Background) -> RenderOutput {
        let (width, height) = (self.settings.width, self.settings.height);
        let mut pixels = vec![Vec4::ZERO; (width * height) as usize];

        let diagnostics = pixels
            .par_chunks_mut(width.max(1) as usize)
            .enumerate()
            .map(|(y, row)| {
                let y = y as u32;
                let mut diag = RenderDiagnostics::default();
                for (x, px) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    let ndc = pixel_to_ndc(x, y, width, height);
                    let bg = background.sample(x, y, width, height);
                    let (color, outcome) = self.shade_pixel(ndc, bg);
                    *px = color;
                    diag.record(outcome);
                }
                diag
            })
            .reduce(RenderDiagnostics::default, RenderDiagnostics::merge);

        RenderOutput {
            frame: Frame {
                width,
                height,
                pixels,
            },
            diagnostics,
        }
    }
}

#[inline]
fn resolve(acc: &Accumulator, background: Vec4, settings: &RenderSettings) -> Vec4 {
    acc.resolve(background, settings.trace.gamma, settings.blend)
}

/// A foam plus the per-scene render configuration.
#[derive(Clone, Debug)]
pub struct Renderer<'a> {
    foam: &'a FoamStore,
    pub settings: RenderSettings,
    pub bounds: Option<BoundingBox>,
    pub entry: EntryMode,
    pub background: Background,
}

impl<'a> Renderer<'a> {
    pub fn new(foam: &'a FoamStore) -> Self {
        Self {
            foam,
            settings: RenderSettings::default(),
            bounds: None,
            entry: EntryMode::default(),
            background: Background::default(),
        }
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_entry(mut self, entry: EntryMode) -> Self {
        self.entry = entry;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn foam(&self) -> &'a FoamStore {
        self.foam
    }

    /// Render one frame from `camera`.
    pub fn render(&self, camera: &Camera) -> RenderOutput {
        let camera_cell = StartCell(self.foam.nearest_cell_par(camera.origin()));
        let boundary;
        let entry: &dyn EntryStrategy = match &self.entry {
            EntryMode::CameraCell => &camera_cell,
            EntryMode::NearestCell => &NearestCell,
            EntryMode::Boundary(textures) => {
                boundary = BoundaryLookup {
                    textures,
                    fallback: camera_cell.0,
                };
                &boundary
            }
        };

        let ctx = FrameContext {
            foam: self.foam,
            camera,
            settings: &self.settings,
            bounds: self.bounds.as_ref(),
            entry,
        };
        let output = ctx.render(&self.background);

        let d = &output.diagnostics;
        log::debug!(
            "Frame {}x{}: start cell {}, {} traced, {} no ray, {} missed bounds, \
             mean {:.1} / max {} steps, terminations left={} depth={} opaque={} budget={}",
            self.settings.width,
            self.settings.height,
            camera_cell.0,
            d.traced,
            d.no_ray,
            d.missed_bounds,
            d.mean_steps(),
            d.max_steps,
            d.count(Termination::LeftFoam),
            d.count(Termination::ReachedDepth),
            d.count(Termination::Opaque),
            d.count(Termination::StepBudget),
        );
        if d.count(Termination::StepBudget) > 0 {
            log::warn!(
                "{} rays exhausted the {}-step budget",
                d.count(Termination::StepBudget),
                self.settings.trace.max_steps
            );
        }

        output
    }
}
