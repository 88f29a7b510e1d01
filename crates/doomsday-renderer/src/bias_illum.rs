// bias_illum.rs: per-vertex bias illumination, cached per source and
// interpolated over time

use crate::bias_affect::{AffectionRecord, MAX_BIAS_AFFECTED};
use crate::bias_source::{BiasSourceFlags, SourceRegistry};
use crate::bias_tracker::BiasTracker;
use crate::rend_bias::SightQuery;
use doomsday_common::common::con_error;
use doomsday_common::mathlib::{
    dot_product, lerp_channel, vector_add, vector_normalize, vector_scale, vector_subtract,
    Rgb8, Vec3,
};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IllumFlags: u8 {
        /// Interpolating from `color` towards `dest`.
        const LERP         = 0x1;
        /// Not evaluated yet; the next evaluation recomputes every source.
        const STILL_UNSEEN = 0x2;
    }
}

/// Light cast on a vertex by one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Casted {
    pub source: Option<usize>,
    pub color: Rgb8,
}

/// Lighting state of one polygon vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexIllum {
    /// Color at the start of the current interpolation (or the settled color).
    pub color: Rgb8,
    /// Color being interpolated towards.
    pub dest: Rgb8,
    /// Real time (ms) the interpolation started.
    pub update_time: u32,
    pub flags: IllumFlags,
    casted: [Casted; MAX_BIAS_AFFECTED],
}

impl Default for VertexIllum {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexIllum {
    pub fn new() -> Self {
        Self {
            color: [0; 3],
            dest: [0; 3],
            update_time: 0,
            flags: IllumFlags::STILL_UNSEEN,
            casted: [Casted::default(); MAX_BIAS_AFFECTED],
        }
    }

    pub fn is_unseen(&self) -> bool {
        self.flags.contains(IllumFlags::STILL_UNSEEN)
    }

    /// Force every source to be recomputed on the next evaluation.
    pub fn mark_unseen(&mut self) {
        self.flags |= IllumFlags::STILL_UNSEEN;
    }

    pub fn is_lerping(&self) -> bool {
        self.flags.contains(IllumFlags::LERP)
    }

    /// Cached light from `source`, if any.
    pub fn casted(&self, source: usize) -> Option<Rgb8> {
        self.casted
            .iter()
            .find(|c| c.source == Some(source))
            .map(|c| c.color)
    }

    /// Slot for `source`, claiming an empty one or one whose source no longer
    /// affects the surface. The cache and the affection record have the same
    /// capacity, so running out of slots means the two have desynchronized.
    fn casted_slot(&mut self, source: usize, affected: &AffectionRecord) -> &mut Casted {
        let index = self
            .casted
            .iter()
            .position(|c| c.source == Some(source))
            .or_else(|| self.casted.iter().position(|c| c.source.is_none()))
            .or_else(|| {
                self.casted
                    .iter()
                    .position(|c| c.source.is_some_and(|s| !affected.contains(s)))
            });

        match index {
            Some(i) => {
                let slot = &mut self.casted[i];
                slot.source = Some(source);
                slot
            }
            None => con_error("casted_slot: No light casted by source"),
        }
    }

    // ============================================================
    // Interpolation
    // ============================================================

    /// Color to display at `now`. Repeated calls at the same time return the
    /// same color; `color` is only rewritten once the interpolation ends.
    pub fn lerp(&mut self, now: u32, light_speed: i32) -> Rgb8 {
        if !self.is_lerping() {
            return self.color;
        }

        let inter = if light_speed > 0 {
            now.saturating_sub(self.update_time) as f32 / light_speed as f32
        } else {
            f32::INFINITY
        };

        if inter > 1.0 {
            self.flags.remove(IllumFlags::LERP);
            self.color = self.dest;
            return self.color;
        }

        [
            lerp_channel(self.color[0], self.dest[0], inter),
            lerp_channel(self.color[1], self.dest[1], inter),
            lerp_channel(self.color[2], self.dest[2], inter),
        ]
    }

    /// Start interpolating towards `dest` from `start_time`. An interpolation
    /// already under way continues from the color it has reached at `now`.
    pub fn begin_transition(&mut self, dest: Rgb8, start_time: u32, now: u32, light_speed: i32) {
        if self.is_lerping() {
            self.color = self.lerp(now, light_speed);
        }
        self.dest = dest;
        self.update_time = start_time;
        self.flags |= IllumFlags::LERP;
    }
}

/// Per-polygon inputs to `eval_point`.
pub struct PointEval<'a> {
    pub sources: &'a SourceRegistry,
    /// None when sight checks are disabled.
    pub sight: Option<&'a dyn SightQuery>,
    /// When set, only this source casts light.
    pub solo: Option<usize>,
    pub now: u32,
    pub light_speed: i32,
    /// Fraction of the sector color added on top, 0..1.
    pub bias_amount: f32,
    pub sector_color: Vec3,
}

impl PointEval<'_> {
    fn is_enabled(&self, source: usize) -> bool {
        self.solo.map_or(true, |s| s == source)
    }

    /// Light cast by `source` on `point`, a surface point facing `normal`.
    fn cast(&self, source: usize, point: &Vec3, normal: &Vec3) -> Rgb8 {
        let Some(src) = self.sources.get(source) else {
            return [0; 3];
        };
        if !self.is_enabled(source) {
            return [0; 3];
        }

        let mut delta = vector_subtract(&src.pos, point);
        // Step a little towards the light so the surface itself doesn't block.
        let surface_point = vector_add(point, &vector_scale(&delta, 0.01));
        if let Some(sight) = self.sight {
            if !sight.check_line_sight(&src.pos, &surface_point) {
                return [0; 3];
            }
        }

        let distance = vector_normalize(&mut delta);
        let dot = dot_product(&delta, normal);
        // The surface faces away from the light.
        if dot <= 0.0 || distance <= 0.0 {
            return [0; 3];
        }

        let level = (dot * src.intensity / distance).clamp(0.0, 1.0);
        [
            (255.0 * src.color[0] * level) as u8,
            (255.0 * src.color[1] * level) as u8,
            (255.0 * src.color[2] * level) as u8,
        ]
    }
}

/// How much of the sector color to add for a sector of `light_level`, given
/// the [bias_min, bias_max] band.
pub fn bias_amount(light_level: f32, bias_min: f32, bias_max: f32) -> f32 {
    if light_level > bias_min && bias_max > bias_min {
        ((light_level - bias_min) / (bias_max - bias_min)).min(1.0)
    } else {
        0.0
    }
}

/// Evaluate the bias light on one vertex and return the color to display.
///
/// Only sources marked in `changed` (or not cached yet) are recomputed,
/// unless the vertex is still unseen. Sources consumed from `changed` are
/// marked in `applied`.
pub fn eval_point(
    illum: &mut VertexIllum,
    point: &Vec3,
    normal: &Vec3,
    affected: &AffectionRecord,
    changed: &BiasTracker,
    eval: &PointEval,
    applied: &mut BiasTracker,
) -> Rgb8 {
    let full = illum.is_unseen();
    illum.flags.remove(IllumFlags::STILL_UNSEEN);

    let mut dirty: heapless::Vec<usize, MAX_BIAS_AFFECTED> = heapless::Vec::new();
    let mut latest_update = 0u32;

    for aff in affected.iter() {
        let Some(src) = eval.sources.get(aff.source) else {
            continue;
        };
        let is_changed = changed.is_marked(aff.source);
        if is_changed {
            applied.mark(aff.source);
        }
        if full || is_changed || illum.casted(aff.source).is_none() {
            latest_update = latest_update.max(src.last_update_time);
            // Cannot overflow, affected holds at most as many entries.
            let _ = dirty.push(aff.source);
        }
    }

    if !full && dirty.is_empty() {
        // Nothing new, keep going towards the previous destination.
        return illum.lerp(eval.now, eval.light_speed);
    }

    for &source in dirty.iter() {
        let casted = eval.cast(source, point, normal);
        illum.casted_slot(source, affected).color = casted;
    }

    // Combine the light cast by each affecting source.
    let mut new = [0u32; 3];
    let mut will_override = false;
    for aff in affected.iter() {
        let Some(src) = eval.sources.get(aff.source) else {
            continue;
        };
        let Some(casted) = illum.casted(aff.source) else {
            continue;
        };
        if src.flags.contains(BiasSourceFlags::COLOR_OVERRIDE) && casted != [0; 3] {
            will_override = true;
        }
        for i in 0..3 {
            new[i] = (new[i] + casted[i] as u32).min(255);
        }
    }

    // Sector color bias, unless an overriding light already colors the vertex.
    if eval.bias_amount > 0.0 && !will_override {
        for i in 0..3 {
            let add = (255.0 * eval.sector_color[i] * eval.bias_amount) as u32;
            new[i] = (new[i] + add).min(255);
        }
    }

    let new = [new[0] as u8, new[1] as u8, new[2] as u8];
    if full || new != illum.dest {
        illum.begin_transition(new, latest_update, eval.now, eval.light_speed);
    }

    illum.lerp(eval.now, eval.light_speed)
}
