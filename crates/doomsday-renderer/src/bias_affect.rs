// bias_affect.rs: which sources are bright and close enough to light a surface

use crate::bias_source::SourceRegistry;
use doomsday_common::mathlib::{approx_distance, dot_product, Vec2, Vec3, VX, VY};

/// Most sources that may light one surface. Vertex caches hold the same
/// number of contributions.
pub const MAX_BIAS_AFFECTED: usize = 6;

/// Default cutoff for the approximate intensity of a source at a surface.
pub const BIAS_IGNORE_LIMIT: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affection {
    pub source: usize,
    /// Source intensity divided by the approximate distance to the surface.
    pub intensity: f32,
}

/// The strongest sources affecting one surface, at most N.
#[derive(Debug, Clone, Default)]
pub struct AffectionRecord<const N: usize = MAX_BIAS_AFFECTED> {
    entries: heapless::Vec<Affection, N>,
}

impl<const N: usize> AffectionRecord<N> {
    pub fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Affection> {
        self.entries.iter()
    }

    pub fn contains(&self, source: usize) -> bool {
        self.entries.iter().any(|a| a.source == source)
    }

    /// Insert a candidate. When full, the weakest entry is replaced, but
    /// only if it is weaker than the candidate.
    pub fn add(&mut self, source: usize, intensity: f32) {
        let candidate = Affection { source, intensity };
        if self.entries.push(candidate).is_ok() {
            return;
        }

        let weakest = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, a)| a.intensity < intensity)
            .min_by(|a, b| a.1.intensity.total_cmp(&b.1.intensity))
            .map(|(i, _)| i);

        if let Some(i) = weakest {
            self.entries[i] = candidate;
        }
    }

    /// Scan every source with light to give and keep the strongest.
    pub fn rebuild(&mut self, sources: &SourceRegistry, geometry: AffectGeometry, ignore_limit: f32) {
        self.clear();

        for (k, src) in sources.iter().enumerate() {
            if src.intensity <= 0.0 {
                continue;
            }

            let distance = match geometry {
                AffectGeometry::Wall { from, to, normal } => {
                    let mut distance = f32::MAX;
                    let mut behind = false;
                    for v in [from, to] {
                        let delta = [v[VX] - src.pos[VX], v[VY] - src.pos[VY], 0.0];
                        // The source must be in front of the wall.
                        if dot_product(&delta, &normal) >= 0.0 {
                            behind = true;
                            break;
                        }
                        distance = distance.min(approx_distance(delta[VX], delta[VY]));
                    }
                    if behind {
                        continue;
                    }
                    distance
                }
                AffectGeometry::Plane { vertices } => vertices
                    .iter()
                    .map(|v| approx_distance(v[VX] - src.pos[VX], v[VY] - src.pos[VY]))
                    .fold(f32::MAX, f32::min),
            };

            // Avoid blowing up the estimate right next to the surface.
            let distance = distance.max(1.0);

            let intensity = src.intensity / distance;
            if intensity < ignore_limit {
                continue;
            }
            self.add(k, intensity);
        }
    }
}

/// Surface geometry as far as affection is concerned.
#[derive(Debug, Clone, Copy)]
pub enum AffectGeometry<'a> {
    /// A wall segment: its two endpoints and front-facing normal. Sources
    /// behind the wall are ignored.
    Wall { from: Vec2, to: Vec2, normal: Vec3 },
    /// A sector plane given by the subsector's boundary vertices.
    Plane { vertices: &'a [Vec2] },
}

/// Lazily refreshed affection state of a surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceAffection {
    pub record: AffectionRecord,
    /// Geometry-change frame this record was built for; None until the
    /// first update.
    pub updated_on_frame: Option<u32>,
}

impl SurfaceAffection {
    pub fn is_current(&self, change_frame: u32) -> bool {
        self.updated_on_frame == Some(change_frame)
    }

    /// Rebuild the record unless it is already current for `change_frame`.
    pub fn update(
        &mut self,
        change_frame: u32,
        sources: &SourceRegistry,
        geometry: AffectGeometry,
        ignore_limit: f32,
    ) {
        if self.is_current(change_frame) {
            return;
        }
        self.record.rebuild(sources, geometry, ignore_limit);
        self.updated_on_frame = Some(change_frame);
    }
}
