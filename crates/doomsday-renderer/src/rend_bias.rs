// rend_bias.rs: shadow bias lighting, frame sequencing and surface lighting
//
// Once per frame `begin_frame` collects the sources that changed and marks
// every wall and plane tracker. While the frame's polygons are built,
// `light_seg_section` and `light_plane` bring the surface's affection record
// up to date and evaluate each vertex.

use crate::bias_affect::{AffectGeometry, AffectionRecord, SurfaceAffection, BIAS_IGNORE_LIMIT};
use crate::bias_illum::{bias_amount, eval_point, PointEval, VertexIllum};
use crate::bias_source::{BiasSourceFlags, SourceRegistry, MAX_BIAS_LIGHTS};
use crate::bias_tracker::BiasTracker;
use doomsday_common::common::{con_dprintf, con_printf};
use doomsday_common::cvar::{CvarContext, CvarFlags};
use doomsday_common::ded::DedLight;
use doomsday_common::mathlib::{line_normal, Rgb8, Vec2, Vec3, VX, VY};

// ============================================================
// Configuration
// ============================================================

/// Snapshot of the bias lighting cvars.
#[derive(Debug, Clone, PartialEq)]
pub struct BiasConfig {
    pub enabled: bool,
    pub bias_min: f32,
    pub bias_max: f32,
    /// Interpolation duration in milliseconds.
    pub light_speed: i32,
    pub sight: bool,
    pub update_affected: bool,
    pub ignore_limit: f32,
    pub solo: Option<usize>,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bias_min: 220.0,
            bias_max: 255.0,
            light_speed: 130,
            sight: true,
            update_affected: true,
            ignore_limit: BIAS_IGNORE_LIMIT,
            solo: None,
        }
    }
}

impl BiasConfig {
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        let solo = cvars.variable_integer("rend-dev-bias-solo");
        Self {
            enabled: cvars.variable_integer("rend-bias") != 0,
            bias_min: cvars.variable_value("rend-bias-min"),
            bias_max: cvars.variable_value("rend-bias-max"),
            light_speed: cvars.variable_integer("rend-bias-lightspeed"),
            sight: cvars.variable_integer("rend-dev-bias-sight") != 0,
            update_affected: cvars.variable_integer("rend-dev-bias-affected") != 0,
            ignore_limit: cvars.variable_value("rend-dev-bias-ignore"),
            solo: usize::try_from(solo).ok(),
        }
    }
}

pub fn register_cvars(cvars: &mut CvarContext) {
    let none = CvarFlags::empty();
    cvars.register("rend-bias", 1.0, none, 0.0, 1.0);
    cvars.register("rend-bias-min", 220.0, none, 0.0, 255.0);
    cvars.register("rend-bias-max", 255.0, none, 0.0, 255.0);
    cvars.register("rend-bias-lightspeed", 130.0, none, 0.0, 5000.0);
    cvars.register("rend-dev-bias-sight", 1.0, CvarFlags::NO_ARCHIVE, 0.0, 1.0);
    cvars.register("rend-dev-bias-affected", 1.0, CvarFlags::NO_ARCHIVE, 0.0, 1.0);
    cvars.register("rend-dev-bias-ignore", BIAS_IGNORE_LIMIT, CvarFlags::NO_ARCHIVE, 0.0, 1.0);
    cvars.register(
        "rend-dev-bias-solo",
        -1.0,
        CvarFlags::NO_ARCHIVE,
        -1.0,
        (MAX_BIAS_LIGHTS - 1) as f32,
    );
}

// ============================================================
// Collaborators
// ============================================================

/// Light of a sector as seen by the bias engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorLight {
    /// 0..255
    pub level: f32,
    pub color: Vec3,
}

pub trait SectorQuery {
    /// Light of the sector containing the map point (x, y).
    fn sector_light_at(&self, x: f32, y: f32) -> Option<SectorLight>;
}

pub trait SightQuery {
    /// True if nothing blocks the line between the two points.
    fn check_line_sight(&self, from: &Vec3, to: &Vec3) -> bool;
}

// ============================================================
// Bias-lit geometry
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegSection {
    Top,
    Middle,
    Bottom,
}

impl SegSection {
    fn index(self) -> usize {
        match self {
            SegSection::Top => 0,
            SegSection::Middle => 1,
            SegSection::Bottom => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Floor,
    Ceiling,
}

impl PlaneKind {
    fn index(self) -> usize {
        match self {
            PlaneKind::Floor => 0,
            PlaneKind::Ceiling => 1,
        }
    }

    pub fn normal(self) -> Vec3 {
        match self {
            PlaneKind::Floor => [0.0, 0.0, 1.0],
            PlaneKind::Ceiling => [0.0, 0.0, -1.0],
        }
    }
}

/// One lit polygon: its pending source changes and per-vertex lighting.
#[derive(Debug, Clone)]
pub struct BiasSurface {
    pub tracker: BiasTracker,
    pub illum: Vec<VertexIllum>,
}

impl BiasSurface {
    pub fn new(num_vertices: usize) -> Self {
        Self {
            tracker: BiasTracker::new(),
            illum: vec![VertexIllum::new(); num_vertices],
        }
    }

    pub fn mark_unseen(&mut self) {
        for illum in self.illum.iter_mut() {
            illum.mark_unseen();
        }
    }
}

/// A wall segment: top, middle and bottom sections of four vertices each.
#[derive(Debug, Clone)]
pub struct BiasSeg {
    pub from: Vec2,
    pub to: Vec2,
    pub normal: Vec3,
    pub affected: SurfaceAffection,
    pub sections: [BiasSurface; 3],
}

impl BiasSeg {
    pub fn new(from: Vec2, to: Vec2) -> Self {
        Self {
            from,
            to,
            normal: line_normal(&from, &to),
            affected: SurfaceAffection::default(),
            sections: [BiasSurface::new(4), BiasSurface::new(4), BiasSurface::new(4)],
        }
    }

    pub fn section(&self, section: SegSection) -> &BiasSurface {
        &self.sections[section.index()]
    }

    pub fn section_mut(&mut self, section: SegSection) -> &mut BiasSurface {
        &mut self.sections[section.index()]
    }

    fn geometry(&self) -> AffectGeometry<'static> {
        AffectGeometry::Wall {
            from: self.from,
            to: self.to,
            normal: self.normal,
        }
    }

    fn mark_unseen(&mut self) {
        for section in self.sections.iter_mut() {
            section.mark_unseen();
        }
    }
}

/// A subsector: a convex floor and ceiling polygon.
#[derive(Debug, Clone)]
pub struct BiasSubsector {
    pub vertices: Vec<Vec2>,
    pub midpoint: Vec2,
    pub floor_height: f32,
    pub ceiling_height: f32,
    pub affected: SurfaceAffection,
    pub planes: [BiasSurface; 2],
}

impl BiasSubsector {
    pub fn new(vertices: Vec<Vec2>, floor_height: f32, ceiling_height: f32) -> Self {
        let mut midpoint = [0.0; 2];
        if !vertices.is_empty() {
            for v in vertices.iter() {
                midpoint[VX] += v[VX];
                midpoint[VY] += v[VY];
            }
            midpoint[VX] /= vertices.len() as f32;
            midpoint[VY] /= vertices.len() as f32;
        }
        let n = vertices.len();
        Self {
            vertices,
            midpoint,
            floor_height,
            ceiling_height,
            affected: SurfaceAffection::default(),
            planes: [BiasSurface::new(n), BiasSurface::new(n)],
        }
    }

    pub fn plane(&self, kind: PlaneKind) -> &BiasSurface {
        &self.planes[kind.index()]
    }

    pub fn plane_mut(&mut self, kind: PlaneKind) -> &mut BiasSurface {
        &mut self.planes[kind.index()]
    }

    pub fn height(&self, kind: PlaneKind) -> f32 {
        match kind {
            PlaneKind::Floor => self.floor_height,
            PlaneKind::Ceiling => self.ceiling_height,
        }
    }

    fn mark_unseen(&mut self) {
        for plane in self.planes.iter_mut() {
            plane.mark_unseen();
        }
    }
}

/// All bias-lit surfaces of the current level.
#[derive(Debug, Clone, Default)]
pub struct BiasWorld {
    pub segs: Vec<BiasSeg>,
    pub subsectors: Vec<BiasSubsector>,
}

// ============================================================
// Frame state
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct BiasFrame {
    /// Real time (ms) of the frame being built.
    pub current_time: u32,
    /// Bumped whenever a source or surface moves; affection records built on
    /// an older value are rebuilt.
    pub last_change_on_frame: u32,
    /// Sources that changed at the start of this frame.
    pub all_changes: BiasTracker,
}

impl BiasFrame {
    fn geometry_changed(&mut self) {
        self.last_change_on_frame = self.last_change_on_frame.wrapping_add(1);
    }
}

/// Everything the bias engine needs for one level.
#[derive(Debug, Clone, Default)]
pub struct BiasContext {
    pub config: BiasConfig,
    pub sources: SourceRegistry,
    pub world: BiasWorld,
    pub frame: BiasFrame,
    /// Unique id of the current level, e.g. "doom2-map01".
    pub level_id: String,
    /// Game mode the level belongs to, e.g. "doom2".
    pub game_mode: String,
}

impl BiasContext {
    pub fn new(config: BiasConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set up for a freshly loaded level. Sources come from the light
    /// definitions belonging to `level_id`; returns how many were added.
    pub fn init_for_level(
        &mut self,
        level_id: &str,
        game_mode: &str,
        world: BiasWorld,
        defs: &[DedLight],
    ) -> usize {
        self.clear_level();
        self.level_id = level_id.to_string();
        self.game_mode = game_mode.to_string();
        self.world = world;

        let added = self.sources.load_level(level_id, defs);
        con_dprintf(&format!("{} bias lights for {}\n", added, level_id));
        added
    }

    /// Drop all sources and geometry of the current level.
    pub fn clear_level(&mut self) {
        self.sources.reset();
        self.world = BiasWorld::default();
        self.frame = BiasFrame::default();
    }

    /// Detect source changes and mark the trackers of every surface. Must run
    /// once per frame before any surface is lit.
    pub fn begin_frame(&mut self, now: u32, sectors: &dyn SectorQuery) {
        if !self.config.enabled {
            return;
        }
        self.frame.current_time = now;

        // Sector-driven intensities follow the sector light level.
        for src in self.sources.iter_mut() {
            if !src.is_sector_driven() {
                continue;
            }
            let Some(sector) = sectors.sector_light_at(src.pos[VX], src.pos[VY]) else {
                continue;
            };
            if src.apply_sector_level(sector.level) {
                src.flags |= BiasSourceFlags::CHANGED;
            }
        }

        let mut all_changes = BiasTracker::new();
        for (i, src) in self.sources.iter_mut().enumerate() {
            if !src.flags.contains(BiasSourceFlags::CHANGED) {
                continue;
            }
            all_changes.mark(i);
            src.flags.remove(BiasSourceFlags::CHANGED);
            src.last_update_time = now;
        }

        // Slots emptied by deletes; their cached light must go too.
        all_changes.apply(&self.sources.take_vacated());
        let restructured = self.sources.take_restructured();

        if restructured || !all_changes.is_empty() {
            self.frame.geometry_changed();
        }

        for seg in self.world.segs.iter_mut() {
            for section in seg.sections.iter_mut() {
                section.tracker.apply(&all_changes);
            }
            if affected_by(&seg.affected.record, &all_changes) {
                seg.mark_unseen();
            }
        }

        for sub in self.world.subsectors.iter_mut() {
            for plane in sub.planes.iter_mut() {
                plane.tracker.apply(&all_changes);
            }
            if affected_by(&sub.affected.record, &all_changes) {
                sub.mark_unseen();
            }
        }

        self.frame.all_changes = all_changes;
    }

    /// Bring the affection record of the seg up to date.
    pub fn update_seg_affected(&mut self, seg: usize) {
        if !self.config.update_affected {
            return;
        }
        let Some(s) = self.world.segs.get_mut(seg) else {
            return;
        };
        let geometry = s.geometry();
        s.affected.update(
            self.frame.last_change_on_frame,
            &self.sources,
            geometry,
            self.config.ignore_limit,
        );
    }

    /// Bring the affection record of the subsector's planes up to date.
    pub fn update_subsector_affected(&mut self, subsector: usize) {
        if !self.config.update_affected {
            return;
        }
        let Some(sub) = self.world.subsectors.get_mut(subsector) else {
            return;
        };
        sub.affected.update(
            self.frame.last_change_on_frame,
            &self.sources,
            AffectGeometry::Plane {
                vertices: &sub.vertices,
            },
            self.config.ignore_limit,
        );
    }

    /// Light one wall section. `points` are the polygon's vertices in the
    /// order of the section's illumination slots; the resulting colors go to
    /// `out`. Nothing is written while bias lighting is disabled.
    pub fn light_seg_section(
        &mut self,
        seg: usize,
        section: SegSection,
        points: &[Vec3],
        sector: &SectorLight,
        sight: &dyn SightQuery,
        out: &mut [Rgb8],
    ) {
        if !self.config.enabled {
            return;
        }
        self.update_seg_affected(seg);

        let Some(s) = self.world.segs.get_mut(seg) else {
            return;
        };
        let normal = s.normal;
        let eval = point_eval(&self.config, &self.frame, &self.sources, sector, sight);
        let surface = &mut s.sections[section.index()];
        light_poly(surface, &s.affected.record, points, &normal, &eval, out);
    }

    /// Light the floor or ceiling of a subsector, one color per boundary
    /// vertex. Nothing is written while bias lighting is disabled.
    pub fn light_plane(
        &mut self,
        subsector: usize,
        kind: PlaneKind,
        sector: &SectorLight,
        sight: &dyn SightQuery,
        out: &mut [Rgb8],
    ) {
        if !self.config.enabled {
            return;
        }
        self.update_subsector_affected(subsector);

        let Some(sub) = self.world.subsectors.get_mut(subsector) else {
            return;
        };
        let height = sub.height(kind);
        let points: Vec<Vec3> = sub.vertices.iter().map(|v| [v[VX], v[VY], height]).collect();
        let eval = point_eval(&self.config, &self.frame, &self.sources, sector, sight);
        let surface = &mut sub.planes[kind.index()];
        light_poly(surface, &sub.affected.record, &points, &kind.normal(), &eval, out);
    }

    /// A seg's endpoints changed (e.g. a moving polyobject).
    pub fn seg_moved(&mut self, seg: usize, from: Vec2, to: Vec2) {
        let Some(s) = self.world.segs.get_mut(seg) else {
            con_printf(&format!("seg_moved: no seg {}\n", seg));
            return;
        };
        s.from = from;
        s.to = to;
        s.normal = line_normal(&from, &to);
        s.mark_unseen();
        self.frame.geometry_changed();
    }

    /// A floor or ceiling changed height.
    pub fn plane_moved(&mut self, subsector: usize, kind: PlaneKind, height: f32) {
        let Some(sub) = self.world.subsectors.get_mut(subsector) else {
            con_printf(&format!("plane_moved: no subsector {}\n", subsector));
            return;
        };
        match kind {
            PlaneKind::Floor => sub.floor_height = height,
            PlaneKind::Ceiling => sub.ceiling_height = height,
        }
        sub.plane_mut(kind).mark_unseen();
        self.frame.geometry_changed();
    }
}

fn affected_by(record: &AffectionRecord, changes: &BiasTracker) -> bool {
    record.iter().any(|a| changes.is_marked(a.source))
}

fn point_eval<'a>(
    config: &BiasConfig,
    frame: &BiasFrame,
    sources: &'a SourceRegistry,
    sector: &SectorLight,
    sight: &'a dyn SightQuery,
) -> PointEval<'a> {
    PointEval {
        sources,
        sight: config.sight.then_some(sight),
        solo: config.solo,
        now: frame.current_time,
        light_speed: config.light_speed,
        bias_amount: bias_amount(sector.level, config.bias_min, config.bias_max),
        sector_color: sector.color,
    }
}

/// Evaluate every vertex of one polygon, then drop the changes that were
/// folded in from the surface's tracker.
fn light_poly(
    surface: &mut BiasSurface,
    affected: &AffectionRecord,
    points: &[Vec3],
    normal: &Vec3,
    eval: &PointEval,
    out: &mut [Rgb8],
) {
    let changed = surface.tracker;
    let mut applied = BiasTracker::new();

    for ((illum, point), color) in surface.illum.iter_mut().zip(points).zip(out.iter_mut()) {
        *color = eval_point(illum, point, normal, affected, &changed, eval, &mut applied);
    }

    surface.tracker.clear(&applied);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatSector(f32);
    impl SectorQuery for FlatSector {
        fn sector_light_at(&self, _x: f32, _y: f32) -> Option<SectorLight> {
            Some(SectorLight {
                level: self.0,
                color: [1.0; 3],
            })
        }
    }

    struct NoSector;
    impl SectorQuery for NoSector {
        fn sector_light_at(&self, _x: f32, _y: f32) -> Option<SectorLight> {
            None
        }
    }

    struct Clear;
    impl SightQuery for Clear {
        fn check_line_sight(&self, _from: &Vec3, _to: &Vec3) -> bool {
            true
        }
    }

    const DARK: SectorLight = SectorLight {
        level: 0.0,
        color: [1.0; 3],
    };

    /// One wall and two 64x64 subsectors too far apart to share light.
    fn world() -> BiasWorld {
        BiasWorld {
            segs: vec![BiasSeg::new([0.0, 64.0], [0.0, 0.0])],
            subsectors: vec![
                BiasSubsector::new(
                    vec![[0.0, 0.0], [64.0, 0.0], [64.0, 64.0], [0.0, 64.0]],
                    0.0,
                    128.0,
                ),
                BiasSubsector::new(
                    vec![[50000.0, 0.0], [50064.0, 0.0], [50064.0, 64.0], [50000.0, 64.0]],
                    0.0,
                    128.0,
                ),
            ],
        }
    }

    fn context() -> BiasContext {
        let mut ctx = BiasContext::new(BiasConfig::default());
        ctx.world = world();
        ctx
    }

    fn light_floor(ctx: &mut BiasContext, subsector: usize) -> Vec<Rgb8> {
        let mut out = vec![[0u8; 3]; 4];
        ctx.light_plane(subsector, PlaneKind::Floor, &DARK, &Clear, &mut out);
        out
    }

    #[test]
    fn test_config_from_cvars() {
        let mut cvars = CvarContext::new();
        register_cvars(&mut cvars);
        assert_eq!(BiasConfig::from_cvars(&cvars), BiasConfig::default());

        cvars.set("rend-dev-bias-solo", "4");
        cvars.set("rend-bias-lightspeed", "99999");
        cvars.set("rend-bias", "0");
        let config = BiasConfig::from_cvars(&cvars);
        assert_eq!(config.solo, Some(4));
        assert_eq!(config.light_speed, 5000);
        assert!(!config.enabled);
    }

    #[test]
    fn test_seg_normal_faces_right() {
        let seg = BiasSeg::new([0.0, 64.0], [0.0, 0.0]);
        assert_eq!(seg.normal, [-1.0, 0.0, 0.0]);
        let sub = BiasSubsector::new(vec![[0.0, 0.0], [64.0, 0.0], [64.0, 64.0], [0.0, 64.0]], 0.0, 1.0);
        assert_eq!(sub.midpoint, [32.0, 32.0]);
        assert_eq!(sub.plane(PlaneKind::Ceiling).illum.len(), 4);
    }

    #[test]
    fn test_begin_frame_collects_changes() {
        let mut ctx = context();
        ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.sources.get_mut(1).unwrap().flags.remove(BiasSourceFlags::CHANGED);
        ctx.sources.take_restructured();

        let before = ctx.frame.last_change_on_frame;
        ctx.begin_frame(500, &NoSector);

        assert_eq!(ctx.frame.current_time, 500);
        assert_eq!(ctx.frame.all_changes.iter().collect::<Vec<_>>(), vec![0]);
        assert!(ctx.frame.last_change_on_frame > before);
        let src = ctx.sources.get(0).unwrap();
        assert!(!src.flags.contains(BiasSourceFlags::CHANGED));
        assert_eq!(src.last_update_time, 500);
        assert!(ctx.world.segs[0].section(SegSection::Middle).tracker.is_marked(0));
        assert!(ctx.world.subsectors[1].plane(PlaneKind::Floor).tracker.is_marked(0));

        // Nothing new next frame.
        let stamp = ctx.frame.last_change_on_frame;
        ctx.begin_frame(600, &NoSector);
        assert!(ctx.frame.all_changes.is_empty());
        assert_eq!(ctx.frame.last_change_on_frame, stamp);
    }

    #[test]
    fn test_disabled_does_nothing() {
        let mut ctx = context();
        ctx.config.enabled = false;
        ctx.sources.create().unwrap();
        ctx.begin_frame(500, &NoSector);
        assert_eq!(ctx.frame.current_time, 0);
        assert!(ctx.sources.get(0).unwrap().flags.contains(BiasSourceFlags::CHANGED));

        let mut out = vec![[7u8; 3]; 4];
        ctx.light_plane(0, PlaneKind::Floor, &DARK, &Clear, &mut out);
        assert_eq!(out, vec![[7u8; 3]; 4]);
    }

    #[test]
    fn test_sector_driven_intensity() {
        let mut ctx = context();
        ctx.sources.create_at([32.0, 32.0, 64.0], 80.0, [100.0, 200.0], &[1.0; 3]).unwrap();
        ctx.begin_frame(10, &FlatSector(150.0));
        assert_eq!(ctx.sources.get(0).unwrap().intensity, 40.0);

        // Same level: no change reported.
        ctx.begin_frame(20, &FlatSector(150.0));
        assert!(ctx.frame.all_changes.is_empty());

        ctx.begin_frame(30, &FlatSector(250.0));
        assert_eq!(ctx.sources.get(0).unwrap().intensity, 80.0);
        assert!(ctx.frame.all_changes.is_marked(0));

        // Sector unknown: intensity left alone.
        ctx.begin_frame(40, &NoSector);
        assert_eq!(ctx.sources.get(0).unwrap().intensity, 80.0);
        assert!(ctx.frame.all_changes.is_empty());
    }

    #[test]
    fn test_change_isolated_to_affected_surfaces() {
        let mut ctx = context();
        ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.sources.create_at([50032.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.begin_frame(0, &NoSector);
        light_floor(&mut ctx, 0);
        light_floor(&mut ctx, 1);

        assert!(ctx.world.subsectors[0].affected.record.contains(0));
        assert!(!ctx.world.subsectors[0].affected.record.contains(1));
        assert!(!ctx.world.subsectors[0].plane(PlaneKind::Floor).illum[0].is_unseen());

        // Only the far source changes.
        ctx.sources.get_mut(1).unwrap().flags |= BiasSourceFlags::CHANGED;
        ctx.begin_frame(1000, &NoSector);

        let near = &ctx.world.subsectors[0];
        assert!(near.plane(PlaneKind::Floor).illum.iter().all(|i| !i.is_unseen()));
        let far = &ctx.world.subsectors[1];
        assert!(far.plane(PlaneKind::Floor).illum.iter().all(|i| i.is_unseen()));
    }

    #[test]
    fn test_light_plane_consumes_tracker() {
        let mut ctx = context();
        ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.begin_frame(1000, &NoSector);
        assert!(ctx.world.subsectors[0].plane(PlaneKind::Floor).tracker.is_marked(0));

        let first = light_floor(&mut ctx, 0);
        // Transition starts at the source's update time: still black.
        assert_eq!(first, vec![[0u8; 3]; 4]);
        let floor = ctx.world.subsectors[0].plane(PlaneKind::Floor);
        assert!(!floor.tracker.is_marked(0));
        assert!(floor.illum.iter().all(|i| i.is_lerping() && i.dest != [0; 3]));
        // The ceiling was not lit, its bit stays pending.
        assert!(ctx.world.subsectors[0].plane(PlaneKind::Ceiling).tracker.is_marked(0));

        // After the interpolation time everything has settled.
        ctx.begin_frame(1000 + 131, &NoSector);
        let settled = light_floor(&mut ctx, 0);
        let floor = ctx.world.subsectors[0].plane(PlaneKind::Floor);
        for (color, illum) in settled.iter().zip(floor.illum.iter()) {
            assert_eq!(*color, illum.dest);
            assert!(!illum.is_lerping());
        }
    }

    #[test]
    fn test_light_seg_section() {
        let mut ctx = context();
        // In front of the wall (it faces -x).
        ctx.sources.create_at([-32.0, 32.0, 32.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.begin_frame(0, &NoSector);

        let points = [[0.0, 64.0, 64.0], [0.0, 0.0, 64.0], [0.0, 0.0, 0.0], [0.0, 64.0, 0.0]];
        let mut out = [[0u8; 3]; 4];
        ctx.light_seg_section(0, SegSection::Middle, &points, &DARK, &Clear, &mut out);

        let seg = &ctx.world.segs[0];
        assert!(seg.affected.record.contains(0));
        let middle = seg.section(SegSection::Middle);
        assert!(middle.illum.iter().all(|i| !i.is_unseen() && i.dest != [0; 3]));
        assert!(seg.section(SegSection::Top).illum.iter().all(|i| i.is_unseen()));
    }

    #[test]
    fn test_delete_invalidates_vacated_slot() {
        let mut ctx = context();
        for _ in 0..3 {
            ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        }
        ctx.begin_frame(0, &NoSector);
        light_floor(&mut ctx, 0);
        let stamp = ctx.frame.last_change_on_frame;

        ctx.sources.delete(0).unwrap();
        ctx.begin_frame(100, &NoSector);
        // Shifted sources plus the slot that fell off the end.
        assert_eq!(ctx.frame.all_changes.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(ctx.frame.last_change_on_frame != stamp);

        light_floor(&mut ctx, 0);
        let sub = &ctx.world.subsectors[0];
        assert_eq!(sub.affected.record.len(), 2);
        assert!(!sub.affected.record.contains(2));
    }

    /// A floor fully lit by one source overhead.
    fn lit_floor() -> BiasContext {
        let mut ctx = context();
        ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.begin_frame(0, &NoSector);
        light_floor(&mut ctx, 0);
        ctx.begin_frame(131, &NoSector);
        assert_eq!(light_floor(&mut ctx, 0), vec![[255u8; 3]; 4]);
        ctx
    }

    fn assert_floor_goes_dark(ctx: &mut BiasContext) {
        ctx.begin_frame(2000, &NoSector);
        light_floor(ctx, 0);
        ctx.begin_frame(2131, &NoSector);
        assert_eq!(light_floor(ctx, 0), vec![[0u8; 3]; 4]);
        let sub = &ctx.world.subsectors[0];
        assert_eq!(sub.affected.record.len(), 0);
        assert!(sub.plane(PlaneKind::Floor).illum.iter().all(|i| i.dest == [0; 3]));
    }

    #[test]
    fn test_floor_goes_dark_when_source_dims_to_zero() {
        let mut ctx = lit_floor();
        let src = ctx.sources.get_mut(0).unwrap();
        src.intensity = 0.0;
        src.flags.insert(BiasSourceFlags::CHANGED);
        assert_floor_goes_dark(&mut ctx);
    }

    #[test]
    fn test_floor_goes_dark_when_source_deleted() {
        let mut ctx = lit_floor();
        ctx.sources.delete(0).unwrap();
        assert_floor_goes_dark(&mut ctx);
    }

    #[test]
    fn test_floor_goes_dark_when_source_moves_away() {
        let mut ctx = lit_floor();
        let src = ctx.sources.get_mut(0).unwrap();
        src.pos = [90000.0, 32.0, 64.0];
        src.flags.insert(BiasSourceFlags::CHANGED);
        assert_floor_goes_dark(&mut ctx);
    }

    #[test]
    fn test_sourceless_floor_gets_sector_color() {
        let mut ctx = context();
        let red = SectorLight {
            level: 255.0,
            color: [1.0, 0.0, 0.0],
        };
        let mut out = vec![[0u8; 3]; 4];
        ctx.begin_frame(0, &NoSector);
        ctx.light_plane(0, PlaneKind::Floor, &red, &Clear, &mut out);
        ctx.begin_frame(131, &NoSector);
        ctx.light_plane(0, PlaneKind::Floor, &red, &Clear, &mut out);

        assert_eq!(out, vec![[255u8, 0, 0]; 4]);
        let sub = &ctx.world.subsectors[0];
        assert_eq!(sub.affected.record.len(), 0);
        assert!(sub.plane(PlaneKind::Floor).illum.iter().all(|i| i.dest == [255, 0, 0]));
    }

    #[test]
    fn test_plane_moved_forces_reevaluation() {
        let mut ctx = context();
        ctx.sources.create_at([32.0, 32.0, 64.0], 100.0, [0.0; 2], &[1.0; 3]).unwrap();
        ctx.begin_frame(0, &NoSector);
        light_floor(&mut ctx, 0);
        let stamp = ctx.frame.last_change_on_frame;

        ctx.plane_moved(0, PlaneKind::Floor, 32.0);
        let sub = &ctx.world.subsectors[0];
        assert_eq!(sub.floor_height, 32.0);
        assert!(sub.plane(PlaneKind::Floor).illum.iter().all(|i| i.is_unseen()));
        assert!(!sub.affected.is_current(ctx.frame.last_change_on_frame));
        assert_ne!(ctx.frame.last_change_on_frame, stamp);

        ctx.seg_moved(0, [0.0, 0.0], [64.0, 0.0]);
        assert_eq!(ctx.world.segs[0].normal, [0.0, -1.0, 0.0]);
        assert!(ctx.world.segs[0].section(SegSection::Bottom).illum[0].is_unseen());
    }

    #[test]
    fn test_init_for_level() {
        let mut ctx = BiasContext::new(BiasConfig::default());
        ctx.sources.create().unwrap();
        let old = ctx.sources.get(0).unwrap().id;
        let defs = vec![
            DedLight {
                level: "doom2-map01".to_string(),
                ..DedLight::default()
            },
            DedLight {
                level: "doom2-map02".to_string(),
                ..DedLight::default()
            },
        ];
        let added = ctx.init_for_level("doom2-map01", "doom2", world(), &defs);
        assert_eq!(added, 1);
        assert_eq!(ctx.sources.count(), 1);
        assert!(ctx.sources.get(0).unwrap().is_locked());
        assert_eq!(ctx.level_id, "doom2-map01");
        assert_eq!(ctx.game_mode, "doom2");
        assert_eq!(ctx.world.subsectors.len(), 2);
        // Ids from the previous level no longer resolve.
        assert_eq!(ctx.sources.index_of(old), None);
        assert_ne!(ctx.sources.get(0).unwrap().id, old);
    }
}
