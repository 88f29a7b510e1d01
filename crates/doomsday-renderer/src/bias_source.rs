// bias_source.rs: the bias light sources of the current level

use crate::bias_tracker::BiasTracker;
use crate::error::BiasError;
use doomsday_common::common::con_printf;
use doomsday_common::ded::DedLight;
use doomsday_common::mathlib::{vector_distance, Vec3};

/// Hard upper bound on the number of bias sources in a level. Each source
/// owns one bit in every `BiasTracker`.
pub const MAX_BIAS_LIGHTS: usize = 96;

/// Intensity given to sources created from the editor.
pub const DEFAULT_SOURCE_INTENSITY: f32 = 200.0;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BiasSourceFlags: u32 {
        /// Light from this source replaces the sector bias color.
        const COLOR_OVERRIDE = 0x1;
        /// The editor hand does not move this source.
        const LOCKED         = 0x2;
        /// Changed since the last frame began.
        const CHANGED        = 0x4;
    }
}

/// Identity of a source that survives deletes of other sources, unlike its
/// index in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

#[derive(Debug, Clone, PartialEq)]
pub struct BiasSource {
    pub id: SourceId,
    pub pos: Vec3,
    /// Normalized so the brightest channel is 1.
    pub color: Vec3,
    pub intensity: f32,
    pub primary_intensity: f32,
    /// [min, max] sector light levels; either above zero makes the
    /// intensity follow the light level of the sector around the source.
    pub sector_level: [f32; 2],
    pub flags: BiasSourceFlags,
    /// Real time (ms) of the last change, the start of interpolations.
    pub last_update_time: u32,
}

impl BiasSource {
    fn new(id: SourceId, pos: Vec3, size: f32, sector_level: [f32; 2], rgb: &Vec3) -> Self {
        let mut src = Self {
            id,
            pos,
            color: [1.0; 3],
            intensity: size,
            primary_intensity: size,
            sector_level,
            flags: BiasSourceFlags::empty(),
            last_update_time: 0,
        };
        src.set_color(rgb);
        src
    }

    /// Amplify `rgb` so the brightest channel is at full scale. Black
    /// becomes white.
    pub fn set_color(&mut self, rgb: &Vec3) {
        let largest = rgb.iter().cloned().fold(0.0f32, f32::max);
        if largest > 0.0 {
            self.color = [rgb[0] / largest, rgb[1] / largest, rgb[2] / largest];
        } else {
            self.color = [1.0; 3];
        }
    }

    pub fn is_locked(&self) -> bool {
        self.flags.contains(BiasSourceFlags::LOCKED)
    }

    pub fn is_sector_driven(&self) -> bool {
        self.sector_level[0] > 0.0 || self.sector_level[1] > 0.0
    }

    /// Recompute the intensity from the light level of the sector the
    /// source is in. Returns true if the intensity changed.
    pub fn apply_sector_level(&mut self, light_level: f32) -> bool {
        let [min_level, max_level] = self.sector_level;
        let old = self.intensity;

        self.intensity = if light_level >= max_level {
            self.primary_intensity
        } else if light_level >= min_level && max_level > min_level {
            self.primary_intensity * (light_level - min_level) / (max_level - min_level)
        } else {
            0.0
        };

        self.intensity != old
    }

    pub fn to_definition(&self, level: &str) -> DedLight {
        DedLight {
            level: level.to_string(),
            offset: self.pos,
            color: self.color,
            size: self.primary_intensity,
            light_levels: self.sector_level,
        }
    }
}

/// Fixed-capacity, insertion-ordered set of sources. A source's index is its
/// bit position in every tracker; deleting compacts the sequence.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: heapless::Vec<BiasSource, MAX_BIAS_LIGHTS>,
    next_id: u32,
    /// Slots emptied by deletes since the last frame began.
    vacated: BiasTracker,
    /// The number or order of sources changed since the last frame began.
    restructured: bool,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sources.is_full()
    }

    pub fn get(&self, index: usize) -> Option<&BiasSource> {
        self.sources.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BiasSource> {
        self.sources.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BiasSource> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, BiasSource> {
        self.sources.iter_mut()
    }

    pub fn index_of(&self, id: SourceId) -> Option<usize> {
        self.sources.iter().position(|s| s.id == id)
    }

    /// Validate `index`, for commands taking a light number.
    pub fn check_index(&self, index: usize) -> Result<(), BiasError> {
        if index >= self.sources.len() {
            return Err(BiasError::InvalidIndex {
                index,
                count: self.sources.len(),
            });
        }
        Ok(())
    }

    /// Index of the source closest to `point`.
    pub fn nearest(&self, point: &Vec3) -> Option<usize> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| (i, vector_distance(&s.pos, point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn alloc_id(&mut self) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn push(&mut self, src: BiasSource) -> Result<usize, BiasError> {
        let index = self.sources.len();
        self.sources.push(src).map_err(|_| BiasError::CapacityExceeded {
            capacity: MAX_BIAS_LIGHTS,
        })?;
        self.restructured = true;
        Ok(index)
    }

    /// Append a source described by a level light definition. Level lights
    /// start out locked.
    pub fn add_from_definition(&mut self, def: &DedLight) -> Result<usize, BiasError> {
        if self.is_full() {
            return Err(BiasError::CapacityExceeded {
                capacity: MAX_BIAS_LIGHTS,
            });
        }
        let id = self.alloc_id();
        let mut src = BiasSource::new(id, def.offset, def.size, def.light_levels, &def.color);
        src.flags = BiasSourceFlags::CHANGED | BiasSourceFlags::LOCKED;
        self.push(src)
    }

    /// Append an unlocked, color-overriding source.
    pub fn create_at(
        &mut self,
        pos: Vec3,
        size: f32,
        sector_level: [f32; 2],
        rgb: &Vec3,
    ) -> Result<usize, BiasError> {
        if self.is_full() {
            return Err(BiasError::CapacityExceeded {
                capacity: MAX_BIAS_LIGHTS,
            });
        }
        let id = self.alloc_id();
        let mut src = BiasSource::new(id, pos, size, sector_level, rgb);
        // Changed so the next frame picks it up.
        src.flags = BiasSourceFlags::COLOR_OVERRIDE | BiasSourceFlags::CHANGED;
        self.push(src)
    }

    /// Append a white source of default intensity at the origin.
    pub fn create(&mut self) -> Result<usize, BiasError> {
        self.create_at([0.0; 3], DEFAULT_SOURCE_INTENSITY, [0.0; 2], &[1.0; 3])
    }

    /// Append a copy of the source at `index`.
    pub fn duplicate(&mut self, index: usize) -> Result<usize, BiasError> {
        self.check_index(index)?;
        let orig = self.sources[index].clone();
        let new_index = self.create_at(
            orig.pos,
            orig.primary_intensity,
            orig.sector_level,
            &orig.color,
        )?;
        // Match the current state of a sector-driven original.
        self.sources[new_index].intensity = orig.intensity;
        Ok(new_index)
    }

    /// Remove the source at `index`. Later sources move down one slot and
    /// are flagged changed, as is the slot left empty at the end.
    pub fn delete(&mut self, index: usize) -> Result<BiasSource, BiasError> {
        self.check_index(index)?;
        let old_count = self.sources.len();
        let removed = self.sources.remove(index);

        for src in self.sources.iter_mut().skip(index) {
            src.flags |= BiasSourceFlags::CHANGED;
        }
        self.vacated.mark(old_count - 1);
        self.restructured = true;
        Ok(removed)
    }

    pub fn lock(&mut self, index: usize) -> Result<(), BiasError> {
        self.check_index(index)?;
        self.sources[index].flags |= BiasSourceFlags::LOCKED;
        Ok(())
    }

    pub fn unlock(&mut self, index: usize) -> Result<(), BiasError> {
        self.check_index(index)?;
        self.sources[index].flags &= !BiasSourceFlags::LOCKED;
        Ok(())
    }

    /// Remove every source.
    pub fn clear(&mut self) {
        for i in 0..self.sources.len() {
            self.vacated.mark(i);
        }
        if !self.sources.is_empty() {
            self.restructured = true;
        }
        self.sources.clear();
    }

    /// Forget every source and pending change for a new level. Ids keep
    /// counting so none handed out before can name a later source.
    pub fn reset(&mut self) {
        *self = Self {
            next_id: self.next_id,
            ..Self::default()
        };
    }

    /// Import the definitions belonging to `level`. Stops quietly once the
    /// registry is full. Returns the number of sources added.
    pub fn load_level(&mut self, level: &str, defs: &[DedLight]) -> usize {
        let mut added = 0;
        for def in defs.iter().filter(|d| d.level.eq_ignore_ascii_case(level)) {
            if self.add_from_definition(def).is_err() {
                con_printf(&format!(
                    "Too many bias lights in {}, only {} used.\n",
                    level, MAX_BIAS_LIGHTS
                ));
                break;
            }
            added += 1;
        }
        added
    }

    pub fn to_definitions(&self, level: &str) -> Vec<DedLight> {
        self.sources.iter().map(|s| s.to_definition(level)).collect()
    }

    /// Hand over the slots vacated since the last call.
    pub fn take_vacated(&mut self) -> BiasTracker {
        std::mem::take(&mut self.vacated)
    }

    /// True (once) if sources were added or removed since the last call.
    pub fn take_restructured(&mut self) -> bool {
        std::mem::take(&mut self.restructured)
    }
}
