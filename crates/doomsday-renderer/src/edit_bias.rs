// edit_bias.rs: interactive bias light editor

use crate::bias_source::{BiasSourceFlags, SourceId, DEFAULT_SOURCE_INTENSITY};
use crate::error::BiasError;
use crate::rend_bias::BiasContext;
use doomsday_common::cmd::{split_commands, CmdArgs};
use doomsday_common::common::con_printf;
use doomsday_common::cvar::{CvarContext, CvarFlags};
use doomsday_common::ded::write_bias_lights;
use doomsday_common::mathlib::{vector_ma, Vec3};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Console commands handled by `BiasEditor::execute`.
pub const EDITOR_COMMANDS: [&str; 13] = [
    "bledit", "blquit", "blclear", "blsave", "blnew", "bldel", "bllock", "blunlock", "blgrab",
    "bldup", "blc", "bli", "blhue",
];

pub const DEFAULT_GRAB_DISTANCE: f32 = 100.0;

pub fn register_cvars(cvars: &mut CvarContext) {
    cvars.register(
        "edit-bias-grab-distance",
        DEFAULT_GRAB_DISTANCE,
        CvarFlags::empty(),
        10.0,
        1000.0,
    );
}

pub struct BiasEditor {
    active: bool,
    grabbed: Option<SourceId>,
    show_hue: bool,
    /// Color picked from the hue circle, applied at the end of the frame.
    staged_color: Option<Vec3>,
    /// Accumulated intensity adjustment, applied at the end of the frame.
    staged_intensity: f32,
    hand: Vec3,
    grab_distance: f32,
    save_dir: PathBuf,
}

impl BiasEditor {
    /// `save_dir` is where `blsave` writes its files.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            active: false,
            grabbed: None,
            show_hue: false,
            staged_color: None,
            staged_intensity: 0.0,
            hand: [0.0; 3],
            grab_distance: DEFAULT_GRAB_DISTANCE,
            save_dir: save_dir.into(),
        }
    }

    pub fn apply_cvars(&mut self, cvars: &CvarContext) {
        self.grab_distance = cvars.variable_value("edit-bias-grab-distance");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_hue_visible(&self) -> bool {
        self.show_hue
    }

    pub fn hand(&self) -> Vec3 {
        self.hand
    }

    /// Index of the grabbed source, if it still exists.
    pub fn grabbed_index(&self, ctx: &BiasContext) -> Option<usize> {
        self.grabbed.and_then(|id| ctx.sources.index_of(id))
    }

    /// Place the hand in front of the viewer.
    pub fn set_view(&mut self, origin: &Vec3, front: &Vec3) {
        self.hand = vector_ma(origin, self.grab_distance, front);
    }

    /// Color chosen on the hue circle. Ignored while the circle is hidden.
    pub fn pick_hue(&mut self, rgb: Vec3) {
        if self.show_hue {
            self.staged_color = Some(rgb);
        }
    }

    pub fn nudge_intensity(&mut self, delta: f32) {
        self.staged_intensity += delta;
    }

    pub fn is_command(name: &str) -> bool {
        EDITOR_COMMANDS.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Run editor commands separated by newlines or semicolons, stopping at
    /// the first failure. Errors are reported on the console as well as
    /// returned.
    pub fn execute(&mut self, ctx: &mut BiasContext, text: &str) -> Result<(), BiasError> {
        for line in split_commands(text) {
            let args = CmdArgs::tokenize(line);
            if let Err(e) = self.dispatch(ctx, &args) {
                con_printf(&format!("{}: {}\n", args.argv(0), e));
                return Err(e);
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, ctx: &mut BiasContext, args: &CmdArgs) -> Result<(), BiasError> {
        let cmd = args.argv(0).to_ascii_lowercase();

        if cmd == "bledit" {
            if !self.active {
                self.active = true;
                con_printf("Bias light editor: ON\n");
            }
            return Ok(());
        }

        if !self.active {
            return Err(BiasError::NotActive);
        }

        match cmd.as_str() {
            "blquit" => {
                self.active = false;
                self.grabbed = None;
                self.show_hue = false;
                self.staged_color = None;
                self.staged_intensity = 0.0;
                con_printf("Bias light editor: OFF\n");
                Ok(())
            }
            "blclear" => {
                ctx.sources.clear();
                self.grabbed = None;
                let index = self.new_source(ctx)?;
                self.grab(ctx, index);
                Ok(())
            }
            "blsave" => {
                self.save(ctx, optional_arg(args, 1)).map(|_| ())
            }
            "blnew" => {
                let index = self.new_source(ctx)?;
                self.grab(ctx, index);
                Ok(())
            }
            "bldel" => {
                let index = self.target(ctx, optional_arg(args, 1))?;
                let removed = ctx.sources.delete(index)?;
                if self.grabbed == Some(removed.id) {
                    self.grabbed = None;
                }
                Ok(())
            }
            "bllock" => {
                let index = self.target(ctx, optional_arg(args, 1))?;
                ctx.sources.lock(index)
            }
            "blunlock" => {
                let index = self.target(ctx, optional_arg(args, 1))?;
                ctx.sources.unlock(index)
            }
            "blgrab" => {
                let index = self.target(ctx, optional_arg(args, 1))?;
                let id = ctx.sources.get(index).map(|s| s.id);
                if id.is_some() && self.grabbed == id {
                    self.grabbed = None;
                } else {
                    self.grab(ctx, index);
                }
                Ok(())
            }
            "bldup" => {
                let index = self.target(ctx, optional_arg(args, 1))?;
                let new_index = ctx.sources.duplicate(index)?;
                self.grab(ctx, new_index);
                Ok(())
            }
            "blc" => {
                if args.argc() != 4 {
                    return Err(BiasError::BadArguments("usage: blc (r) (g) (b)".to_string()));
                }
                let rgb = [
                    parse_float(args.argv(1))?,
                    parse_float(args.argv(2))?,
                    parse_float(args.argv(3))?,
                ];
                let index = self.target(ctx, None)?;
                if let Some(src) = ctx.sources.get_mut(index) {
                    src.set_color(&rgb);
                    src.flags |= BiasSourceFlags::CHANGED;
                }
                Ok(())
            }
            "bli" => {
                let (first, second) = match args.argc() {
                    2 => (parse_float(args.argv(1))?, None),
                    3 => (parse_float(args.argv(1))?, Some(parse_float(args.argv(2))?)),
                    _ => {
                        return Err(BiasError::BadArguments(
                            "usage: bli (intensity) or bli (min-level) (max-level)".to_string(),
                        ))
                    }
                };
                let index = self.target(ctx, None)?;
                if let Some(src) = ctx.sources.get_mut(index) {
                    match second {
                        None => {
                            src.primary_intensity = first;
                            src.intensity = first;
                        }
                        Some(max_level) => src.sector_level = [first, max_level],
                    }
                    src.flags |= BiasSourceFlags::CHANGED;
                }
                Ok(())
            }
            "blhue" => {
                if args.argv(1).eq_ignore_ascii_case("off") {
                    self.show_hue = false;
                } else {
                    self.show_hue = !self.show_hue;
                }
                Ok(())
            }
            _ => Err(BiasError::BadArguments(format!("unknown command \"{}\"", cmd))),
        }
    }

    fn grab(&mut self, ctx: &BiasContext, index: usize) {
        self.grabbed = ctx.sources.get(index).map(|s| s.id);
    }

    fn new_source(&self, ctx: &mut BiasContext) -> Result<usize, BiasError> {
        ctx.sources
            .create_at(self.hand, DEFAULT_SOURCE_INTENSITY, [0.0; 2], &[1.0; 3])
    }

    /// Source a command acts on: the given index, else the grabbed source,
    /// else the one nearest to the hand.
    fn target(&self, ctx: &BiasContext, index: Option<&str>) -> Result<usize, BiasError> {
        if let Some(text) = index {
            let index = parse_index(text)?;
            ctx.sources.check_index(index)?;
            return Ok(index);
        }
        if let Some(index) = self.grabbed_index(ctx) {
            return Ok(index);
        }
        ctx.sources.nearest(&self.hand).ok_or(BiasError::NoSource)
    }

    /// Write every source to a definition file and return its path. Without
    /// a name the file is named after the level.
    pub fn save(&self, ctx: &BiasContext, name: Option<&str>) -> Result<PathBuf, BiasError> {
        let file_name = match name {
            Some(name) if Path::new(name).extension().is_none() => format!("{}.ded", name),
            Some(name) => name.to_string(),
            None if ctx.level_id.is_empty() => {
                return Err(BiasError::BadArguments("no level loaded".to_string()))
            }
            None => format!("{}.ded", ctx.level_id),
        };
        let path = self.save_dir.join(file_name);
        let io_error = |source| BiasError::Io {
            path: path.display().to_string(),
            source,
        };

        let lights = ctx.sources.to_definitions(&ctx.level_id);
        let mut writer = BufWriter::new(File::create(&path).map_err(io_error)?);
        write_bias_lights(&mut writer, &ctx.level_id, &ctx.game_mode, &lights).map_err(io_error)?;
        writer.flush().map_err(io_error)?;

        con_printf(&format!(
            "Saved {} bias lights to \"{}\"\n",
            lights.len(),
            path.display()
        ));
        Ok(path)
    }

    /// Apply the staged edits to the grabbed source and move it to the hand.
    pub fn end_frame(&mut self, ctx: &mut BiasContext) {
        if !self.active {
            return;
        }
        let staged_color = self.staged_color.take();
        let staged_intensity = std::mem::take(&mut self.staged_intensity);

        let Some(index) = self.grabbed_index(ctx) else {
            self.grabbed = None;
            return;
        };
        let Some(src) = ctx.sources.get_mut(index) else {
            return;
        };
        let old = src.clone();

        if let Some(rgb) = staged_color {
            src.set_color(&rgb);
        }
        if staged_intensity != 0.0 {
            src.primary_intensity = (src.primary_intensity + staged_intensity).max(0.0);
            src.intensity = src.primary_intensity;
        }
        if !src.is_locked() {
            src.pos = self.hand;
        }

        if *src != old {
            src.flags |= BiasSourceFlags::CHANGED;
        }
    }
}

fn optional_arg(args: &CmdArgs, arg: usize) -> Option<&str> {
    (args.argc() > arg).then(|| args.argv(arg))
}

fn parse_index(text: &str) -> Result<usize, BiasError> {
    text.parse::<usize>()
        .map_err(|_| BiasError::BadArguments(format!("\"{}\" is not a light index", text)))
}

fn parse_float(text: &str) -> Result<f32, BiasError> {
    text.parse::<f32>()
        .map_err(|_| BiasError::BadArguments(format!("\"{}\" is not a number", text)))
}
