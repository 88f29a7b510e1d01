// cvar.rs: console variables with numeric ranges

use crate::common::con_printf;

use parking_lot::Mutex;
use std::collections::HashMap;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        /// Not written by `write_variables`.
        const NO_ARCHIVE = 0x0001;
        /// Can only be changed with `force_set`.
        const READ_ONLY  = 0x0002;
        /// The minimum bound is not enforced.
        const NO_MIN     = 0x0004;
        /// The maximum bound is not enforced.
        const NO_MAX     = 0x0008;
    }
}

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub value: f32,
    pub flags: CvarFlags,
    pub min: f32,
    pub max: f32,
    pub modified: bool,
}

impl Cvar {
    /// Clamp `value` to this variable's range, honouring NO_MIN/NO_MAX.
    pub fn clamp(&self, value: f32) -> f32 {
        let mut v = value;
        if !self.flags.contains(CvarFlags::NO_MIN) && v < self.min {
            v = self.min;
        }
        if !self.flags.contains(CvarFlags::NO_MAX) && v > self.max {
            v = self.max;
        }
        v
    }
}

fn value_string(value: f32) -> String {
    if value == (value as i32) as f32 {
        format!("{}", value as i32)
    } else {
        format!("{}", value)
    }
}

/// The full cvar table.
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) lookup by lowercase name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
        }
    }

    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.find_var_index(name).map(|idx| &self.cvar_vars[idx])
    }

    /// Numeric value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Integer value of a cvar. Returns 0 if not found.
    pub fn variable_integer(&self, name: &str) -> i32 {
        self.variable_value(name) as i32
    }

    /// String value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Register a cvar. If it already exists the current value is kept and
    /// only the flags and range are updated.
    pub fn register(
        &mut self,
        name: &str,
        default: f32,
        flags: CvarFlags,
        min: f32,
        max: f32,
    ) -> usize {
        if let Some(idx) = self.find_var_index(name) {
            let var = &mut self.cvar_vars[idx];
            var.flags |= flags;
            var.min = min;
            var.max = max;
            return idx;
        }

        let mut var = Cvar {
            name: name.to_string(),
            string: String::new(),
            value: 0.0,
            flags,
            min,
            max,
            modified: false,
        };
        var.value = var.clamp(default);
        var.string = value_string(var.value);

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(var);
        self.cvar_index.insert(name.to_ascii_lowercase(), idx);
        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> Option<usize> {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => {
                con_printf(&format!("Unknown variable \"{}\".\n", name));
                return None;
            }
        };

        let var = &mut self.cvar_vars[idx];
        if !force && var.flags.contains(CvarFlags::READ_ONLY) {
            con_printf(&format!("{} is read-only.\n", var.name));
            return Some(idx);
        }

        let parsed = match value.trim().parse::<f32>() {
            Ok(v) => v,
            Err(_) => {
                con_printf(&format!("\"{}\" is not a number.\n", value));
                return Some(idx);
            }
        };

        let clamped = var.clamp(parsed);
        if clamped != var.value {
            var.modified = true;
        }
        var.value = clamped;
        var.string = value_string(clamped);
        Some(idx)
    }

    /// Set a cvar from a string (respects READ_ONLY).
    pub fn set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, false)
    }

    /// Set a cvar ignoring READ_ONLY.
    pub fn force_set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, true)
    }

    /// Set a cvar from a float value.
    pub fn set_value(&mut self, name: &str, value: f32) {
        self.set(name, &value_string(value));
    }

    /// Handle "name" / "name value" typed at the console.
    /// Returns true if argv0 named a cvar.
    pub fn command(&mut self, argv: &[&str]) -> bool {
        let Some(argv0) = argv.first() else {
            return false;
        };
        let idx = match self.find_var_index(argv0) {
            Some(idx) => idx,
            None => return false,
        };

        match argv.get(1) {
            None => {
                let var = &self.cvar_vars[idx];
                con_printf(&format!("\"{}\" is \"{}\"\n", var.name, var.string));
            }
            Some(value) => {
                let name = self.cvar_vars[idx].name.clone();
                self.set(&name, value);
            }
        }
        true
    }

    /// Write all archivable cvars to a writer, one `name "value"` per line.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if !var.flags.contains(CvarFlags::NO_ARCHIVE) {
                writeln!(writer, "{} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = Mutex::new(None);

pub fn cvar_init() {
    let mut ctx = CvarContext::new();
    crate::common::con_register_cvars(&mut ctx);
    *CVAR_CTX.lock() = Some(ctx);
}

pub fn cvar_shutdown() {
    *CVAR_CTX.lock() = None;
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

pub fn cvar_set(name: &str, value: &str) {
    if let Some(ref mut c) = *CVAR_CTX.lock() {
        c.set(name, value);
    }
}

/// Run `f` against the global cvar table, if initialized.
pub fn with_cvar_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CvarContext) -> R,
{
    CVAR_CTX.lock().as_mut().map(f)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_find() {
        let mut ctx = CvarContext::new();
        ctx.register("rend-bias-min", 220.0, CvarFlags::empty(), 0.0, 255.0);
        assert_eq!(ctx.variable_value("rend-bias-min"), 220.0);
        assert_eq!(ctx.variable_integer("rend-bias-min"), 220);
        assert_eq!(ctx.variable_string("rend-bias-min"), "220");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut ctx = CvarContext::new();
        ctx.register("rend-bias", 1.0, CvarFlags::empty(), 0.0, 1.0);
        assert_eq!(ctx.variable_value("REND-BIAS"), 1.0);
    }

    #[test]
    fn test_register_keeps_existing_value() {
        let mut ctx = CvarContext::new();
        ctx.register("test", 1.0, CvarFlags::empty(), 0.0, 10.0);
        ctx.set("test", "5");
        ctx.register("test", 2.0, CvarFlags::empty(), 0.0, 10.0);
        assert_eq!(ctx.variable_value("test"), 5.0);
    }

    #[test]
    fn test_set_clamps_to_range() {
        let mut ctx = CvarContext::new();
        ctx.register("test", 1.0, CvarFlags::empty(), 0.0, 10.0);
        ctx.set("test", "50");
        assert_eq!(ctx.variable_value("test"), 10.0);
        ctx.set("test", "-3");
        assert_eq!(ctx.variable_value("test"), 0.0);
    }

    #[test]
    fn test_no_min_no_max() {
        let mut ctx = CvarContext::new();
        ctx.register("free", 0.0, CvarFlags::NO_MIN | CvarFlags::NO_MAX, 0.0, 1.0);
        ctx.set("free", "-100");
        assert_eq!(ctx.variable_value("free"), -100.0);
        ctx.set("free", "100");
        assert_eq!(ctx.variable_value("free"), 100.0);
    }

    #[test]
    fn test_read_only() {
        let mut ctx = CvarContext::new();
        ctx.register("locked", 3.0, CvarFlags::READ_ONLY, 0.0, 10.0);
        ctx.set("locked", "4");
        assert_eq!(ctx.variable_value("locked"), 3.0);
        ctx.force_set("locked", "4");
        assert_eq!(ctx.variable_value("locked"), 4.0);
    }

    #[test]
    fn test_set_value_and_modified() {
        let mut ctx = CvarContext::new();
        let idx = ctx.register("speed", 130.0, CvarFlags::empty(), 0.0, 5000.0);
        assert!(!ctx.cvar_vars[idx].modified);
        ctx.set_value("speed", 0.5);
        assert!((ctx.variable_value("speed") - 0.5).abs() < 1e-6);
        assert_eq!(ctx.variable_string("speed"), "0.5");
        assert!(ctx.cvar_vars[idx].modified);
    }

    #[test]
    fn test_non_numeric_is_rejected() {
        let mut ctx = CvarContext::new();
        ctx.register("num", 7.0, CvarFlags::empty(), 0.0, 10.0);
        ctx.set("num", "seven");
        assert_eq!(ctx.variable_value("num"), 7.0);
    }

    #[test]
    fn test_command() {
        let mut ctx = CvarContext::new();
        ctx.register("rend-bias-lightspeed", 130.0, CvarFlags::empty(), 0.0, 5000.0);
        assert!(ctx.command(&["rend-bias-lightspeed", "200"]));
        assert_eq!(ctx.variable_value("rend-bias-lightspeed"), 200.0);
        assert!(!ctx.command(&["no-such-var", "1"]));
        assert!(!ctx.command(&[]));
    }

    #[test]
    fn test_not_found() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        assert_eq!(ctx.variable_string("nonexistent"), "");
    }

    #[test]
    fn test_write_variables() {
        let mut ctx = CvarContext::new();
        ctx.register("rend-bias", 1.0, CvarFlags::empty(), 0.0, 1.0);
        ctx.register("rend-dev-bias-sight", 1.0, CvarFlags::NO_ARCHIVE, 0.0, 1.0);
        let mut buf = Vec::new();
        ctx.write_variables(&mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("rend-bias \"1\""));
        assert!(!output.contains("rend-dev-bias-sight"));
    }

    #[test]
    fn test_global_wrappers() {
        cvar_init();
        assert_eq!(cvar_variable_value("developer"), 0.0);
        cvar_set("developer", "1");
        assert_eq!(cvar_variable_value("developer"), 1.0);
        cvar_shutdown();
        assert_eq!(cvar_variable_value("developer"), 0.0);
    }
}
