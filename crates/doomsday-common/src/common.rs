// common.rs: console printing and the redirect buffer

use crate::cvar::{CvarContext, CvarFlags};
use parking_lot::Mutex;

/// Engine name used in generated files and version strings.
pub const DISTNAME: &str = "Doomsday";
pub const DISTVER: &str = "1.8";

/// Console variables owned by the console itself.
pub fn con_register_cvars(cvars: &mut CvarContext) {
    cvars.register("developer", 0.0, CvarFlags::NO_ARCHIVE, 0.0, 1.0);
}

// ============================================================
// Redirect buffer for con_printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);

/// Begin capturing console output into a buffer instead of stdout.
pub fn con_begin_redirect() {
    *RD_BUFFER.lock() = Some(String::new());
}

/// Stop capturing and return everything printed since `con_begin_redirect`.
pub fn con_end_redirect() -> Option<String> {
    RD_BUFFER.lock().take()
}

// ============================================================
// con_printf / con_dprintf / con_error
// ============================================================

/// Print to the console. Appends to the redirect buffer if one is active.
pub fn con_printf(msg: &str) {
    {
        let mut buf = RD_BUFFER.lock();
        if let Some(ref mut s) = *buf {
            s.push_str(msg);
            return;
        }
    }
    print!("{}", msg);
}

/// Developer-only print, gated on the "developer" cvar.
pub fn con_dprintf(msg: &str) {
    if crate::cvar::cvar_variable_value("developer") == 0.0 {
        return;
    }
    con_printf(msg);
}

/// Fatal engine error. Internal state can no longer be trusted, so this
/// never returns.
pub fn con_error(msg: &str) -> ! {
    eprintln!("Error: {}", msg);
    panic!("Fatal error: {}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_captures_output() {
        con_begin_redirect();
        con_printf("hello world\n");
        let out = con_end_redirect().unwrap_or_default();
        assert!(out.contains("hello world\n"));
    }

    #[test]
    fn test_developer_registered() {
        let mut cvars = CvarContext::new();
        con_register_cvars(&mut cvars);
        assert_eq!(cvars.variable_value("developer"), 0.0);
        cvars.set("developer", "1");
        assert_eq!(cvars.variable_value("developer"), 1.0);
        // Not saved with the archived variables.
        let mut buf = Vec::new();
        cvars.write_variables(&mut buf).unwrap();
        assert!(!String::from_utf8(buf).unwrap().contains("developer"));
    }

    #[test]
    #[should_panic(expected = "Fatal error: broken")]
    fn test_con_error_panics() {
        con_error("broken");
    }
}
