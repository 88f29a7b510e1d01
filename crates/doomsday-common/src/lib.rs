#![allow(clippy::new_without_default, clippy::manual_range_contains, clippy::float_cmp)]

pub mod mathlib;
pub mod common;
pub mod cmd;
pub mod cvar;
pub mod ded;
