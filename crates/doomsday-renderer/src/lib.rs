#![allow(clippy::new_without_default, clippy::too_many_arguments, clippy::float_cmp,
         clippy::needless_range_loop)]
// Shadow bias lighting: incremental per-vertex light from placed sources

pub mod error;
pub mod bias_tracker;
pub mod bias_source;
pub mod bias_affect;
pub mod bias_illum;
pub mod rend_bias;
pub mod edit_bias;
