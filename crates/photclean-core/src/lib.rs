pub mod config;
pub mod diagnostics;
pub mod error;
pub mod errorbar_duster;
pub mod exposure_grader;
pub mod flag_scrubber;
pub mod io;
pub mod night_cleanser;
pub mod pipeline;
pub mod ratios;
pub mod schema;
pub mod sentinel;
