//! Static site builder for mortar.
//!
//! Expands every page in the pages directory into the output directory,
//! replacing the rendered files of the previous build.

pub mod builder;
pub mod constants;

pub use builder::{BuildConfig, BuildError, BuildReport, StaticBuilder};
pub use constants::{load_constants, ConstantsError, EnvFiles, Mode};
