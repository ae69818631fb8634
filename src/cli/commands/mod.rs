pub mod check;
pub mod detect;

use anyhow::{Context, Result};
use std::path::Path;

use crate::core::config::Config;

/// An explicit `--config` must load; otherwise search upwards from `start`.
pub(crate) fn load_config(explicit: Option<&Path>, start: &Path) -> Result<Config> {
    match explicit {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("cannot use configuration {}", path.display())),
        None => Ok(Config::discover(start)),
    }
}
