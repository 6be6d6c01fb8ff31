//! Scaffolding for `crew init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::io::config::{CrewConfig, write_config};

/// Options for [`init_crew`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// If true, overwrite an existing config file.
    pub force: bool,
}

/// Paths created by [`init_crew`].
#[derive(Debug, Clone)]
pub struct InitPaths {
    pub config_path: PathBuf,
    pub events_dir: PathBuf,
    pub gitignore_path: PathBuf,
}

/// Write the default config at `config_path` and create the events directory
/// next to it.
///
/// Fails if the config already exists unless `options.force` is set.
pub fn init_crew(config_path: &Path, options: &InitOptions) -> Result<InitPaths> {
    if config_path.exists() && !options.force {
        return Err(anyhow!(
            "crew init: {} already exists (use --force to overwrite)",
            config_path.display()
        ));
    }
    let state_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut cfg = CrewConfig::default();
    let events_dir = state_dir.join("events");
    cfg.workflow.events_dir = events_dir.clone();
    write_config(config_path, &cfg)?;

    fs::create_dir_all(&events_dir)
        .with_context(|| format!("create directory {}", events_dir.display()))?;
    let gitignore_path = state_dir.join(".gitignore");
    if options.force || !gitignore_path.exists() {
        fs::write(&gitignore_path, CREW_GITIGNORE)
            .with_context(|| format!("write file {}", gitignore_path.display()))?;
    }

    info!(config = %config_path.display(), "initialized crew");
    Ok(InitPaths {
        config_path: config_path.to_path_buf(),
        events_dir,
        gitignore_path,
    })
}

const CREW_GITIGNORE: &str = "events/\n";
