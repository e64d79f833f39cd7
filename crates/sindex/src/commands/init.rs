use std::ffi::OsStr;
use std::path::PathBuf;
use std::{env, fs};

use clap::Parser;
use semver::Version;

use crate::prelude::*;

/// Initialize a new or re-initialize an existing s-index project.
#[derive(Debug, Parser)]
pub(crate) struct Init {
    /// The name of the project. By default the name of the project
    /// directory is used.
    #[arg(short, long)]
    name: Option<String>,

    /// The version of the project.
    #[arg(long, default_value = "0.1.0")]
    version: Version,

    /// A short blurb about the project.
    #[arg(short, long)]
    description: Option<String>,

    /// A list of people or organizations, which are considered as the
    /// authors of the project.
    #[arg(short, long = "author")]
    authors: Vec<String>,

    /// The normalization table (CSV or Arrow IPC) of the project.
    #[arg(long = "norm", value_name = "filename")]
    normalization: Option<PathBuf>,

    /// Whether to overwrite config with default values or not.
    #[arg(short, long)]
    force: bool,

    /// The location of the project.
    #[arg(default_value = ".")]
    path: PathBuf,
}

impl Init {
    pub(crate) fn execute(self) -> SindexResult<()> {
        let root_dir = env::current_dir()?.join(self.path);
        let config_path = root_dir.join(Project::CONFIG);

        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
            log::info!("initialize new project in {}", root_dir.display());
        } else {
            log::info!(
                "re-initialize existing project in {}",
                root_dir.display()
            );
        }

        let config = if !config_path.exists() || self.force {
            let mut config = Config::create(&config_path)?;
            config.metadata.description = self.description;
            config.metadata.authors = self.authors;
            config.metadata.version = self.version;
            config.metadata.name = self.name.unwrap_or(
                root_dir
                    .file_name()
                    .and_then(OsStr::to_str)
                    .unwrap_or_default()
                    .to_string(),
            );
            config.paths.normalization = self.normalization;
            config.save()?;
            config
        } else {
            Config::from_path(&config_path)?
        };

        for dir in [&config.paths.datasets, &config.paths.links] {
            let dir = root_dir.join(dir);
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
                log::info!("create directory {}", dir.display());
            }
        }

        Ok(())
    }
}
