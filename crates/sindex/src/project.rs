use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::config::Config;
use crate::prelude::*;

pub(crate) struct Project {
    /// The root directory of the project.
    root_dir: PathBuf,
}

impl Project {
    pub(crate) const CONFIG: &'static str = "sindex.toml";

    /// Discovers the root of the project.
    ///
    /// This function fails, if neither the current directory nor any
    /// parent directory contains a project [Config].
    pub(crate) fn discover() -> SindexResult<Self> {
        let mut root_dir = env::current_dir()?;

        loop {
            if let Ok(metadata) =
                fs::metadata(root_dir.join(Self::CONFIG))
            {
                if metadata.is_file() {
                    break;
                }
            }

            if !root_dir.pop() {
                bail!("not a sindex project (or any parent directory)");
            }
        }

        Ok(Self { root_dir })
    }

    /// Returns the config associated with the project.
    #[inline]
    pub(crate) fn config(&self) -> SindexResult<Config> {
        Config::from_path(self.root_dir.join(Self::CONFIG))
    }

    /// Resolves a (config) path against the project root. Absolute
    /// paths are returned unchanged.
    #[inline]
    pub(crate) fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root_dir.join(path)
    }
}
