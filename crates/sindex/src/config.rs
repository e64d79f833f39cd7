use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use sindex_core::AggregationStrategy;

use crate::error::SindexResult;

/// Project config (`sindex.toml`).
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Config {
    /// The path of the config.
    #[serde(skip)]
    path: PathBuf,

    /// Project metadata.
    pub(crate) metadata: Metadata,

    /// Runtime options.
    pub(crate) runtime: Option<Runtime>,

    /// Locations of the input and output files. Relative paths are
    /// resolved against the project root.
    #[serde(default)]
    pub(crate) paths: Paths,

    /// Batch sizes.
    #[serde(default)]
    pub(crate) batch: Batch,

    /// s-index aggregation options.
    #[serde(default)]
    pub(crate) aggregation: Aggregation,

    /// This structure should always be constructed using a public
    /// constructor or using the update syntax:
    ///
    /// ```ignore
    /// use crate::config::Config;
    ///
    /// let config = Config {
    ///     ..Default::default()
    /// };
    /// ```
    #[doc(hidden)]
    #[serde(skip)]
    __non_exhaustive: (),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Metadata {
    /// The name of the project.
    pub(crate) name: String,

    /// The version of the project.
    pub(crate) version: Version,

    /// A short blurb about the project.
    pub(crate) description: Option<String>,

    /// A list of people or organizations, which are considered as the
    /// authors of the project.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub(crate) authors: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: "".into(),
            version: Version::new(0, 1, 0),
            description: None,
            authors: vec![],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Runtime {
    /// Number of threads to use. If this options isn't set or a value
    /// of "0" is chosen, the maximum number of available threads
    /// is used.
    pub(crate) num_jobs: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub(crate) struct Paths {
    /// Directory of the dataset records (NDJSON).
    pub(crate) datasets: PathBuf,

    /// Directory of the entity-dataset links (NDJSON or CSV).
    pub(crate) links: PathBuf,

    /// The normalization table (CSV or Arrow IPC). Without a table
    /// the default factors are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) normalization: Option<PathBuf>,

    /// Output directory of the d-index series.
    pub(crate) dindex: PathBuf,

    /// Output directory of the normalization provenance records.
    pub(crate) normalization_out: PathBuf,

    /// Output directory of the s-index.
    pub(crate) sindex: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            datasets: "input/datasets".into(),
            links: "input/links".into(),
            normalization: None,
            dindex: "output/dindex".into(),
            normalization_out: "output/normalization".into(),
            sindex: "output/sindex".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub(crate) struct Batch {
    /// Dataset records per batch and per d-index output file.
    pub(crate) datasets: usize,

    /// Entities per s-index batch.
    pub(crate) entities: usize,

    /// s-index rows per output file.
    pub(crate) rows_per_file: usize,
}

impl Default for Batch {
    fn default() -> Self {
        Self {
            datasets: 10_000,
            entities: 250_000,
            rows_per_file: 50_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub(crate) struct Aggregation {
    pub(crate) strategy: AggregationStrategy,

    /// The name of the entity id field in link and s-index records,
    /// e.g. `automatedUserId` or `automatedOrganizationId`.
    pub(crate) entity_key: String,
}

impl Default for Aggregation {
    fn default() -> Self {
        Self {
            strategy: AggregationStrategy::default(),
            entity_key: "automatedUserId".into(),
        }
    }
}

impl Config {
    /// Creates a new default config and sets the file location.
    pub(crate) fn create<P>(path: P) -> SindexResult<Self>
    where
        P: AsRef<Path>,
    {
        Ok(Self {
            path: path.as_ref().into(),
            ..Default::default()
        })
    }

    /// Loads an existing config from a path.
    pub(crate) fn from_path<P>(path: P) -> SindexResult<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().into();
        let content = fs::read_to_string(&path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.path = path;

        Ok(config)
    }

    /// Saves the config.
    pub(crate) fn save(&self) -> SindexResult<()> {
        let content = toml::to_string(self)?;
        let mut out = File::create(&self.path)?;
        out.write_all(content.as_bytes())?;
        Ok(())
    }
}
