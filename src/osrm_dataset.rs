//! Local OSRM dataset preparation (Geofabrik download + MLD preprocessing).
//!
//! Used to stand up a routing backend for integration runs without relying on
//! the public demo server.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

/// Docker image providing the `osrm-*` tools.
pub const OSRM_IMAGE: &str = "osrm/osrm-backend";

#[derive(Debug, Clone)]
pub struct GeofabrikRegion {
    /// Geofabrik region path, e.g. "asia/india/southern-zone".
    pub path: String,
}

impl GeofabrikRegion {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn name(&self) -> &str {
        self.path
            .rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or("region")
    }

    pub fn url(&self) -> String {
        format!("https://download.geofabrik.de/{}-latest.osm.pbf", self.path)
    }
}

/// Vehicle profile shipped with the OSRM image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OsrmProfile {
    #[default]
    Car,
    Bicycle,
    Foot,
}

impl OsrmProfile {
    fn lua_path(&self) -> &'static str {
        match self {
            OsrmProfile::Car => "/opt/car.lua",
            OsrmProfile::Bicycle => "/opt/bicycle.lua",
            OsrmProfile::Foot => "/opt/foot.lua",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmDatasetConfig {
    pub region: GeofabrikRegion,
    pub data_root: PathBuf,
    pub profile: OsrmProfile,
}

impl OsrmDatasetConfig {
    pub fn new(region: GeofabrikRegion, data_root: impl Into<PathBuf>) -> Self {
        Self {
            region,
            data_root: data_root.into(),
            profile: OsrmProfile::default(),
        }
    }
}

/// Paths of a prepared dataset. `osrm_base` is what `osrm-routed` loads.
#[derive(Debug, Clone)]
pub struct OsrmDataset {
    pub data_dir: PathBuf,
    pub osrm_base: PathBuf,
    pub pbf_path: PathBuf,
}

#[derive(Debug)]
pub enum OsrmDatasetError {
    Io(io::Error),
    Http(reqwest::Error),
    ProcessFailure(String),
}

impl fmt::Display for OsrmDatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsrmDatasetError::Io(err) => write!(f, "io error: {}", err),
            OsrmDatasetError::Http(err) => write!(f, "download failed: {}", err),
            OsrmDatasetError::ProcessFailure(msg) => write!(f, "preprocessing failed: {}", msg),
        }
    }
}

impl std::error::Error for OsrmDatasetError {}

impl From<io::Error> for OsrmDatasetError {
    fn from(err: io::Error) -> Self {
        OsrmDatasetError::Io(err)
    }
}

impl From<reqwest::Error> for OsrmDatasetError {
    fn from(err: reqwest::Error) -> Self {
        OsrmDatasetError::Http(err)
    }
}

impl OsrmDataset {
    /// Paths the dataset for `config` lives at, without touching the disk.
    pub fn locate(config: &OsrmDatasetConfig, data_root: &Path) -> Self {
        let name = config.region.name();
        let data_dir = data_root.join(name);
        Self {
            pbf_path: data_dir.join(format!("{}-latest.osm.pbf", name)),
            osrm_base: data_dir.join(format!("{}-latest.osrm", name)),
            data_dir,
        }
    }

    /// Downloads and preprocesses the region unless already prepared.
    pub fn ensure(config: &OsrmDatasetConfig) -> Result<Self, OsrmDatasetError> {
        let data_root = if config.data_root.is_absolute() {
            config.data_root.clone()
        } else {
            std::env::current_dir()?.join(&config.data_root)
        };
        let dataset = Self::locate(config, &data_root);
        fs::create_dir_all(&dataset.data_dir)?;

        if !dataset.pbf_path.exists() {
            info!(url = %config.region.url(), "downloading region extract");
            download(&config.region.url(), &dataset.pbf_path)?;
        }

        if !dataset.osrm_base.exists() {
            run_docker(
                &[
                    "osrm-extract",
                    "-p",
                    config.profile.lua_path(),
                    &container_path(&dataset.pbf_path),
                ],
                &dataset.data_dir,
            )?;
        }

        if !dataset.is_ready() {
            let base = container_path(&dataset.osrm_base);
            run_docker(&["osrm-partition", &base], &dataset.data_dir)?;
            run_docker(&["osrm-customize", &base], &dataset.data_dir)?;
        }

        Ok(dataset)
    }

    /// True once the MLD partition and cell metrics exist.
    pub fn is_ready(&self) -> bool {
        ["osrm.partition", "osrm.mldgr", "osrm.cells"]
            .iter()
            .all(|ext| self.osrm_base.with_extension(ext).exists())
            && self.osrm_base.exists()
    }
}

fn download(url: &str, dest: &Path) -> Result<(), OsrmDatasetError> {
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let tmp_path = dest.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    writer.write_all(&response.bytes()?)?;
    writer.flush()?;
    fs::rename(tmp_path, dest)?;
    Ok(())
}

fn run_docker(args: &[&str], data_dir: &Path) -> Result<(), OsrmDatasetError> {
    info!(?args, "running osrm preprocessing step");
    let status = Command::new("docker")
        .arg("run")
        .arg("--rm")
        .arg("-t")
        .arg("-v")
        .arg(format!("{}:/data", data_dir.display()))
        .arg(OSRM_IMAGE)
        .args(args)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(OsrmDatasetError::ProcessFailure(format!(
            "{} exited with status {}",
            args.first().copied().unwrap_or("docker"),
            status
        )))
    }
}

/// Path of a dataset file as seen from inside the container's `/data` mount.
fn container_path(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    format!("/data/{}", name)
}
