use std::fs;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use crate::common::config::Config;
use crate::common::error::{AttendanceError, Result};

pub const DEV_DATA_DIR: &str = "./dev_data";

/// Resolved on-disk layout for one run of the service.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub base_dir: PathBuf,
    pub faces_dir: PathBuf,
    pub recognized_dir: PathBuf,
    pub csv_dir: PathBuf,
    pub database_file: PathBuf,
}

impl DataPaths {
    /// Dev mode keeps everything under `./dev_data`; otherwise the config
    /// data dir wins, then the platform data dir.
    pub fn resolve(config: &Config, dev: bool) -> Result<Self> {
        let base_dir = if dev {
            PathBuf::from(DEV_DATA_DIR)
        } else if let Some(dir) = &config.storage.data_dir {
            dir.clone()
        } else {
            let dirs = ProjectDirs::from("com", "rollcall", "Rollcall")
                .ok_or_else(|| AttendanceError::Config("Failed to get project dirs".into()))?;
            dirs.data_dir().to_path_buf()
        };

        Ok(Self::from_base(&base_dir, config))
    }

    pub fn from_base(base_dir: &Path, config: &Config) -> Self {
        let storage = &config.storage;
        let recognized_dir = storage
            .recognized_dir
            .clone()
            .unwrap_or_else(|| base_dir.join("recognized_faces"));
        // Known faces sit next to the recognized copies unless configured
        let faces_dir = storage
            .faces_dir
            .clone()
            .unwrap_or_else(|| sibling_faces_dir(&recognized_dir));

        Self {
            base_dir: base_dir.to_path_buf(),
            faces_dir,
            recognized_dir,
            csv_dir: storage.csv_dir.clone().unwrap_or_else(|| base_dir.join("csv")),
            database_file: base_dir.join(&config.database.file),
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::create_dir_all(&self.faces_dir)?;
        fs::create_dir_all(&self.recognized_dir)?;
        fs::create_dir_all(&self.csv_dir)?;

        tracing::debug!("Data directories ready under {:?}", self.base_dir);
        Ok(())
    }
}

/// `<parent of recognized_dir>/faces`.
pub fn sibling_faces_dir(recognized_dir: &Path) -> PathBuf {
    recognized_dir
        .parent()
        .map(|p| p.join("faces"))
        .unwrap_or_else(|| PathBuf::from("faces"))
}
