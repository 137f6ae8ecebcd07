use std::fs::{self, File};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::catalog::DatasetDescriptor;
use crate::domain::Year;
use crate::error::GeodataError;

/// Resolves every on-disk location under one explicit project root.
#[derive(Debug, Clone)]
pub struct Store {
    project_root: Utf8PathBuf,
}

impl Store {
    pub fn new(project_root: Utf8PathBuf) -> Self {
        Self { project_root }
    }

    pub fn from_current_dir() -> Result<Self, GeodataError> {
        let cwd = std::env::current_dir().map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        let project_root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| GeodataError::Filesystem("invalid project path".to_string()))?;
        Ok(Self { project_root })
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn data_raw_dir(&self) -> Utf8PathBuf {
        self.project_root.join("data_raw")
    }

    pub fn data_clean_dir(&self) -> Utf8PathBuf {
        self.project_root.join("data_clean")
    }

    pub fn crosswalk_dir(&self) -> Utf8PathBuf {
        self.data_clean_dir().join("crosswalks")
    }

    pub fn output_dir(&self) -> Utf8PathBuf {
        self.project_root.join("output")
    }

    pub fn raw_path(&self, descriptor: &DatasetDescriptor) -> Utf8PathBuf {
        let dir = match &descriptor.subdir {
            Some(subdir) => self.data_raw_dir().join(subdir),
            None => self.data_raw_dir(),
        };
        dir.join(&descriptor.file_name)
    }

    pub fn state_crosswalk_path(&self) -> Utf8PathBuf {
        self.crosswalk_dir().join("state_fips_crosswalk.csv")
    }

    pub fn county_crosswalk_csv_path(&self, year: Year) -> Utf8PathBuf {
        self.crosswalk_dir()
            .join(format!("county_fips_crosswalk_{year}.csv"))
    }

    pub fn county_crosswalk_parquet_path(&self, year: Year) -> Utf8PathBuf {
        self.crosswalk_dir()
            .join(format!("county_fips_crosswalk_{year}.parquet"))
    }

    pub fn project_directories(&self) -> [Utf8PathBuf; 5] {
        [
            self.data_raw_dir(),
            self.data_raw_dir().join("roads"),
            self.data_clean_dir(),
            self.crosswalk_dir(),
            self.output_dir(),
        ]
    }

    pub fn setup_project_structure(&self) -> Result<(), GeodataError> {
        for dir in self.project_directories() {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    pub fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().is_file()
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), GeodataError> {
        Self::write_atomic(path, |file| {
            std::io::Write::write_all(file, content)
                .map_err(|err| GeodataError::Filesystem(err.to_string()))
        })
    }

    /// Runs `write` against a temp file next to `path` and renames it into
    /// place only if `write` succeeds. On error the temp file is removed and
    /// `path` is left untouched.
    pub fn write_atomic<T, F>(path: &Utf8Path, write: F) -> Result<T, GeodataError>
    where
        F: FnOnce(&mut File) -> Result<T, GeodataError>,
    {
        let parent = path
            .parent()
            .ok_or_else(|| GeodataError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".geodata-")
            .suffix(".part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        let value = write(temp.as_file_mut())?;
        temp.as_file()
            .sync_all()
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| GeodataError::Filesystem(err.to_string()))?;
        Ok(value)
    }
}
