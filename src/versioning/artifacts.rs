//! Хранилище артефактов: модель, параметры масштабирования и диапазон
//! темпа по id версии

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::models::RandomForestModel;
use crate::preprocessing::{ScalingParameters, TempoRange};
use crate::versioning::registry::{validate_version_id, write_atomic};

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn model_path(&self, version_id: &str) -> Result<PathBuf> {
        validate_version_id(version_id)?;
        Ok(self.root.join(format!("model_{}.json", version_id)))
    }

    pub fn scaler_path(&self, version_id: &str) -> Result<PathBuf> {
        validate_version_id(version_id)?;
        Ok(self.root.join(format!("scaler_{}.json", version_id)))
    }

    pub fn tempo_range_path(&self, version_id: &str) -> Result<PathBuf> {
        validate_version_id(version_id)?;
        Ok(self.root.join(format!("tempo_range_{}.json", version_id)))
    }

    pub fn save_model(&self, version_id: &str, model: &RandomForestModel) -> Result<PathBuf> {
        let path = self.model_path(version_id)?;
        write_json(&path, model)?;
        Ok(path)
    }

    pub fn load_model(&self, version_id: &str) -> Result<RandomForestModel> {
        read_json(&self.model_path(version_id)?, version_id)
    }

    pub fn save_scaler(&self, version_id: &str, params: &ScalingParameters) -> Result<PathBuf> {
        let path = self.scaler_path(version_id)?;
        write_json(&path, params)?;
        Ok(path)
    }

    /// `None`, если версия обучалась без масштабирования
    pub fn load_scaler(&self, version_id: &str) -> Result<Option<ScalingParameters>> {
        let path = self.scaler_path(version_id)?;
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path, version_id).map(Some)
    }

    /// Диапазон темпа, по которому считается `tempo_normalized` для новых треков
    pub fn save_tempo_range(&self, version_id: &str, range: &TempoRange) -> Result<PathBuf> {
        let path = self.tempo_range_path(version_id)?;
        write_json(&path, range)?;
        Ok(path)
    }

    pub fn load_tempo_range(&self, version_id: &str) -> Result<TempoRange> {
        read_json(&self.tempo_range_path(version_id)?, version_id)
    }

    /// Убирает параметры масштабирования от прошлого запуска той же версии
    pub fn remove_scaler(&self, version_id: &str) -> Result<()> {
        let path = self.scaler_path(version_id)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| Ok(serde_json::to_writer(writer, value)?))
}

fn read_json<T: DeserializeOwned>(path: &Path, version_id: &str) -> Result<T> {
    if !path.exists() {
        return Err(PipelineError::VersionNotFound(version_id.to_string()));
    }
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
