//! Реестр версий: хранилище метаданных по id версии

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};
use crate::types::{Hyperparameters, Metrics, SampleCounts, VersionRecord};

const RECORD_PREFIX: &str = "metrics_";
const RECORD_EXT: &str = ".json";

/// Каталог с файлами `metrics_<version>.json`. Не рассчитан на
/// одновременную запись одной версии из нескольких процессов.
pub struct VersionRegistry {
    root: PathBuf,
}

impl VersionRegistry {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save(
        &self,
        version_id: &str,
        metrics: &Metrics,
        features: &[String],
        hyperparameters: &Hyperparameters,
        counts: SampleCounts,
    ) -> Result<VersionRecord> {
        self.save_with_notes(version_id, metrics, features, hyperparameters, counts, None)
    }

    /// Повторное сохранение той же версии перезаписывает запись (с предупреждением)
    pub fn save_with_notes(
        &self,
        version_id: &str,
        metrics: &Metrics,
        features: &[String],
        hyperparameters: &Hyperparameters,
        counts: SampleCounts,
        notes: Option<&str>,
    ) -> Result<VersionRecord> {
        let path = self.record_path(version_id)?;

        let record = VersionRecord {
            version: version_id.to_string(),
            timestamp: Utc::now(),
            rmse: metrics.rmse,
            mae: metrics.mae,
            r2: metrics.r2,
            features: features.to_vec(),
            n_features: features.len(),
            hyperparameters: hyperparameters.clone(),
            n_train: counts.n_train,
            n_test: counts.n_test,
            notes: notes.map(str::to_string),
        };

        if path.exists() {
            tracing::warn!(
                "Overwriting existing version record {} at {}",
                version_id,
                path.display()
            );
        }

        write_atomic(&path, |writer| Ok(serde_json::to_writer_pretty(writer, &record)?))?;
        tracing::info!("Saved version record {} to {}", version_id, path.display());

        Ok(record)
    }

    pub fn load(&self, version_id: &str) -> Result<VersionRecord> {
        let path = self.record_path(version_id)?;
        if !path.exists() {
            return Err(PipelineError::VersionNotFound(version_id.to_string()));
        }

        let file = File::open(&path)?;
        let record = serde_json::from_reader(BufReader::new(file))?;
        Ok(record)
    }

    pub fn contains(&self, version_id: &str) -> bool {
        self.record_path(version_id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Известные версии в естественном порядке id: v2 раньше v10.
    /// Файлы с недопустимым id (например `metrics_.json`) пропускаются.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name
                .strip_prefix(RECORD_PREFIX)
                .and_then(|rest| rest.strip_suffix(RECORD_EXT))
            {
                if validate_version_id(id).is_ok() {
                    versions.push(id.to_string());
                }
            }
        }
        versions.sort();
        versions.sort_by_cached_key(|id| natural_key(id));
        Ok(versions)
    }

    fn record_path(&self, version_id: &str) -> Result<PathBuf> {
        validate_version_id(version_id)?;
        Ok(self.root.join(format!("{}{}{}", RECORD_PREFIX, version_id, RECORD_EXT)))
    }
}

/// id версии становится частью имени файла
pub(crate) fn validate_version_id(version_id: &str) -> Result<()> {
    let valid = !version_id.is_empty()
        && version_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && version_id != "."
        && version_id != "..";

    if valid {
        Ok(())
    } else {
        Err(PipelineError::invalid(
            "version",
            version_id,
            "allowed characters are [A-Za-z0-9._-]",
        ))
    }
}

/// Пишет во временный файл в том же каталоге и переименовывает его поверх
/// `path`, так что читатель видит либо старый файл, либо новый целиком
pub(crate) fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut dyn Write) -> Result<()>,
) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum IdChunk {
    Num(u64),
    Text(String),
}

fn natural_key(id: &str) -> Vec<IdChunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut digits = false;

    for c in id.chars() {
        if !current.is_empty() && c.is_ascii_digit() != digits {
            chunks.push(to_chunk(std::mem::take(&mut current), digits));
        }
        digits = c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(to_chunk(current, digits));
    }
    chunks
}

fn to_chunk(text: String, digits: bool) -> IdChunk {
    match text.parse() {
        Ok(n) if digits => IdChunk::Num(n),
        _ => IdChunk::Text(text),
    }
}
