//! # 姿态文件
//!
//! JSON 格式：姿态名 → (舵机名 → 位置)。
//!
//! ```json
//! {
//!   "rest": { "servo6": 1200 },
//!   "talk": { "servo6": 1650 }
//! }
//! ```
//!
//! 写入采用读-改-写 + 原子替换（同目录临时文件再 rename），
//! 更新一个姿态不会破坏其他姿态，写到一半崩溃也不会留下截断的文件。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// 姿态文件错误
#[derive(Error, Debug)]
pub enum PoseFileError {
    #[error("Pose file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed pose file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 一个姿态：舵机名 → 目标位置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    positions: BTreeMap<String, u16>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, servo: impl Into<String>, position: u16) {
        self.positions.insert(servo.into(), position);
    }

    pub fn get(&self, servo: &str) -> Option<u16> {
        self.positions.get(servo).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.positions.iter().map(|(name, &pos)| (name.as_str(), pos))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for Pose {
    fn from_iter<I: IntoIterator<Item = (S, u16)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// 姿态文件内容
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseFile {
    poses: BTreeMap<String, Pose>,
}

impl PoseFile {
    /// 读取姿态文件；文件不存在视为没有任何姿态
    pub fn load(path: &Path) -> Result<Self, PoseFileError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Pose file {} not found, starting empty", path.display());
                return Ok(Self::default());
            },
            Err(source) => {
                return Err(PoseFileError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            },
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content).map_err(|source| PoseFileError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 原子写入（同目录临时文件 + rename）
    pub fn save(&self, path: &Path) -> Result<(), PoseFileError> {
        let io_err = |source: std::io::Error| PoseFileError::Io {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string_pretty(self).map_err(|source| PoseFileError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        debug!("Saved {} poses to {}", self.poses.len(), path.display());
        Ok(())
    }

    /// 读-改-写：更新一个姿态，保留其他姿态
    ///
    /// 返回被覆盖的旧姿态。
    pub fn upsert(path: &Path, name: &str, pose: Pose) -> Result<Option<Pose>, PoseFileError> {
        let mut file = Self::load(path)?;
        let previous = file.insert(name, pose);
        file.save(path)?;
        Ok(previous)
    }

    pub fn get(&self, name: &str) -> Option<&Pose> {
        self.poses.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, pose: Pose) -> Option<Pose> {
        self.poses.insert(name.into(), pose)
    }

    pub fn remove(&mut self, name: &str) -> Option<Pose> {
        self.poses.remove(name)
    }

    /// 姿态名（字典序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.poses.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}
