use crate::baton::CircularDependencyError;
use crate::config::ConfigError;
use crate::dag::DagError;
use crate::linker::LinkError;
use j5_source::errpos::PosErrors;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),

    #[error(transparent)]
    Dag(#[from] DagError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("package {0} not found")]
    PackageNotFound(String),

    #[error("file {0} not found in any source")]
    FileNotFound(String),

    #[error("import cycle: {}", .0.join(" -> "))]
    ImportCycle(Vec<String>),

    /// Diagnostics from parsing or converting one source file.
    #[error("{filename}:\n{errors}")]
    Source { filename: String, errors: PosErrors },

    #[error("linking {filename}: {source}")]
    Link {
        filename: String,
        #[source]
        source: LinkError,
    },

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding descriptor set {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: prost::DecodeError,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
