//! Converts externally parsed scene graphs into immutable, engine-ready models.
//!
//! The import side (`flatten`, `skin`, `animation`, `importer`) runs once per file, usually
//! through [`AssetCache`]. The runtime side (`sampler`, `pose`) runs every frame per animated
//! instance and never allocates or blocks.

use std::path::PathBuf;
use std::sync::PoisonError;

pub mod animation;
pub mod cache;
pub mod flatten;
pub mod importer;
pub mod loaders;
pub mod model;
pub mod pose;
pub mod sampler;
pub mod settings;
pub mod skin;
pub mod source;

pub use animation::*;
pub use cache::*;
pub use flatten::*;
pub use importer::*;
pub use loaders::*;
pub use model::*;
pub use pose::*;
pub use sampler::*;
pub use settings::*;
pub use skin::*;
pub use source::*;

pub use rfw_math as math;

#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    LoadError(PathBuf, String),
    NoFileExtension,
    NoImporter(String),
    NoMeshes(PathBuf),
    Importer(String),
    Cancelled,
    LockError,
}

impl<Guard> From<PoisonError<Guard>> for ImportError {
    fn from(_: PoisonError<Guard>) -> Self {
        Self::LockError
    }
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadError(path, reason) => {
                write!(f, "could not load file {}: {}", path.display(), reason)
            }
            Self::NoFileExtension => write!(f, "file had no file extension"),
            Self::NoImporter(ext) => write!(f, "no importer available for {}", ext),
            Self::NoMeshes(path) => write!(f, "{} does not contain any meshes", path.display()),
            Self::Importer(reason) => write!(f, "importer failed: {}", reason),
            Self::Cancelled => write!(f, "import was cancelled"),
            Self::LockError => write!(f, "could not acquire lock"),
        }
    }
}

impl std::error::Error for ImportError {}
