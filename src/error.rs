use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Package manifest not found at {}\n\n\
             Hint: sdkpm edits the package manager's manifest, which lives at\n\
             Packages/manifest.json in the project root.\n\n\
             Example structure:\n\
             MyGame/\n\
             ├── Assets/\n\
             ├── Packages/\n\
             │   └── manifest.json  ← This file is required\n\
             └── ProjectSettings/\n\n\
             Try: sdkpm --project /path/to/your/project <command>\n\
             or set paths.package_manifest in .sdkpm/config.toml",
             .0.display())]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid SDK table: {0}")]
    InvalidRegistry(String),

    #[error("Unknown SDK: {0}")]
    UnknownSdk(String),

    #[error("Invalid mode '{0}'\n\nHint: valid modes are 'prototype' and 'full'")]
    InvalidMode(String),

    #[error("Platform manifest error: {0}")]
    PlatformManifest(String),

    #[error("{0}")]
    Other(String),
}
