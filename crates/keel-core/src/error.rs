use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Context resolution ──
    #[error("failed to resolve project directory {path}")]
    ProjectDirResolve {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot derive an app name from {path}; pass --app or set [app].name in keel.toml")]
    NoAppName { path: PathBuf },

    // ── Stored records ──
    #[error("record {id:?} is missing required attribute '{attribute}'")]
    MissingAttribute { id: String, attribute: &'static str },

    #[error("record {id:?} has malformed created timestamp {value:?}")]
    MalformedTimestamp {
        id: String,
        value: String,
        source: chrono::ParseError,
    },
}
