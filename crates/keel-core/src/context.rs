use std::path::Path;

use crate::KeelConfig;

/// The rack and app an operation targets.
///
/// Resolved once per invocation from flags and `keel.toml`, then passed by
/// reference into every build and release operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub rack: String,
    pub app: String,
}

impl AppContext {
    pub fn new(rack: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            rack: rack.into(),
            app: app.into(),
        }
    }

    /// Resolve the context for a project directory.
    ///
    /// Precedence: explicit flag, then `keel.toml`, then (for the app only)
    /// the canonical name of `project_dir`.
    pub fn resolve(
        project_dir: &Path,
        config: &KeelConfig,
        app_flag: Option<&str>,
        rack_flag: Option<&str>,
    ) -> crate::Result<Self> {
        let rack = rack_flag.unwrap_or(&config.rack.name).to_owned();

        if let Some(app) = app_flag.or(config.app.name.as_deref()) {
            return Ok(Self::new(rack, app));
        }

        let resolved =
            std::fs::canonicalize(project_dir).map_err(|e| crate::Error::ProjectDirResolve {
                path: project_dir.to_path_buf(),
                source: e,
            })?;

        let app = resolved
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| crate::Error::NoAppName {
                path: resolved.clone(),
            })?;

        Ok(Self::new(rack, app))
    }

    /// Same rack, different app.
    pub fn with_app(&self, app: impl Into<String>) -> Self {
        Self::new(self.rack.clone(), app)
    }

    pub fn releases_table(&self) -> String {
        format!("{}-{}-releases", self.rack, self.app)
    }

    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.rack, self.app)
    }
}
