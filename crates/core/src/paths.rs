use std::path::PathBuf;

/// Overrides the base directory (default `~/.uranus`).
pub const HOME_ENV: &str = "URANUS_HOME";
/// Overrides the config file location.
pub const CONFIG_ENV: &str = "URANUS_CONFIG";

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        if let Some(base) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self { base: PathBuf::from(base) };
        }
        let base = dirs::home_dir()
            .map(|h| h.join(".uranus"))
            .unwrap_or_else(|| PathBuf::from(".uranus"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        match std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => self.base.join("config.json"),
        }
    }

    pub fn workspace(&self) -> PathBuf {
        self.base.join("workspace")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.base.join("sessions")
    }

    pub fn session_file(&self, session_key: &str) -> PathBuf {
        let safe_key = session_key.replace([':', '/', '\\'], "_");
        self.sessions_dir().join(format!("{}.jsonl", safe_key))
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.base.join("audit")
    }

    pub fn log_file(&self) -> PathBuf {
        self.base.join("uranus.log")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.workspace())?;
        std::fs::create_dir_all(self.sessions_dir())?;
        std::fs::create_dir_all(self.audit_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_file_sanitizes_key() {
        let paths = Paths::with_base(PathBuf::from("/tmp/uranus"));
        assert_eq!(
            paths.session_file("cli:default"),
            PathBuf::from("/tmp/uranus/sessions/cli_default.jsonl")
        );
        assert_eq!(
            paths.session_file("a/b\\c"),
            PathBuf::from("/tmp/uranus/sessions/a_b_c.jsonl")
        );
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = Paths::with_base(dir.path().join("home"));
        paths.ensure_dirs().unwrap();
        assert!(paths.workspace().is_dir());
        assert!(paths.sessions_dir().is_dir());
        assert!(paths.audit_dir().is_dir());
    }
}
