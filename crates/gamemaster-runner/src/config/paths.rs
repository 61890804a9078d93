use std::path::PathBuf;

/// XDG locations on Unix-like systems, `%APPDATA%` / `%LOCALAPPDATA%` on
/// Windows.
///
/// - Config: $XDG_CONFIG_HOME/{name} (default: ~/.config/{name})
/// - Data: $XDG_DATA_HOME/{name} (default: ~/.local/share/{name})
pub struct ProjectPaths {
    name: String,
}

impl ProjectPaths {
    /// `None` when no home directory can be found
    pub fn new(name: &str) -> Option<Self> {
        home_dir()?;
        Some(ProjectPaths {
            name: name.to_string(),
        })
    }

    pub fn config_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            env_dir("APPDATA")
                .map(|p| p.join(&self.name))
                .unwrap_or_else(|| PathBuf::from(format!(".{}", self.name)))
        }

        #[cfg(not(target_os = "windows"))]
        {
            xdg_dir("XDG_CONFIG_HOME", ".config").join(&self.name)
        }
    }

    /// Holds the `logs/` directory
    pub fn data_dir(&self) -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            env_dir("LOCALAPPDATA")
                .map(|p| p.join(&self.name))
                .unwrap_or_else(|| PathBuf::from(format!(".{}", self.name)))
        }

        #[cfg(not(target_os = "windows"))]
        {
            xdg_dir("XDG_DATA_HOME", ".local/share").join(&self.name)
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    env_dir("HOME").or_else(|| env_dir("USERPROFILE"))
}

fn env_dir(var: &str) -> Option<PathBuf> {
    std::env::var(var).ok().map(PathBuf::from)
}

/// `$var` if set, otherwise `~/fallback`, otherwise `fallback` relative to cwd
#[cfg(not(target_os = "windows"))]
fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    env_dir(var)
        .or_else(|| home_dir().map(|h| h.join(fallback)))
        .unwrap_or_else(|| PathBuf::from(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_contain_name() {
        if let Some(paths) = ProjectPaths::new("gamemaster") {
            assert!(paths.config_dir().to_string_lossy().contains("gamemaster"));
            assert!(paths.data_dir().to_string_lossy().contains("gamemaster"));
        }
    }

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn test_xdg_fallback_ends_with_name() {
        let dir = xdg_dir("GAMEMASTER_TEST_UNSET_VAR", ".config").join("x");
        assert!(dir.to_string_lossy().contains(".config"));
        assert!(dir.ends_with("x"));
    }
}
