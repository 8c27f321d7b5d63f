//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "EQRES_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "eqres.db";

/// Optional TOML config file contents
///
/// ```toml
/// root_folder = "/srv/eqres"
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse a config file; a missing or malformed file is an error
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    resolve_root_folder_with(cli_arg, env_var_name, find_config_file().as_deref())
}

/// Same as [`resolve_root_folder`] with an explicit config file location
pub fn resolve_root_folder_with(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file {
        match TomlConfig::load(config_path) {
            Ok(TomlConfig {
                root_folder: Some(root),
            }) => return root,
            Ok(_) => {}
            Err(e) => tracing::warn!("Ignoring config file: {}", e),
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the config file for the platform, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("eqres").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/eqres/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("eqres"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/eqres"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("eqres"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/eqres"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("eqres"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\eqres"))
    } else {
        PathBuf::from("./eqres_data")
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: PathBuf,
}

impl RootFolder {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Location of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let cli = PathBuf::from("/tmp/eqres-cli");
        let resolved = resolve_root_folder_with(Some(&cli), "EQRES_TEST_UNSET_VAR", None);
        assert_eq!(resolved, cli);
    }

    #[test]
    fn test_database_path_inside_root() {
        let root = RootFolder::new(PathBuf::from("/srv/eqres"));
        assert_eq!(root.database_path(), PathBuf::from("/srv/eqres/eqres.db"));
    }

    #[test]
    fn test_default_root_folder_not_empty() {
        assert!(!default_root_folder().as_os_str().is_empty());
    }
}
