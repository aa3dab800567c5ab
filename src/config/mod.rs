//! Runtime settings and the session configuration store.
//!
//! Settings come from the environment, with `.env` loaded first:
//!
//! - `CMSIM_CONFIG_DIR`: directory of session JSON files (default `.cmsim`)
//! - `CMSIM_DATA_DIR`: directory with `cdf.csv`, `performance.csv` and
//!   `totals.csv`; synthetic statistics are used when unset

use std::path::PathBuf;

pub mod store;

pub use store::*;

pub const CONFIG_DIR_VAR: &str = "CMSIM_CONFIG_DIR";
pub const DATA_DIR_VAR: &str = "CMSIM_DATA_DIR";
pub const DEFAULT_CONFIG_DIR: &str = ".cmsim";
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_vars(
            std::env::var(CONFIG_DIR_VAR).ok(),
            std::env::var(DATA_DIR_VAR).ok(),
        )
    }

    fn from_vars(config_dir: Option<String>, data_dir: Option<String>) -> Self {
        let config_dir = config_dir
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
        Self {
            config_dir: PathBuf::from(config_dir),
            data_dir: data_dir.filter(|s| !s.trim().is_empty()).map(PathBuf::from),
        }
    }

    pub fn store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset_or_blank() {
        let s = Settings::from_vars(None, Some("  ".to_string()));
        assert_eq!(s.config_dir, PathBuf::from(".cmsim"));
        assert_eq!(s.data_dir, None);
    }

    #[test]
    fn explicit_dirs_win() {
        let s = Settings::from_vars(Some("/tmp/sessions".into()), Some("data/fico".into()));
        assert_eq!(s.config_dir, PathBuf::from("/tmp/sessions"));
        assert_eq!(s.data_dir, Some(PathBuf::from("data/fico")));
        assert_eq!(s.store().dir(), PathBuf::from("/tmp/sessions").as_path());
    }
}
