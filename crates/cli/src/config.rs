//! Loads a [`StaticConfig`] from a TOML file, falling back to defaults
//! when no file is given — the same split `oferchen-rsync`'s `daemon`
//! crate uses between a config file and CLI overrides.

use std::path::Path;

use xfer_core::options::StaticConfig;

use crate::CliError;

pub fn load_config(path: Option<&Path>, verbose: u8) -> Result<StaticConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&text).map_err(|source| CliError::ParseConfig {
                path: path.to_path_buf(),
                source,
            })?
        }
        None => StaticConfig::default(),
    };

    if verbose > 0 {
        config.debug_level = config.debug_level.max(verbose);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_falls_back_to_defaults() {
        let config = load_config(None, 0).unwrap();
        assert_eq!(config, StaticConfig::default());
    }

    #[test]
    fn verbose_flag_raises_debug_level() {
        let config = load_config(None, 2).unwrap();
        assert_eq!(config.debug_level, 2);
    }

    #[test]
    fn loads_overrides_from_a_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xfercore.toml");
        std::fs::write(&path, "max_simultaneous_transfers = 4\nidle_disconnect_timeout_secs = 30\n").unwrap();
        let config = load_config(Some(&path), 0).unwrap();
        assert_eq!(config.max_simultaneous_transfers, 4);
        assert_eq!(config.idle_disconnect_timeout_secs, 30);
    }
}
