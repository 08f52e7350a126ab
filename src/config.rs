use std::io::Read as _;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PatError, Result};

/// Maximum config file size. Configs larger than this are rejected before parsing.
const MAX_CONFIG_BYTES: u64 = 1024 * 1024; // 1 MiB

/// Runtime settings threaded through parsing and the editor bridge.
/// The strip level decides how many leading path components are dropped
/// when deriving the names diffs are keyed by.
#[derive(Debug, Clone)]
pub struct Config {
    pub strip_level: usize,
    pub editor: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            strip_level: 1,
            editor: default_editor(),
        }
    }
}

fn default_editor() -> String {
    std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string())
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    version: u32,
    strip_level: Option<usize>,
    editor: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let mut file = std::fs::File::open(path).map_err(|source| PatError::FileRead {
            path: path.into(),
            source,
        })?;
        if file.metadata().map(|m| m.len()).unwrap_or(0) > MAX_CONFIG_BYTES {
            return Err(PatError::ConfigInvalid(
                "config file exceeds 1 MiB size limit".to_string(),
            ));
        }
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|source| PatError::FileRead {
                path: path.into(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&content).map_err(|source| PatError::ConfigParse {
                path: path.into(),
                source,
            })?;
        if file_config.version != 1 {
            return Err(PatError::ConfigInvalid(format!(
                "unsupported version {}",
                file_config.version
            )));
        }
        Ok(Config {
            strip_level: file_config.strip_level.unwrap_or(1),
            editor: file_config.editor.unwrap_or_else(default_editor),
        })
    }

    pub fn load_from_cwd() -> Result<Option<Config>> {
        let path = Path::new("patstack.toml");
        match Config::load(path) {
            Ok(config) => Ok(Some(config)),
            Err(PatError::FileRead { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
