use facekit_core::ScoringConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid listen address {0:?}")]
    ListenAddr(String),
}

/// Settings for the generative-AI backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    /// Base URL; requests go to `{base_url}/models/{model}:generateContent`.
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

/// Daemon configuration: defaults, then an optional TOML file, then
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding face previews and pixel vectors.
    pub dataset_dir: PathBuf,
    /// Minimum AI confidence (0–100) for a recognition match.
    pub match_threshold: f64,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    pub gemini: GeminiConfig,
    pub scoring: ScoringConfig,
}

/// Shape of the optional `FACEKIT_CONFIG` TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    listen: Option<String>,
    db_path: Option<PathBuf>,
    dataset_dir: Option<PathBuf>,
    match_threshold: Option<f64>,
    max_upload_bytes: Option<usize>,
    #[serde(default)]
    gemini: FileGemini,
    scoring: Option<ScoringConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileGemini {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_output_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load from `FACEKIT_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var("FACEKIT_CONFIG") {
            Ok(path) => read_file(Path::new(&path))?,
            Err(_) => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Load from a TOML string and a variable lookup, without touching the
    /// process environment.
    pub fn from_sources<F>(toml_src: Option<&str>, vars: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match toml_src {
            Some(src) => toml::from_str(src).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?,
            None => FileConfig::default(),
        };
        Self::resolve(file, vars)
    }

    fn resolve<F>(file: FileConfig, vars: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = vars("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = vars("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facekit");

        let listen = vars("FACEKIT_LISTEN")
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen_addr = listen
            .parse()
            .map_err(|_| ConfigError::ListenAddr(listen.clone()))?;

        let db_path = vars("FACEKIT_DB_PATH")
            .map(PathBuf::from)
            .or(file.db_path)
            .unwrap_or_else(|| data_dir.join("facekit.db"));

        let dataset_dir = vars("FACEKIT_DATASET_DIR")
            .map(PathBuf::from)
            .or(file.dataset_dir)
            .unwrap_or_else(|| data_dir.join("face_dataset"));

        let gemini = GeminiConfig {
            api_key: vars("AI_INTEGRATIONS_GEMINI_API_KEY")
                .or(file.gemini.api_key)
                .filter(|k| !k.is_empty()),
            base_url: vars("AI_INTEGRATIONS_GEMINI_BASE_URL")
                .filter(|u| !u.is_empty())
                .or(file.gemini.base_url)
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            model: vars("FACEKIT_GEMINI_MODEL")
                .or(file.gemini.model)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            max_output_tokens: parsed(&vars, "FACEKIT_MAX_OUTPUT_TOKENS")
                .or(file.gemini.max_output_tokens)
                .unwrap_or(8192),
            timeout_secs: parsed(&vars, "FACEKIT_AI_TIMEOUT_SECS")
                .or(file.gemini.timeout_secs)
                .unwrap_or(60),
        };

        Ok(Self {
            listen_addr,
            db_path,
            dataset_dir,
            match_threshold: parsed(&vars, "FACEKIT_MATCH_THRESHOLD")
                .or(file.match_threshold)
                .unwrap_or(40.0),
            max_upload_bytes: parsed(&vars, "FACEKIT_MAX_UPLOAD_BYTES")
                .or(file.max_upload_bytes)
                .unwrap_or(10 * 1024 * 1024),
            gemini,
            scoring: file.scoring.unwrap_or_default(),
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&src).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an environment value, ignoring it when malformed.
fn parsed<T, F>(vars: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = vars(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}
