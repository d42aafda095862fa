//! Persisted user preferences, following XDG Base Directory standards.
//!
//! The core never touches storage directly. It is handed a [`PreferenceStore`],
//! a narrow string key/value port, and reads typed values through
//! [`Preferences`]. The binary backs the port with a [`FileStore`] under
//! XDG_STATE_HOME; tests use a [`MemoryStore`].

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

use crate::common::constants::{PREF_CALCULATION_METHOD, PREF_LATITUDE, PREF_LONGITUDE, PREF_THEME};
use crate::geo::Coordinate;
use crate::schedule::CalculationMethod;

const PREFERENCES_FILE: &str = "preferences.json";

/// Get the state directory for a given configuration directory.
///
/// State is stored in XDG_STATE_HOME/miqat/{namespace} where namespace is:
/// - "default" for the default config directory
/// - "custom_<hash>" for custom config directories (via --config)
pub fn get_state_dir(config_dir: Option<&Path>) -> Result<PathBuf> {
    let state_home = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local/state")
        });

    let state_base = state_home.join("miqat");

    let namespace = match config_dir {
        None => "default".to_string(),
        Some(path) => {
            let default_config = dirs::config_dir()
                .context("Could not determine config directory")?
                .join("miqat");
            if path == default_config {
                "default".to_string()
            } else {
                get_state_namespace(path)
            }
        }
    };

    Ok(state_base.join(namespace))
}

/// Generate a stable namespace for a custom config directory.
fn get_state_namespace(config_path: &Path) -> String {
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());

    let hash = sha256::digest(canonical.to_string_lossy().as_bytes());
    format!("custom_{}", &hash[..16])
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Key/value persistence port.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Preferences kept as one JSON object on disk.
///
/// The file is read once when opened and rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is reported and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences from {}", path.display()))?;
            match serde_json::from_str(&content) {
                Ok(values) => values,
                Err(e) => {
                    log_warning!(
                        "Ignoring unreadable preferences file {}: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Open the store belonging to a configuration directory.
    pub fn for_config_dir(config_dir: Option<&Path>) -> Result<Self> {
        Self::open(get_state_dir(config_dir)?.join(PREFERENCES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory {}", parent.display()))?;

        let content =
            serde_json::to_string_pretty(values).context("Failed to serialize preferences")?;

        // Replace atomically through a sibling temp file
        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        temp.write_all(content.as_bytes())
            .context("Failed to write preferences")?;
        temp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

/// Volatile store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        lock(&self.values).insert(key.to_string(), value.to_string());
        self
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Colour scheme preference, persisted for the enclosing application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => anyhow::bail!("unknown theme '{other}' (expected light, dark or system)"),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view over a [`PreferenceStore`].
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The persisted method, if one is stored and recognized.
    pub fn stored_calculation_method(&self) -> Option<CalculationMethod> {
        let raw = self.store.get(PREF_CALCULATION_METHOD)?;
        let id: u8 = raw.trim().parse().ok()?;
        CalculationMethod::try_from(id).ok()
    }

    /// The persisted method, ISNA when absent or invalid.
    pub fn calculation_method(&self) -> CalculationMethod {
        self.stored_calculation_method().unwrap_or_default()
    }

    pub fn set_calculation_method(&self, method: CalculationMethod) -> Result<()> {
        self.store
            .set(PREF_CALCULATION_METHOD, &method.id().to_string())
            .context("Failed to persist calculation method")
    }

    pub fn theme(&self) -> Theme {
        self.store
            .get(PREF_THEME)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store
            .set(PREF_THEME, theme.as_str())
            .context("Failed to persist theme")
    }

    /// Last coordinate acquired from the platform, if both halves are valid.
    pub fn cached_coordinate(&self) -> Option<Coordinate> {
        let latitude: f64 = self.store.get(PREF_LATITUDE)?.trim().parse().ok()?;
        let longitude: f64 = self.store.get(PREF_LONGITUDE)?.trim().parse().ok()?;
        Coordinate::new(latitude, longitude).ok()
    }

    pub fn set_cached_coordinate(&self, coordinate: Coordinate) -> Result<()> {
        self.store
            .set(PREF_LATITUDE, &coordinate.latitude.to_string())
            .and_then(|()| {
                self.store
                    .set(PREF_LONGITUDE, &coordinate.longitude.to_string())
            })
            .context("Failed to persist coordinate")
    }

    /// One line per stored preference, as read at startup.
    pub fn summary(&self) -> Vec<String> {
        let method = match self.stored_calculation_method() {
            Some(method) => method.to_string(),
            None => "not set".to_string(),
        };
        let coordinate = match self.cached_coordinate() {
            Some(coordinate) => coordinate.to_string(),
            None => "none".to_string(),
        };
        vec![
            format!("Calculation method: {method}"),
            format!("Theme: {}", self.theme()),
            format!("Cached location: {coordinate}"),
        ]
    }

    /// Log the preferences read at startup.
    pub fn log_preferences(&self) {
        log_block_start!("Preferences");
        for line in self.summary() {
            log_indented!("{}", line);
        }
    }
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("calculation_method", &self.calculation_method())
            .field("theme", &self.theme())
            .finish()
    }
}
