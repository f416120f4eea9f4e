//! Configuration for reconbot.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (RECONBOT_HOME, RECONBOT_REGISTRY,
//!    RECONBOT_BRIDGE_USER, RECONBOT_BRIDGE_PASSWORD)
//! 2. Config file (explicit `--config`, else `.reconbot/config.yaml` found in
//!    the current directory or a parent)
//! 3. Defaults (~/.reconbot)
//!
//! The resolved configuration is an ordinary value handed to constructors.
//! Nothing in the crate reads it from ambient state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::poll::PollPolicy;
use crate::domain::RequestType;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub branch_codes: BTreeMap<String, String>,
    #[serde(default)]
    pub request_types: Option<RequestTypeLabels>,
    #[serde(default)]
    pub registry: Option<RegistrySettings>,
    #[serde(default)]
    pub delimiters: Option<DelimiterSets>,
    #[serde(default)]
    pub bridge: Option<BridgeSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Working root (relative to the directory holding `.reconbot/`)
    pub home: Option<String>,
    /// Registry CSV export (relative to the same base)
    pub registry: Option<String>,
}

/// Branch name to external branch code lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchCodes(BTreeMap<String, String>);

impl BranchCodes {
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    /// Look up a branch code; exact key first, then trimmed case-insensitive
    pub fn lookup(&self, branch: &str) -> Option<&str> {
        if let Some(code) = self.0.get(branch) {
            return Some(code.as_str());
        }
        let wanted = branch.trim().to_lowercase();
        self.0
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == wanted)
            .map(|(_, code)| code.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, code)| (name.as_str(), code.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BranchCodes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Form-type labels accepted for each resolution policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTypeLabels {
    #[serde(default = "default_single_counterparty_labels")]
    pub single_counterparty: Vec<String>,
    #[serde(default = "default_single_contract_labels")]
    pub single_contract: Vec<String>,
    #[serde(default = "default_full_inventory_labels")]
    pub full_inventory: Vec<String>,
}

fn default_single_counterparty_labels() -> Vec<String> {
    vec![
        "По одному контрагенту по всем договорам".to_string(),
        "single counterparty all contracts".to_string(),
    ]
}
fn default_single_contract_labels() -> Vec<String> {
    vec![
        "По одному договору".to_string(),
        "single contract".to_string(),
    ]
}
fn default_full_inventory_labels() -> Vec<String> {
    vec![
        "Годовая инвентаризация (по всем контрагентам и договорам)".to_string(),
        "full inventory".to_string(),
    ]
}

impl Default for RequestTypeLabels {
    fn default() -> Self {
        Self {
            single_counterparty: default_single_counterparty_labels(),
            single_contract: default_single_contract_labels(),
            full_inventory: default_full_inventory_labels(),
        }
    }
}

impl RequestTypeLabels {
    /// Map a form-type label to its policy (exact match after trimming)
    pub fn classify(&self, label: &str) -> Option<RequestType> {
        let label = label.trim();
        let hit = |labels: &[String]| labels.iter().any(|l| l.trim() == label);

        if hit(&self.single_counterparty) {
            Some(RequestType::SingleCounterparty)
        } else if hit(&self.single_contract) {
            Some(RequestType::SingleContract)
        } else if hit(&self.full_inventory) {
            Some(RequestType::FullInventory)
        } else {
            None
        }
    }
}

/// Registry export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// The two registry status values inventory tasks are grouped by
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,

    /// Minimum field count for a row to be kept
    #[serde(default = "default_required_columns")]
    pub required_columns: usize,
}

fn default_statuses() -> Vec<String> {
    vec!["EDI".to_string(), "non-EDI".to_string()]
}
fn default_required_columns() -> usize {
    crate::registry::REQUIRED_COLUMNS
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            required_columns: default_required_columns(),
        }
    }
}

/// Delimiter sets for free-text list fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterSets {
    /// Separators inside the registry's personnel-number field
    #[serde(default = "default_signatory_delimiters")]
    pub signatory: Vec<char>,

    /// Separators inside the request's contract-reference field
    #[serde(default = "default_contract_delimiters")]
    pub contract: Vec<char>,
}

fn default_signatory_delimiters() -> Vec<char> {
    vec![';', '\\', '/']
}
fn default_contract_delimiters() -> Vec<char> {
    vec![';', ',', '/', '\\', '\n', '\r', '\t', ' ']
}

impl Default for DelimiterSets {
    fn default() -> Self {
        Self {
            signatory: default_signatory_delimiters(),
            contract: default_contract_delimiters(),
        }
    }
}

/// External session bridge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Automation helper binary
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Extra leading arguments for every invocation
    #[serde(default)]
    pub args: Vec<String>,

    /// System stage to connect to
    #[serde(default)]
    pub stage: Option<String>,

    /// Timeout for a single bridge call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,

    /// Login user (usually from RECONBOT_BRIDGE_USER)
    #[serde(default)]
    pub user: Option<String>,

    /// Login password (RECONBOT_BRIDGE_PASSWORD only; never printed)
    #[serde(skip_serializing, default)]
    pub password: Option<String>,

    /// Status-bar texts meaning the session is unusable
    #[serde(default = "default_blocking_markers")]
    pub blocking_markers: Vec<String>,

    /// Status-bar texts meaning a report came back empty
    #[serde(default = "default_no_data_markers")]
    pub no_data_markers: Vec<String>,

    /// Text present in an exported error list that has no rows
    #[serde(default = "default_export_sentinel")]
    pub export_sentinel: String,

    /// Wait policy for the save dialog
    #[serde(default)]
    pub save_dialog: PollPolicy,
}

fn default_bridge_command() -> String {
    "recon-bridge".to_string()
}
fn default_call_timeout() -> u64 {
    120
}
fn default_blocking_markers() -> Vec<String> {
    vec!["Этот мандант сейчас блокирован для регистрации в нём.".to_string()]
}
fn default_no_data_markers() -> Vec<String> {
    vec!["не найдены".to_string(), "not found".to_string()]
}
fn default_export_sentinel() -> String {
    "Список не содержит данных".to_string()
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: Vec::new(),
            stage: None,
            call_timeout_seconds: default_call_timeout(),
            user: None,
            password: None,
            blocking_markers: default_blocking_markers(),
            no_data_markers: default_no_data_markers(),
            export_sentinel: default_export_sentinel(),
            save_dialog: PollPolicy::default(),
        }
    }
}

/// Request folder layout under `<home>/data/requests`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestFolders {
    pub input: PathBuf,
    pub error: PathBuf,
    pub output: PathBuf,
    pub logs: PathBuf,
    pub temp: PathBuf,
}

impl RequestFolders {
    pub fn under(home: &Path) -> Self {
        let root = home.join("data").join("requests");
        Self {
            input: root.join("input"),
            error: root.join("error"),
            output: root.join("output"),
            logs: root.join("logs"),
            temp: root.join("temp"),
        }
    }

    /// Create any missing folder
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.input, &self.error, &self.output, &self.logs, &self.temp] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create folder: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Working root
    pub home: PathBuf,
    /// Registry CSV export
    pub registry_path: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub folders: RequestFolders,
    pub branch_codes: BranchCodes,
    pub request_types: RequestTypeLabels,
    pub registry: RegistrySettings,
    pub delimiters: DelimiterSets,
    pub bridge: BridgeSettings,
}

impl ResolvedConfig {
    /// Defaults rooted at `home`
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            registry_path: home.join("registry.csv"),
            folders: RequestFolders::under(&home),
            home,
            config_file: None,
            branch_codes: BranchCodes::default(),
            request_types: RequestTypeLabels::default(),
            registry: RegistrySettings::default(),
            delimiters: DelimiterSets::default(),
            bridge: BridgeSettings::default(),
        }
    }

    /// Lock file guarding against a second concurrent process
    pub fn lock_path(&self) -> PathBuf {
        self.home.join("reconbot.lock")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".reconbot").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file over the defaults
fn resolve(file: ConfigFile, config_path: &Path, default_home: PathBuf) -> ResolvedConfig {
    // Base directory is the parent of .reconbot/ (i.e., grandparent of config.yaml)
    let base_dir = config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."));

    let home = file
        .paths
        .home
        .as_deref()
        .map(|h| resolve_path(base_dir, h))
        .unwrap_or(default_home);

    let mut config = ResolvedConfig::with_home(home);
    if let Some(ref registry) = file.paths.registry {
        config.registry_path = resolve_path(base_dir, registry);
    }
    config.config_file = Some(config_path.to_path_buf());
    config.branch_codes = BranchCodes::new(file.branch_codes);
    config.request_types = file.request_types.unwrap_or_default();
    config.registry = file.registry.unwrap_or_default();
    config.delimiters = file.delimiters.unwrap_or_default();
    config.bridge = file.bridge.unwrap_or_default();
    config
}

/// Apply environment overrides
fn apply_env(config: &mut ResolvedConfig) {
    if let Ok(home) = std::env::var("RECONBOT_HOME") {
        config.home = PathBuf::from(home);
        config.folders = RequestFolders::under(&config.home);
    }
    if let Ok(registry) = std::env::var("RECONBOT_REGISTRY") {
        config.registry_path = PathBuf::from(registry);
    }
    if let Ok(user) = std::env::var("RECONBOT_BRIDGE_USER") {
        config.bridge.user = Some(user);
    }
    if let Ok(password) = std::env::var("RECONBOT_BRIDGE_PASSWORD") {
        config.bridge.password = Some(password);
    }
}

/// Load configuration from all sources
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".reconbot");

    let config_file = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let mut config = match config_file {
        Some(ref path) => resolve(load_config_file(path)?, path, default_home),
        None => ResolvedConfig::with_home(default_home),
    };

    apply_env(&mut config);
    Ok(config)
}
