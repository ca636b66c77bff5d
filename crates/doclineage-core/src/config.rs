use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LineageError;

/// Top-level configuration loaded from `.doclineage.toml`.
///
/// Every section is optional; an empty file yields the defaults, which are
/// tuned for the Ethereum EIP/ERC repositories.
///
/// # Examples
///
/// ```
/// use doclineage_core::LineageConfig;
///
/// let config = LineageConfig::default();
/// assert_eq!(config.matching.threshold, 0.5);
/// assert_eq!(config.status.field, "status");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Which paths hold documents and how identifiers are extracted.
    #[serde(default)]
    pub documents: DocumentsConfig,
    /// Status vocabulary.
    #[serde(default)]
    pub status: StatusConfig,
    /// Rename detection tuning.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Post-walk presentation settings.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl LineageConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Io`] if the file cannot be read,
    /// [`LineageError::Toml`] if the content is not valid TOML, or
    /// [`LineageError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use doclineage_core::LineageConfig;
    /// use std::path::Path;
    ///
    /// let config = LineageConfig::from_file(Path::new(".doclineage.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LineageError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Toml`] if parsing fails, or
    /// [`LineageError::Config`] if the matching threshold is not in `0.0..=1.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use doclineage_core::LineageConfig;
    ///
    /// let toml = r#"
    /// [documents]
    /// directories = ["docs"]
    /// "#;
    /// let config = LineageConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.documents.directories, vec!["docs"]);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LineageError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LineageError> {
        if !(0.0..=1.0).contains(&self.matching.threshold) {
            return Err(LineageError::Config(format!(
                "matching.threshold must be between 0.0 and 1.0, got {}",
                self.matching.threshold
            )));
        }
        if self.status.field.is_empty() {
            return Err(LineageError::Config("status.field must not be empty".into()));
        }
        Ok(())
    }
}

/// Where documents live and how their identifiers are derived from paths.
///
/// # Examples
///
/// ```
/// use doclineage_core::DocumentsConfig;
///
/// let config = DocumentsConfig::default();
/// assert_eq!(config.directories, vec!["EIPS", "ERCS"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Repository-relative directories scanned for documents. Empty means the whole tree.
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,
    /// Regex applied to a document path; the first capture group is the identifier.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Treat lifecycle dates declared in the header (e.g. `created:`) as
    /// already determined when deciding whether a document is complete.
    #[serde(default = "default_trust_declared_dates")]
    pub trust_declared_dates: bool,
}

fn default_directories() -> Vec<String> {
    vec!["EIPS".into(), "ERCS".into()]
}

fn default_pattern() -> String {
    r"(?i)(?:eip|erc)-(\w+)\.md$".into()
}

fn default_trust_declared_dates() -> bool {
    true
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            pattern: default_pattern(),
            trust_declared_dates: default_trust_declared_dates(),
        }
    }
}

/// Status vocabulary used to detect status changes and finalization.
///
/// # Examples
///
/// ```
/// use doclineage_core::StatusConfig;
///
/// let config = StatusConfig::default();
/// assert!(config.is_terminal("Final"));
/// assert!(!config.is_terminal("Draft"));
/// assert!(config.is_stub("Moved"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Header key holding the status (default: `status`).
    #[serde(default = "default_status_field")]
    pub field: String,
    /// Statuses a document reaches when finalized.
    #[serde(default = "default_terminal")]
    pub terminal: Vec<String>,
    /// Statuses marking redirect stubs whose versions are ignored.
    #[serde(default = "default_skip")]
    pub skip: Vec<String>,
}

fn default_status_field() -> String {
    "status".into()
}

fn default_terminal() -> Vec<String> {
    vec!["Final".into(), "Living".into()]
}

fn default_skip() -> Vec<String> {
    vec!["Moved".into()]
}

impl StatusConfig {
    /// Whether `status` is one of the terminal statuses.
    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal.iter().any(|s| s == status)
    }

    /// Whether `status` marks a redirect stub.
    pub fn is_stub(&self, status: &str) -> bool {
        self.skip.iter().any(|s| s == status)
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            field: default_status_field(),
            terminal: default_terminal(),
            skip: default_skip(),
        }
    }
}

/// Rename detection tuning.
///
/// # Examples
///
/// ```
/// use doclineage_core::MatchingConfig;
///
/// let config = MatchingConfig::default();
/// assert_eq!(config.binary_probe_bytes, 8000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum Jaccard similarity of line sets for an add/remove pair to be a rename.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Number of leading bytes probed for NUL when deciding whether a blob is text.
    #[serde(default = "default_binary_probe_bytes")]
    pub binary_probe_bytes: usize,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_binary_probe_bytes() -> usize {
    8000
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            binary_probe_bytes: default_binary_probe_bytes(),
        }
    }
}

/// Presentation settings applied after the walk.
///
/// # Examples
///
/// ```
/// use doclineage_core::CatalogConfig;
///
/// let config = CatalogConfig::default();
/// assert_eq!(config.types.len(), 3);
/// assert!(config.categories["Standards Track"].contains(&"ERC".to_string()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Document types, in listing order.
    #[serde(default = "default_types")]
    pub types: Vec<String>,
    /// Categories for types that are subdivided.
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<String, Vec<String>>,
    /// Identifiers dropped from the final catalog.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Title prefix used for documents whose category has no entry in `title_prefixes`.
    #[serde(default = "default_title_prefix")]
    pub default_title_prefix: String,
    /// Title prefix per category (e.g. `ERC = "ERC"`).
    #[serde(default = "default_title_prefixes")]
    pub title_prefixes: BTreeMap<String, String>,
}

fn default_types() -> Vec<String> {
    vec![
        "Standards Track".into(),
        "Informational".into(),
        "Meta".into(),
    ]
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    let mut categories = BTreeMap::new();
    categories.insert(
        "Standards Track".into(),
        vec![
            "Core".into(),
            "ERC".into(),
            "Interface".into(),
            "Networking".into(),
        ],
    );
    categories
}

fn default_title_prefix() -> String {
    "EIP".into()
}

fn default_title_prefixes() -> BTreeMap<String, String> {
    let mut prefixes = BTreeMap::new();
    prefixes.insert("ERC".into(), "ERC".into());
    prefixes
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            types: default_types(),
            categories: default_categories(),
            exclude: Vec::new(),
            default_title_prefix: default_title_prefix(),
            title_prefixes: default_title_prefixes(),
        }
    }
}
