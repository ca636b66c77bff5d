use std::path::PathBuf;

/// Errors that can occur while mining document history.
///
/// Only unrecoverable conditions are represented here. Per-record problems
/// (malformed front matter, ambiguous renames, alias cycles) are logged and
/// counted by the miner instead of being raised.
///
/// # Examples
///
/// ```
/// use doclineage_core::LineageError;
///
/// let err = LineageError::Config("threshold out of range".into());
/// assert!(err.to_string().contains("threshold out of range"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LineageError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure. History cannot be partially read, so these abort the run.
    #[error("git error: {0}")]
    Git(String),

    /// The configured document identifier pattern is not a valid regex.
    #[error("invalid document pattern: {0}")]
    Pattern(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// No repository exists at the given path.
    #[error("not a git repository: {}", .0.display())]
    #[diagnostic(help("point --repo at a directory containing a git repository"))]
    RepositoryNotFound(PathBuf),
}
