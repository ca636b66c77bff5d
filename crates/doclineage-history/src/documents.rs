//! Mapping repository paths to document identifiers.

use doclineage_core::{DocumentsConfig, LineageError};
use regex::Regex;

/// Decides which paths are documents and extracts their identifiers.
///
/// # Examples
///
/// ```
/// use doclineage_core::DocumentsConfig;
/// use doclineage_history::documents::DocumentPattern;
///
/// let pattern = DocumentPattern::new(&DocumentsConfig::default()).unwrap();
/// assert_eq!(pattern.identifier("EIPS/eip-1559.md").as_deref(), Some("1559"));
/// assert_eq!(pattern.identifier("assets/eip-1559/diagram.png"), None);
/// assert_eq!(pattern.identifier("README.md"), None);
/// ```
#[derive(Debug, Clone)]
pub struct DocumentPattern {
    directories: Vec<String>,
    regex: Regex,
}

impl DocumentPattern {
    /// Compile the configured pattern.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Pattern`] if the regex is invalid or has no
    /// capture group.
    pub fn new(config: &DocumentsConfig) -> Result<Self, LineageError> {
        let regex = Regex::new(&config.pattern)
            .map_err(|e| LineageError::Pattern(format!("{}: {e}", config.pattern)))?;
        if regex.captures_len() < 2 {
            return Err(LineageError::Pattern(format!(
                "{}: pattern needs a capture group for the identifier",
                config.pattern
            )));
        }
        let directories = config
            .directories
            .iter()
            .map(|d| d.trim_matches('/').to_string())
            .filter(|d| !d.is_empty())
            .collect();
        Ok(Self { directories, regex })
    }

    /// Directories to restrict tree diffs to. Empty means the whole tree.
    pub fn directories(&self) -> &[String] {
        &self.directories
    }

    /// Identifier of the document at `path`, or `None` if it is not a document.
    pub fn identifier(&self, path: &str) -> Option<String> {
        if !self.in_scope(path) {
            return None;
        }
        self.regex
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Whether `path` is a document path.
    pub fn is_document(&self, path: &str) -> bool {
        self.identifier(path).is_some()
    }

    fn in_scope(&self, path: &str) -> bool {
        if self.directories.is_empty() {
            return true;
        }
        self.directories.iter().any(|dir| {
            path.strip_prefix(dir.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(dirs: &[&str], regex: &str) -> DocumentPattern {
        DocumentPattern::new(&DocumentsConfig {
            directories: dirs.iter().map(|d| d.to_string()).collect(),
            pattern: regex.into(),
            ..DocumentsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn default_pattern_accepts_eips_and_ercs() {
        let p = DocumentPattern::new(&DocumentsConfig::default()).unwrap();
        assert_eq!(p.identifier("EIPS/eip-20.md").as_deref(), Some("20"));
        assert_eq!(p.identifier("ERCS/erc-721.md").as_deref(), Some("721"));
        assert_eq!(p.identifier("EIPS/EIP-4844.md").as_deref(), Some("4844"));
    }

    #[test]
    fn paths_outside_directories_are_ignored() {
        let p = DocumentPattern::new(&DocumentsConfig::default()).unwrap();
        assert_eq!(p.identifier("drafts/eip-20.md"), None);
        assert_eq!(p.identifier("EIPSX/eip-20.md"), None);
    }

    #[test]
    fn empty_directories_means_whole_tree() {
        let p = pattern(&[], r"doc-(\w+)\.md$");
        assert_eq!(p.identifier("a/b/doc-A.md").as_deref(), Some("A"));
        assert!(p.directories().is_empty());
    }

    #[test]
    fn directory_slashes_are_trimmed() {
        let p = pattern(&["/docs/"], r"doc-(\w+)\.md$");
        assert_eq!(p.directories(), ["docs"]);
        assert!(p.is_document("docs/doc-A.md"));
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        let err = DocumentPattern::new(&DocumentsConfig {
            directories: vec![],
            pattern: r"doc-\w+\.md$".into(),
            ..DocumentsConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, LineageError::Pattern(_)));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = DocumentPattern::new(&DocumentsConfig {
            directories: vec![],
            pattern: "(unclosed".into(),
            ..DocumentsConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("invalid document pattern"));
    }
}
