//! Git history mining for document lifecycle metadata.
//!
//! Walks the first-parent history of one or more repositories newest-first,
//! classifies per-commit document changes, detects renames by line-set
//! similarity, maintains an alias table for retired identifiers, and
//! accumulates creation, update, status-change and finalization dates for
//! every canonical document.

pub mod accumulator;
pub mod catalog;
pub mod differ;
pub mod documents;
pub mod engine;
pub mod frontmatter;
pub mod listing;
pub mod matcher;
pub mod resolver;
pub mod walker;

pub use engine::{Engine, MiningOutput, RepoSource, WalkStats};
pub use resolver::{AliasTable, Resolution};

#[cfg(test)]
mod test_support;
