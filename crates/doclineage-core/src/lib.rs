//! Core types, configuration, and error handling for doclineage.
//!
//! This crate provides the shared foundation used by the history miner and
//! the command-line front end:
//! - [`LineageError`] — unified error type using `thiserror`
//! - [`LineageConfig`] — configuration loaded from `.doclineage.toml`
//! - Shared types: [`DocumentMetadata`], [`Stamp`], [`LifecycleField`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CatalogConfig, DocumentsConfig, LineageConfig, MatchingConfig, StatusConfig,
};
pub use error::LineageError;
pub use types::{DocumentMetadata, LifecycleField, OutputFormat, Stamp};
