//! Core library: location fallback chain, tag suffixes, and the rename pass.

pub mod config;
pub mod error;
pub mod locator;
pub mod models;
pub mod scanner;
pub mod tagger;
