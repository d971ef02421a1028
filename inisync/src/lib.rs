#![forbid(unsafe_code)]
//! Game localization builds from a remote translation corpus.
//!
//! Fetches translation files from a Paratranz-style service, merges the
//! content files by precedence, layers override rule sets on top and encodes
//! the result as `global.ini` documents (UTF-8 BOM, sorted `key=value` lines).
//! The reverse direction decodes a shipped document back into a JSON snapshot
//! and diffs it against the remote corpus.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use inisync::{ParatranzClient, PipelineOptions, pipeline};
//!
//! # async fn run() -> Result<(), inisync::Error> {
//! let client = ParatranzClient::new("https://paratranz.cn/api", 8340, "token")?;
//! let output = pipeline::render(Arc::new(client), &PipelineOptions::default()).await?;
//! pipeline::write_renderings("output", "global.ini", &output.renderings)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Stages
//!
//! - [`classify`]: baseline override, named override rules, content files
//! - [`merge`]: one key to entry mapping, highest remote id wins
//! - [`layering`]: baseline overrides under each named rule set
//! - [`formats::ini`]: encoding and decoding of `global.ini`
//! - [`diff`]: whitespace-insensitive snapshot comparison
//! - [`check`]: structural consistency of translations

pub mod check;
pub mod classify;
pub mod diff;
pub mod error;
pub mod formats;
pub mod layering;
pub mod merge;
pub mod pipeline;
pub mod remote;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    classify::{BaselinePolicy, Classified, FetchedFile, RuleSelector, classify},
    diff::{MissingPolicy, diff_snapshots},
    error::Error,
    formats::IniDocument,
    layering::layer_overrides,
    merge::{Anchored, TieBreak, anchor_to_base, merge_content},
    pipeline::{PipelineOptions, Rendering},
    remote::ParatranzClient,
    traits::{CorpusReader, Parser},
    types::{Entry, MergedMapping, OverrideMapping, RemoteEntry, SourceFile, TextField},
};
