//! On-disk formats produced and consumed by the pipeline.
//!
//! - `ini`: the rendered `global.ini` document (BOM, sorted `key=value` lines).
//! - JSON snapshots are plain `Vec<Entry>` arrays; see [`crate::types::Entry`].

pub mod ini;

// Reexporting the formats for easier access
pub use ini::{BOM, Format as IniDocument, Pair as IniPair, repair_nbsp};
