//! Output generation modules for digest artifacts.
//!
//! # Submodules
//!
//! - [`media`]: Writes the digest text and audio bytes to date-named files
//! - [`json`]: Writes the [`DigestArtifact`](crate::models::DigestArtifact)
//!   manifest and the `latest.json` pointer
//!
//! # Output Structure
//!
//! ```text
//! docs/en_GB/
//! ├── 2026-08-04.txt       # normalized digest text
//! ├── 2026-08-04.json      # artifact manifest
//! ├── latest.json          # pointer to the newest manifest
//! └── audio/
//!     └── 2026-08-04.mp3   # synthesized audio
//! ```
//!
//! Dated files from earlier runs are superseded, never deleted; only
//! `latest.json` is overwritten.

pub mod json;
pub mod media;
