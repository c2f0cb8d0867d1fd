//! # Repo Forker
//!
//! Batch-create Bitbucket repository forks from an INI config file.
//!
//! This crate provides:
//! - Loading and validating a fork config (`[USER]`, `[OWNER]` and any
//!   number of `REPO` sections)
//! - A blocking Bitbucket client that creates forks with app-password auth
//! - A sequential executor that forks every entry and tallies the outcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repo_forker::prelude::*;
//!
//! let config = ForkConfig::load(None)?;
//! let forker = Forker::new(config, ForkOptions::new())?;
//!
//! let summary = forker.fork_all();
//! println!("{}", summary);
//! # Ok::<(), repo_forker::error::ForkerError>(())
//! ```
//!
//! ## Dry Run
//!
//! ```rust,no_run
//! use repo_forker::prelude::*;
//! use std::path::Path;
//!
//! let config = ForkConfig::load(Some(Path::new("forks.cfg")))?;
//! let summary = Forker::new(config, ForkOptions::new().dry_run())?.fork_all();
//!
//! for outcome in &summary.outcomes {
//!     println!("{} -> {}", outcome.section, outcome.url);
//! }
//! # Ok::<(), repo_forker::error::ForkerError>(())
//! ```

pub mod bitbucket;
pub mod config;
pub mod error;
pub mod forker;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::bitbucket::{BitbucketClient, CreateFork, ForkOps, ForkedRepo};
    pub use crate::config::{Credentials, ForkConfig, RepoEntry, DEFAULT_CONFIG_FILE};
    pub use crate::error::{ForkRequestError, ForkerError, Result};
    pub use crate::forker::{ForkOptions, ForkOutcome, ForkStatus, ForkSummary, Forker};
}

pub use prelude::*;
