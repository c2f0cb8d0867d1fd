//! Bitbucket API integration for creating repository forks.
//!
//! # Example
//!
//! ```rust,no_run
//! use repo_forker::bitbucket::{BitbucketClient, CreateFork, ForkOps};
//! use repo_forker::config::ForkConfig;
//!
//! let config = ForkConfig::load(None)?;
//! let client = BitbucketClient::new(config.credentials.clone())?;
//!
//! for repo in &config.repos {
//!     let request = CreateFork::for_entry(repo, &config.owner);
//!     match client.create_fork(&config.owner, &repo.origin_repo_slug, &request) {
//!         Ok(_) => println!("{}: forked", repo.section),
//!         Err(e) => println!("{}: {}", repo.section, e),
//!     }
//! }
//! # Ok::<(), repo_forker::error::ForkerError>(())
//! ```

mod client;
mod forks;

pub use client::{BitbucketClient, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
pub use forks::{CreateFork, ForkOps, ForkOwner, ForkProject, ForkedRepo};
