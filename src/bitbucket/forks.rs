//! Fork creation requests.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::bitbucket::BitbucketClient;
use crate::config::RepoEntry;
use crate::error::ForkRequestError;

/// Request body for `POST /repositories/{owner}/{slug}/forks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateFork {
    pub name: String,
    pub language: String,
    pub owner: ForkOwner,
    pub project: ForkProject,
}

/// Account that will own the fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkOwner {
    pub username: String,
}

/// Project the fork is placed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkProject {
    pub key: String,
}

impl CreateFork {
    /// Build the request body for one repository entry.
    pub fn for_entry(entry: &RepoEntry, owner: &str) -> Self {
        Self {
            name: entry.fork_repo_name.clone(),
            language: entry.language.clone(),
            owner: ForkOwner {
                username: owner.to_string(),
            },
            project: ForkProject {
                key: entry.fork_project_key.clone(),
            },
        }
    }
}

/// The subset of the created repository we report back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForkedRepo {
    pub full_name: Option<String>,
}

/// Fork operations against a hosting API.
pub trait ForkOps {
    /// URL a fork request for `origin_slug` under `owner` is sent to.
    fn fork_url(&self, owner: &str, origin_slug: &str) -> Url;

    /// Ask the API to fork `owner/origin_slug`.
    ///
    /// Succeeds only when the server answers `201 Created`.
    fn create_fork(
        &self,
        owner: &str,
        origin_slug: &str,
        request: &CreateFork,
    ) -> Result<ForkedRepo, ForkRequestError>;
}

impl ForkOps for BitbucketClient {
    fn fork_url(&self, owner: &str, origin_slug: &str) -> Url {
        self.endpoint(&["repositories", owner, origin_slug, "forks"])
    }

    fn create_fork(
        &self,
        owner: &str,
        origin_slug: &str,
        request: &CreateFork,
    ) -> Result<ForkedRepo, ForkRequestError> {
        let url = self.fork_url(owner, origin_slug);
        tracing::debug!(%url, user = %self.username(), "POST fork request");

        let response = self.post(url, request)?;
        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().unwrap_or_default();
            return Err(ForkRequestError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        // The status alone decides success; the body is informational.
        let body = response.text().unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
