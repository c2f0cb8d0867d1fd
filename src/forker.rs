//! Fork execution engine.
//!
//! Entries are processed one at a time in config order. A failed entry is
//! logged and counted, and never stops the remaining entries.

use std::fmt;
use std::time::Duration;

use crate::bitbucket::{BitbucketClient, CreateFork, ForkOps, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
use crate::config::{ForkConfig, RepoEntry};
use crate::error::{ForkRequestError, Result};

/// Run options for [`Forker`].
#[derive(Debug, Clone)]
pub struct ForkOptions {
    /// API base URL the fork endpoint is resolved against.
    pub api_base: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after a failed connect. Timeouts and responses are never
    /// retried because the fork may already exist.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Log planned requests instead of sending them.
    pub dry_run: bool,
}

impl Default for ForkOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            retry_delay: Duration::from_secs(1),
            dry_run: false,
        }
    }
}

impl ForkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API base URL.
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how many times a failed connect is retried.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the pause between retries.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enables dry-run mode.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Status of a repository entry after a run.
#[derive(Debug)]
pub enum ForkStatus {
    /// The API answered `201 Created`.
    Forked { full_name: Option<String> },
    /// The request failed or was refused.
    Failed(ForkRequestError),
    /// Not sent (dry run).
    Skipped,
}

/// Result for a single repository entry.
#[derive(Debug)]
pub struct ForkOutcome {
    pub section: String,
    pub url: String,
    pub attempts: u32,
    pub status: ForkStatus,
}

impl ForkOutcome {
    pub fn is_forked(&self) -> bool {
        matches!(self.status, ForkStatus::Forked { .. })
    }
}

/// Summary of a run.
#[derive(Debug, Default)]
pub struct ForkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Per-entry outcomes in processing order.
    pub outcomes: Vec<ForkOutcome>,
}

impl ForkSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for ForkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} HAS BEEN FORKED.", self.succeeded, self.total)
    }
}

/// Forks every repository entry of a [`ForkConfig`].
pub struct Forker<C = BitbucketClient> {
    config: ForkConfig,
    client: C,
    options: ForkOptions,
}

impl Forker<BitbucketClient> {
    /// Create a forker talking to the Bitbucket API described by `options`.
    pub fn new(config: ForkConfig, options: ForkOptions) -> Result<Self> {
        let client = BitbucketClient::with_base_url(
            config.credentials.clone(),
            &options.api_base,
            options.timeout,
        )?;
        Ok(Self::with_client(config, client, options))
    }
}

impl<C: ForkOps> Forker<C> {
    /// Create a forker over any [`ForkOps`] implementation.
    pub fn with_client(config: ForkConfig, client: C, options: ForkOptions) -> Self {
        Self {
            config,
            client,
            options,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fork every configured repository and log a summary line.
    pub fn fork_all(&self) -> ForkSummary {
        let mut summary = ForkSummary {
            total: self.config.repos.len(),
            ..Default::default()
        };

        for repo in &self.config.repos {
            tracing::info!("Forking {}...", repo.section);
            let outcome = self.fork_repository(repo);

            match &outcome.status {
                ForkStatus::Forked { full_name } => {
                    summary.succeeded += 1;
                    match full_name {
                        Some(name) => {
                            tracing::info!("Forking {} SUCCESS! ({})", repo.section, name)
                        }
                        None => tracing::info!("Forking {} SUCCESS!", repo.section),
                    }
                }
                ForkStatus::Failed(e) => {
                    summary.failed += 1;
                    tracing::error!(section = %repo.section, error = %e, "fork request failed");
                    tracing::info!("Forking {} FAILED!", repo.section);
                }
                ForkStatus::Skipped => {
                    summary.skipped += 1;
                    tracing::info!("Forking {} SKIPPED (dry run)", repo.section);
                }
            }

            summary.outcomes.push(outcome);
        }

        tracing::info!("{}", summary);
        summary
    }

    fn fork_repository(&self, repo: &RepoEntry) -> ForkOutcome {
        let owner = &self.config.owner;
        let request = CreateFork::for_entry(repo, owner);
        let url = self.client.fork_url(owner, &repo.origin_repo_slug).to_string();

        if self.options.dry_run {
            let body = serde_json::to_string(&request).unwrap_or_default();
            tracing::info!(%url, %body, "dry run: would POST");
            return ForkOutcome {
                section: repo.section.clone(),
                url,
                attempts: 0,
                status: ForkStatus::Skipped,
            };
        }

        let mut attempts = 0;
        let status = loop {
            attempts += 1;
            match self
                .client
                .create_fork(owner, &repo.origin_repo_slug, &request)
            {
                Ok(forked) => {
                    break ForkStatus::Forked {
                        full_name: forked.full_name,
                    };
                }
                Err(e) if e.is_retryable() && attempts <= self.options.retries => {
                    tracing::warn!(
                        section = %repo.section,
                        attempt = attempts,
                        error = %e,
                        "retrying fork request"
                    );
                    std::thread::sleep(self.options.retry_delay);
                }
                Err(e) => break ForkStatus::Failed(e),
            }
        };

        ForkOutcome {
            section: repo.section.clone(),
            url,
            attempts,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitbucket::ForkedRepo;
    use crate::config::Credentials;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use url::Url;

    /// Records calls and replays scripted results per origin slug.
    #[derive(Default)]
    struct FakeForks {
        calls: RefCell<Vec<(String, String, CreateFork)>>,
        scripted: RefCell<Vec<(String, VecDeque<std::result::Result<(), ForkRequestError>>)>>,
    }

    impl FakeForks {
        fn script(
            self,
            slug: &str,
            results: Vec<std::result::Result<(), ForkRequestError>>,
        ) -> Self {
            self.scripted
                .borrow_mut()
                .push((slug.to_string(), results.into()));
            self
        }

        fn calls_for(&self, slug: &str) -> usize {
            self.calls.borrow().iter().filter(|(_, s, _)| s == slug).count()
        }
    }

    impl ForkOps for FakeForks {
        fn fork_url(&self, owner: &str, origin_slug: &str) -> Url {
            Url::parse(&format!("http://fake/repositories/{owner}/{origin_slug}/forks")).unwrap()
        }

        fn create_fork(
            &self,
            owner: &str,
            origin_slug: &str,
            request: &CreateFork,
        ) -> std::result::Result<ForkedRepo, ForkRequestError> {
            self.calls.borrow_mut().push((
                owner.to_string(),
                origin_slug.to_string(),
                request.clone(),
            ));
            let mut scripted = self.scripted.borrow_mut();
            let next = scripted
                .iter_mut()
                .find(|(slug, _)| slug == origin_slug)
                .and_then(|(_, results)| results.pop_front())
                .unwrap_or(Ok(()));
            next.map(|()| ForkedRepo {
                full_name: Some(format!("{owner}/{}", request.name)),
            })
        }
    }

    fn entry(slug: &str) -> RepoEntry {
        RepoEntry {
            section: format!("REPO_{slug}"),
            origin_repo_slug: slug.into(),
            origin_project_key: "P1".into(),
            fork_repo_name: format!("{slug}-fork"),
            fork_project_key: "P2".into(),
            language: "python".into(),
        }
    }

    fn config(slugs: &[&str]) -> ForkConfig {
        ForkConfig {
            credentials: Credentials::new("alice", "x"),
            owner: "acme".into(),
            repos: slugs.iter().map(|s| entry(s)).collect(),
        }
    }

    fn status(code: u16) -> ForkRequestError {
        ForkRequestError::UnexpectedStatus {
            status: code,
            body: String::new(),
        }
    }

    fn quick() -> ForkOptions {
        ForkOptions::new().retry_delay(Duration::ZERO)
    }

    #[test]
    fn test_empty_config_reports_zero_of_zero() {
        let forker = Forker::with_client(config(&[]), FakeForks::default(), quick());
        let summary = forker.fork_all();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.to_string(), "0/0 HAS BEEN FORKED.");
        assert!(forker.client().calls.borrow().is_empty());
    }

    #[test]
    fn test_counts_successes_and_failures() {
        let fake = FakeForks::default()
            .script("b", vec![Err(status(400))])
            .script("d", vec![Err(ForkRequestError::Connect("refused".into()))]);
        let forker = Forker::with_client(config(&["a", "b", "c", "d"]), fake, quick());
        let summary = forker.fork_all();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.to_string(), "2/4 HAS BEEN FORKED.");
        assert!(summary.has_failures());
        for slug in ["a", "b", "c", "d"] {
            assert_eq!(forker.client().calls_for(slug), 1);
        }
    }

    #[test]
    fn test_processes_in_config_order() {
        let forker = Forker::with_client(config(&["z", "a", "m"]), FakeForks::default(), quick());
        let summary = forker.fork_all();

        let order: Vec<String> = forker
            .client()
            .calls
            .borrow()
            .iter()
            .map(|(_, slug, _)| slug.clone())
            .collect();
        assert_eq!(order, vec!["z", "a", "m"]);

        let sections: Vec<&str> = summary.outcomes.iter().map(|o| o.section.as_str()).collect();
        assert_eq!(sections, vec!["REPO_z", "REPO_a", "REPO_m"]);
    }

    #[test]
    fn test_request_built_from_entry_and_owner() {
        let forker = Forker::with_client(config(&["foo"]), FakeForks::default(), quick());
        let summary = forker.fork_all();

        let calls = forker.client().calls.borrow();
        let (owner, slug, request) = &calls[0];
        assert_eq!(owner, "acme");
        assert_eq!(slug, "foo");
        assert_eq!(request.name, "foo-fork");
        assert_eq!(request.language, "python");
        assert_eq!(request.owner.username, "acme");
        assert_eq!(request.project.key, "P2");
        assert_eq!(summary.outcomes[0].url, "http://fake/repositories/acme/foo/forks");
    }

    #[test]
    fn test_no_retry_by_default() {
        let fake =
            FakeForks::default().script("a", vec![Err(ForkRequestError::Connect("c".into()))]);
        let forker = Forker::with_client(config(&["a"]), fake, quick());
        let summary = forker.fork_all();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.outcomes[0].attempts, 1);
        assert_eq!(forker.client().calls_for("a"), 1);
    }

    #[test]
    fn test_retries_connect_failures() {
        let fake = FakeForks::default().script(
            "a",
            vec![
                Err(ForkRequestError::Connect("refused".into())),
                Err(ForkRequestError::Connect("refused".into())),
            ],
        );
        let forker = Forker::with_client(config(&["a"]), fake, quick().retries(2));
        let summary = forker.fork_all();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.outcomes[0].attempts, 3);
    }

    #[test]
    fn test_timeouts_are_never_retried() {
        // The POST may have reached the server before the timeout fired.
        let fake = FakeForks::default().script(
            "a",
            vec![
                Err(ForkRequestError::Timeout("slow".into())),
                Ok(()),
            ],
        );
        let forker = Forker::with_client(config(&["a"]), fake, quick().retries(3));
        let summary = forker.fork_all();

        assert_eq!(summary.failed, 1);
        assert_eq!(forker.client().calls_for("a"), 1);
        assert_eq!(summary.outcomes[0].attempts, 1);
        assert!(matches!(
            summary.outcomes[0].status,
            ForkStatus::Failed(ForkRequestError::Timeout(_))
        ));
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let fake = FakeForks::default().script(
            "a",
            vec![
                Err(ForkRequestError::Connect("1".into())),
                Err(ForkRequestError::Connect("2".into())),
                Err(ForkRequestError::Connect("3".into())),
            ],
        );
        let forker = Forker::with_client(config(&["a"]), fake, quick().retries(1));
        let summary = forker.fork_all();

        assert_eq!(summary.failed, 1);
        assert_eq!(forker.client().calls_for("a"), 2);
        assert!(matches!(
            summary.outcomes[0].status,
            ForkStatus::Failed(ForkRequestError::Connect(_))
        ));
    }

    #[test]
    fn test_status_errors_are_never_retried() {
        let fake = FakeForks::default().script("a", vec![Err(status(409))]);
        let forker = Forker::with_client(config(&["a"]), fake, quick().retries(3));
        let summary = forker.fork_all();

        assert_eq!(summary.failed, 1);
        assert_eq!(forker.client().calls_for("a"), 1);
        assert!(matches!(
            summary.outcomes[0].status,
            ForkStatus::Failed(ForkRequestError::UnexpectedStatus { status: 409, .. })
        ));
    }

    #[test]
    fn test_dry_run_sends_nothing() {
        let forker =
            Forker::with_client(config(&["a", "b"]), FakeForks::default(), quick().dry_run());
        let summary = forker.fork_all();

        assert!(forker.client().calls.borrow().is_empty());
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.to_string(), "0/2 HAS BEEN FORKED.");
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_options_builder() {
        let options = ForkOptions::new()
            .api_base("http://localhost:1")
            .timeout(Duration::from_secs(5))
            .retries(2)
            .dry_run();

        assert_eq!(options.api_base, "http://localhost:1");
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.retries, 2);
        assert!(options.dry_run);
    }
}
