use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::types::{canonical_repo_name, Action};

/// The external source of truth for repository permissions. The core never
/// maintains its own ACL database — it delegates every access decision to
/// whatever implements this trait.
#[async_trait]
pub trait AccessOracle: Send + Sync {
    /// Canonicalizes a raw repo path (strips `.git`, normalizes separators).
    /// Idempotent.
    fn prepare_repo_name(&self, raw: &str) -> String {
        canonical_repo_name(raw)
    }

    /// Consults the external source of truth for whether `user` may perform
    /// `action` on `repo`. MUST fail closed (return `false`) rather than
    /// panic or fail open when the oracle itself is unreachable.
    async fn has_access(&self, repo: &str, user: &str, action: Action) -> bool;
}

/// Bridges to a Gitolite-style access-control binary: `access -q <repo>
/// <user> <R|W>`, exit status 0 meaning allowed.
///
/// Arguments are passed as discrete `argv` entries to `tokio::process::Command`,
/// never concatenated into a shell string: a string-composed command line
/// invoked through a shell would be a metacharacter-injection hazard (e.g. a
/// repo name of `a; rm -rf /`).
pub struct GitoliteOracle {
    binary: Option<std::path::PathBuf>,
}

impl GitoliteOracle {
    #[must_use]
    pub fn new(binary: Option<std::path::PathBuf>) -> Self {
        Self { binary }
    }
}

#[async_trait]
impl AccessOracle for GitoliteOracle {
    async fn has_access(&self, repo: &str, user: &str, action: Action) -> bool {
        let Some(binary) = &self.binary else {
            warn!("access oracle binary not configured; failing closed");
            return false;
        };

        if !binary.is_file() {
            warn!(path = %binary.display(), "access oracle binary missing or not a file; failing closed");
            return false;
        }

        let verb = match action {
            Action::Download => "R",
            Action::Upload => "W",
        };

        let result = Command::new(binary)
            .arg("access")
            .arg("-q")
            .arg(repo)
            .arg(user)
            .arg(verb)
            .status()
            .await;

        match result {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(error = %e, "failed to spawn access oracle; failing closed");
                false
            }
        }
    }
}

/// An oracle that always allows or always denies, useful for tests and for
/// single-operator deployments that trust every authenticated caller.
pub struct StaticOracle {
    allow: bool,
}

impl StaticOracle {
    #[must_use]
    pub fn allow_all() -> Self {
        Self { allow: true }
    }

    #[must_use]
    pub fn deny_all() -> Self {
        Self { allow: false }
    }
}

#[async_trait]
impl AccessOracle for StaticOracle {
    async fn has_access(&self, _repo: &str, _user: &str, _action: Action) -> bool {
        self.allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_repo_name_strips_git_suffix_and_is_idempotent() {
        let oracle = StaticOracle::allow_all();
        let once = oracle.prepare_repo_name("org/project.git");
        assert_eq!(once, "org/project");
        assert_eq!(oracle.prepare_repo_name(&once), once);
    }

    #[tokio::test]
    async fn missing_binary_fails_closed() {
        let oracle = GitoliteOracle::new(Some("/no/such/binary".into()));
        assert!(!oracle.has_access("org/p", "alice", Action::Download).await);
    }

    #[tokio::test]
    async fn unconfigured_binary_fails_closed() {
        let oracle = GitoliteOracle::new(None);
        assert!(!oracle.has_access("org/p", "alice", Action::Upload).await);
    }
}
