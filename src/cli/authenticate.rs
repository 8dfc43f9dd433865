use std::env;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{AccessOracle, GitoliteOracle, TokenStore};
use crate::config::Config;
use crate::types::{canonical_repo_name, Action};

pub const HELP: &str = "\
usage: lfsgate authenticate <repo> <action>

Invoked by the trusted transport (typically an SSH forced command) to mint
or refresh a Git LFS bearer token for the calling user, scoped to one
repository and one action (`download` or `upload`).

Environment:
  LFS_AUTH_USER         authenticated user name (required)
  LFS_AUTH_ORACLE_BIN   path to the access-control oracle binary (optional;
                        overrides the configured oracle_binary)
";

#[derive(Serialize)]
struct CredentialHeader {
    #[serde(rename = "Authorization")]
    authorization: String,
}

#[derive(Serialize)]
struct CredentialOutput {
    header: CredentialHeader,
    expires_at: DateTime<Utc>,
}

/// Runs the stateless per-invocation protocol described in the module docs:
/// canonicalize and allowlist-check the repo, load-or-create the caller's
/// token, revalidate its existing grants against the oracle, then consult
/// the oracle for the requested `(repo, action)` pair and grant or strip it
/// accordingly. Exits non-zero (via the returned `Err`) on denial or on any
/// usage/configuration problem.
pub async fn run(config: &Config, repo: &str, action: &str) -> anyhow::Result<()> {
    let user = env::var("LFS_AUTH_USER")
        .map_err(|_| anyhow::anyhow!("LFS_AUTH_USER is not set"))?;

    let oracle_binary = env::var_os("LFS_AUTH_ORACLE_BIN")
        .map(PathBuf::from)
        .or_else(|| config.oracle_binary.clone());
    let oracle = GitoliteOracle::new(oracle_binary);

    let repo = oracle.prepare_repo_name(repo);
    if !config.repositories.iter().any(|r| r == &repo) {
        anyhow::bail!("unknown repository: {repo}");
    }
    let action = Action::parse(action)?;

    let token_store = TokenStore::new(config.resolved_token_dir(), config.token_ttl_seconds);
    let mut token = token_store.load_or_create(&user).await?;
    token_store.revalidate(&mut token, &oracle).await?;

    if oracle.has_access(&repo, &user, action).await {
        token.privileges.add(&repo, action);
        token_store.flush(&token).await?;

        let output = CredentialOutput {
            header: CredentialHeader {
                authorization: token.auth_header(),
            },
            expires_at: token.expires_at,
        };
        println!("{}", serde_json::to_string(&output)?);
        Ok(())
    } else {
        token.privileges.remove(&repo, action);
        token_store.flush(&token).await?;
        anyhow::bail!("access denied: {user} may not {action} {repo}");
    }
}
