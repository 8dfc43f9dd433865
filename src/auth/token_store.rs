use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use super::oracle::AccessOracle;
use super::password::{generate_password, passwords_match};
use crate::error::{Error, Result};
use crate::types::{Action, Token};

/// Durable, one-file-per-user token store.
///
/// Every mutating operation on a given user's token is serialized through an
/// in-process per-user lock before the write-to-tempfile-then-rename commit
/// to disk, closing the unlocked read-modify-write race a naive
/// load-then-save would have. The lock is scoped to one process: the
/// authenticating caller is invoked serially per SSH session in practice, so
/// cross-process races are out of scope here.
pub struct TokenStore {
    token_dir: PathBuf,
    ttl: ChronoDuration,
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TokenStore {
    #[must_use]
    pub fn new(token_dir: PathBuf, ttl_seconds: i64) -> Self {
        Self {
            token_dir,
            ttl: ChronoDuration::seconds(ttl_seconds),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, user: &str) -> PathBuf {
        self.token_dir.join(user)
    }

    fn lock_for(&self, user: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Returns a valid, non-expired token for `user`, minting one if absent
    /// or expired. Expiry is checked on load; an expired token is deleted
    /// before a fresh one is written.
    pub async fn load_or_create(&self, user: &str) -> Result<Token> {
        let lock = self.lock_for(user);
        let _guard = lock.lock().await;

        match self.read_raw(user).await? {
            Some(token) if !token.is_expired(Utc::now()) => Ok(token),
            Some(_expired) => {
                self.delete_raw(user).await?;
                self.mint_and_save(user).await
            }
            None => self.mint_and_save(user).await,
        }
    }

    async fn mint_and_save(&self, user: &str) -> Result<Token> {
        let token = Token::new(user.to_string(), generate_password(), Utc::now() + self.ttl);
        self.write_raw(&token).await?;
        Ok(token)
    }

    /// Used by HTTP endpoints: returns the token only if the file exists, is
    /// not expired, and the password matches (constant-time). An expired
    /// token is reaped here so the next load sees it as absent.
    pub async fn load(&self, user: &str, password: &str) -> Result<Token> {
        let token = self
            .read_raw(user)
            .await?
            .ok_or(Error::MissingCredentials)?;

        if !self.check_password(&token, password) {
            return Err(Error::BadPassword);
        }

        if token.is_expired(Utc::now()) {
            let _ = self.delete(user).await;
            return Err(Error::ExpiredToken);
        }

        Ok(token)
    }

    #[must_use]
    pub fn check_password(&self, token: &Token, password: &str) -> bool {
        passwords_match(password, &token.password)
    }

    /// Persists the current in-memory state of `token` to disk.
    pub async fn flush(&self, token: &Token) -> Result<()> {
        let lock = self.lock_for(&token.user);
        let _guard = lock.lock().await;
        self.write_raw(token).await
    }

    /// Removes the token file if present.
    pub async fn delete(&self, user: &str) -> Result<()> {
        let lock = self.lock_for(user);
        let _guard = lock.lock().await;
        self.delete_raw(user).await
    }

    /// Sets `expires_at = now + ttl` and persists.
    pub async fn extend_ttl(&self, token: &mut Token) -> Result<()> {
        token.expires_at = Utc::now() + self.ttl;
        self.flush(token).await
    }

    /// Atomic read-modify-write: holds the per-user lock across the whole
    /// load-or-create, mutate, and persist sequence, so concurrent callers
    /// for the same user never lose each other's changes. Prefer this over
    /// separate `load_or_create`/`flush` calls whenever the mutation and the
    /// persist need to be one unit — which `load_or_create`+`flush` is not,
    /// by itself (see the module docs on per-operation vs. cross-call
    /// locking).
    pub async fn update<F>(&self, user: &str, f: F) -> Result<Token>
    where
        F: FnOnce(&mut Token),
    {
        let lock = self.lock_for(user);
        let _guard = lock.lock().await;

        let mut token = match self.read_raw(user).await? {
            Some(token) if !token.is_expired(Utc::now()) => token,
            Some(_expired) => {
                self.delete_raw(user).await?;
                Token::new(user.to_string(), generate_password(), Utc::now() + self.ttl)
            }
            None => Token::new(user.to_string(), generate_password(), Utc::now() + self.ttl),
        };

        f(&mut token);
        self.write_raw(&token).await?;
        Ok(token)
    }

    /// Re-queries the oracle for every currently granted `(repo, action)`
    /// pair, drops any that no longer pass, then extends the TTL. One flush
    /// at the end persists both the pruned grant set and the new expiry.
    pub async fn revalidate(&self, token: &mut Token, oracle: &dyn AccessOracle) -> Result<()> {
        let grants: Vec<(String, Action)> = token
            .privileges
            .repos()
            .flat_map(|(repo, actions)| actions.iter().map(move |a| (repo.to_string(), *a)))
            .collect();

        for (repo, action) in grants {
            if !oracle.has_access(&repo, &token.user, action).await {
                token.privileges.remove(&repo, action);
            }
        }

        token.expires_at = Utc::now() + self.ttl;
        self.flush(token).await
    }

    async fn read_raw(&self, user: &str) -> Result<Option<Token>> {
        let path = self.path_for(user);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let token = serde_json::from_str(&content)
                    .map_err(|e| Error::Internal(format!("corrupt token file for {user}: {e}")))?;
                Ok(Some(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn write_raw(&self, token: &Token) -> Result<()> {
        fs::create_dir_all(&self.token_dir).await?;
        restrict(&self.token_dir, 0o700).await?;
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| Error::Internal(format!("failed to serialize token: {e}")))?;

        let temp_path = self
            .token_dir
            .join(format!(".{}.tmp.{}", token.user, Uuid::new_v4()));
        fs::write(&temp_path, json).await?;
        restrict(&temp_path, 0o600).await?;
        fs::rename(&temp_path, self.path_for(&token.user)).await?;
        Ok(())
    }

    async fn delete_raw(&self, user: &str) -> Result<()> {
        match fs::remove_file(self.path_for(user)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Locks down a token directory or file to owner-only access. Unlike
/// `BlobStore`'s `dir_mode`/`file_mode`, this is not a config knob: token
/// files hold a plaintext-comparable password, so there's no deployment
/// scenario where looser permissions are the right default. A no-op on
/// non-unix targets.
async fn restrict(path: &std::path::Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oracle::StaticOracle;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> TokenStore {
        TokenStore::new(dir.path().to_path_buf(), 7200)
    }

    #[tokio::test]
    async fn load_or_create_mints_once_and_reuses() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = store.load_or_create("alice").await.unwrap();
        let second = store.load_or_create("alice").await.unwrap();
        assert_eq!(first.password, second.password);
    }

    #[tokio::test]
    async fn token_round_trips_through_disk_exactly() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut token = store.load_or_create("alice").await.unwrap();
        token.privileges.add("org/p", Action::Upload);
        store.flush(&token).await.unwrap();

        let reloaded = store.load(&token.user, &token.password).await.unwrap();
        assert_eq!(reloaded.user, token.user);
        assert_eq!(reloaded.password, token.password);
        assert_eq!(reloaded.expires_at, token.expires_at);
        assert!(reloaded.privileges.has("org/p", Action::Upload));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().to_path_buf(), -1);

        let token = store.load_or_create("alice").await.unwrap();
        assert!(matches!(
            store.load(&token.user, &token.password).await,
            Err(Error::ExpiredToken)
        ));

        // expiry reaping: a fresh load_or_create mints a new token
        let fresh = store.load_or_create("alice").await.unwrap();
        assert_ne!(fresh.password, token.password);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let token = store.load_or_create("alice").await.unwrap();
        assert!(matches!(
            store.load(&token.user, "not-the-password").await,
            Err(Error::BadPassword)
        ));
    }

    #[tokio::test]
    async fn check_password_matches_only_the_current_password() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let token = store.load_or_create("alice").await.unwrap();

        assert!(store.check_password(&token, &token.password));
        assert!(!store.check_password(&token, "not-the-password"));
    }

    #[tokio::test]
    async fn add_then_remove_privilege_clears_grant_map() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut token = store.load_or_create("alice").await.unwrap();

        token.privileges.add("org/p", Action::Upload);
        token.privileges.remove("org/p", Action::Upload);
        store.flush(&token).await.unwrap();

        let reloaded = store.load(&token.user, &token.password).await.unwrap();
        assert!(!reloaded.privileges.has("org/p", Action::Upload));
        assert_eq!(reloaded.privileges.repos().count(), 0);
    }

    #[tokio::test]
    async fn revalidate_drops_grants_the_oracle_no_longer_approves() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut token = store.load_or_create("alice").await.unwrap();
        token.privileges.add("org/p", Action::Upload);

        let oracle = StaticOracle::deny_all();
        store.revalidate(&mut token, &oracle).await.unwrap();

        assert!(!token.privileges.has("org/p", Action::Upload));
    }

    #[tokio::test]
    async fn revalidate_extends_ttl() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut token = store.load_or_create("alice").await.unwrap();
        let original_expiry = token.expires_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let oracle = StaticOracle::allow_all();
        store.revalidate(&mut token, &oracle).await.unwrap();

        assert!(token.expires_at > original_expiry);
    }

    #[tokio::test]
    async fn concurrent_atomic_updates_for_the_same_user_never_lose_a_write() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store(&dir));
        store.load_or_create("alice").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update("alice", |token| {
                        token.privileges.add(&format!("org/repo{i}"), Action::Download);
                    })
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let token = store.load_or_create("alice").await.unwrap();
        assert_eq!(token.privileges.repos().count(), 20);
    }
}
