use std::collections::{BTreeMap, BTreeSet};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Action;

/// Repo -> granted actions. A repo only appears as a key while its action
/// set is non-empty; removing the last action for a repo drops the key
/// entirely, so an empty action set never lingers in the grant map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeMap(BTreeMap<String, BTreeSet<Action>>);

impl PrivilegeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, repo: &str, action: Action) {
        self.0.entry(repo.to_string()).or_default().insert(action);
    }

    pub fn remove(&mut self, repo: &str, action: Action) {
        if let Some(actions) = self.0.get_mut(repo) {
            actions.remove(&action);
            if actions.is_empty() {
                self.0.remove(repo);
            }
        }
    }

    #[must_use]
    pub fn has(&self, repo: &str, action: Action) -> bool {
        self.0.get(repo).is_some_and(|actions| actions.contains(&action))
    }

    #[must_use]
    pub fn repos(&self) -> impl Iterator<Item = (&str, &BTreeSet<Action>)> {
        self.0.iter().map(|(repo, actions)| (repo.as_str(), actions))
    }
}

impl Serialize for PrivilegeMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let as_strings: BTreeMap<&str, Vec<&'static str>> = self
            .0
            .iter()
            .map(|(repo, actions)| {
                (
                    repo.as_str(),
                    actions.iter().map(|a| a.as_str()).collect(),
                )
            })
            .collect();
        as_strings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PrivilegeMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: BTreeMap<String, Vec<String>> = BTreeMap::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for (repo, actions) in raw {
            let parsed: BTreeSet<Action> = actions
                .iter()
                .filter_map(|a| Action::parse(a).ok())
                .collect();
            if !parsed.is_empty() {
                map.insert(repo, parsed);
            }
        }
        Ok(PrivilegeMap(map))
    }
}

/// A bearer token: user identity, opaque password, per-repo privilege
/// grants, and an absolute expiry. Persisted one-per-user as JSON by the
/// token store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub privileges: PrivilegeMap,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    #[must_use]
    pub fn new(user: String, password: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            user,
            password,
            privileges: PrivilegeMap::new(),
            expires_at,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// `Basic base64(user:password)`, derivable from user+password at any
    /// time rather than stored separately.
    #[must_use]
    pub fn auth_header(&self) -> String {
        let raw = format!("{}:{}", self.user, self.password);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> Token {
        Token::new("alice".into(), "secret-pw".into(), Utc::now())
    }

    #[test]
    fn add_then_remove_clears_repo_key() {
        let mut t = token();
        t.privileges.add("org/p", Action::Upload);
        assert!(t.privileges.has("org/p", Action::Upload));
        t.privileges.remove("org/p", Action::Upload);
        assert!(!t.privileges.has("org/p", Action::Upload));
        assert_eq!(t.privileges.repos().count(), 0);
    }

    #[test]
    fn add_is_idempotent() {
        let mut t = token();
        t.privileges.add("org/p", Action::Upload);
        t.privileges.add("org/p", Action::Upload);
        let count: usize = t
            .privileges
            .repos()
            .map(|(_, actions)| actions.len())
            .sum();
        assert_eq!(count, 1);
    }

    #[test]
    fn auth_header_is_basic_base64_of_user_colon_password() {
        let t = Token::new("alice".into(), "pw".into(), Utc::now());
        assert_eq!(t.auth_header(), "Basic YWxpY2U6cHc=");
    }

    #[test]
    fn privileges_round_trip_through_json() {
        let mut map = PrivilegeMap::new();
        map.add("org/p", Action::Upload);
        map.add("org/p", Action::Download);
        map.add("org/q", Action::Download);

        let json = serde_json::to_string(&map).unwrap();
        let back: PrivilegeMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
    }
}
