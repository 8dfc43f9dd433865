/// Normalizes a repository path the way the access oracle expects it:
/// strips a trailing `.git` and rewrites path separators to `/`. Idempotent.
#[must_use]
pub fn canonical_repo_name(raw: &str) -> String {
    let stripped = raw.strip_suffix(".git").unwrap_or(raw);
    stripped.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_git_suffix() {
        assert_eq!(canonical_repo_name("org/project.git"), "org/project");
        assert_eq!(canonical_repo_name("org/project"), "org/project");
    }

    #[test]
    fn normalizes_separators() {
        assert_eq!(canonical_repo_name("org\\project.git"), "org/project");
    }

    #[test]
    fn is_idempotent() {
        let once = canonical_repo_name("org/project.git");
        let twice = canonical_repo_name(&once);
        assert_eq!(once, twice);
    }
}
