use std::fmt;
use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static SSH_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ssh://)?(?P<user>[A-Za-z0-9._-]+)@(?P<host>[A-Za-z0-9._-]+)[:/](?P<owner>[^/]+)/(?P<name>.+?)(?:\.git)?/?$")
        .expect("ssh reference pattern")
});

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<owner>[A-Za-z0-9._-]+)/(?P<name>[A-Za-z0-9._-]+)$")
        .expect("shorthand reference pattern")
});

/// Raised when a repository reference cannot be parsed. Always fatal,
/// before any network or filesystem activity.
#[derive(Debug, Error)]
#[error("invalid repository reference: `{input}`")]
pub struct InvalidReference {
    pub input: String,
}

/// A normalized reference to a source repository.
///
/// Accepts three spellings and keeps the distinction, since SSH
/// repositories have no addressable HTTP asset URL:
/// - `owner/repo` shorthand (normalized to `https://github.com`)
/// - full HTTPS URLs
/// - SSH specs like `git@github.com:owner/repo.git`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RepositoryIdentity {
    Https {
        host: String,
        owner: String,
        name: String,
    },
    Ssh {
        user: String,
        host: String,
        owner: String,
        name: String,
    },
}

impl RepositoryIdentity {
    pub fn parse(input: &str) -> Result<Self, InvalidReference> {
        let trimmed = input.trim();
        if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            return Self::parse_https(trimmed);
        }
        if let Some(caps) = SSH_SPEC.captures(trimmed) {
            if trimmed.contains('@') {
                return Ok(RepositoryIdentity::Ssh {
                    user: caps["user"].to_string(),
                    host: caps["host"].to_string(),
                    owner: caps["owner"].to_string(),
                    name: caps["name"].trim_end_matches(".git").to_string(),
                });
            }
        }
        if let Some(caps) = SHORTHAND.captures(trimmed) {
            return Ok(RepositoryIdentity::Https {
                host: "github.com".to_string(),
                owner: caps["owner"].to_string(),
                name: caps["name"].trim_end_matches(".git").to_string(),
            });
        }
        Err(InvalidReference {
            input: input.to_string(),
        })
    }

    fn parse_https(input: &str) -> Result<Self, InvalidReference> {
        let rest = input
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let mut parts = rest.split('/');
        let host = parts.next().unwrap_or_default();
        let owner = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default().trim_end_matches(".git");
        if host.is_empty() || owner.is_empty() || name.is_empty() || parts.next().is_some() {
            return Err(InvalidReference {
                input: input.to_string(),
            });
        }
        Ok(RepositoryIdentity::Https {
            host: host.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        match self {
            RepositoryIdentity::Https { host, .. } => host,
            RepositoryIdentity::Ssh { host, .. } => host,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            RepositoryIdentity::Https { owner, .. } => owner,
            RepositoryIdentity::Ssh { owner, .. } => owner,
        }
    }

    /// The repository's short name: the last path segment of the reference.
    pub fn short_name(&self) -> &str {
        match self {
            RepositoryIdentity::Https { name, .. } => name,
            RepositoryIdentity::Ssh { name, .. } => name,
        }
    }

    /// `owner/repo` form, used for display and provenance comparison.
    pub fn reference_name(&self) -> String {
        format!("{}/{}", self.owner(), self.short_name())
    }

    /// The canonical string form, also usable as a clone URL.
    pub fn canonical(&self) -> String {
        match self {
            RepositoryIdentity::Https { host, owner, name } => {
                format!("https://{host}/{owner}/{name}")
            }
            RepositoryIdentity::Ssh {
                user,
                host,
                owner,
                name,
            } => format!("{user}@{host}:{owner}/{name}.git"),
        }
    }

    pub fn is_ssh(&self) -> bool {
        matches!(self, RepositoryIdentity::Ssh { .. })
    }

    /// Filesystem-safe directory slug: owner, name and host sanitized to
    /// `[A-Za-z0-9_]` and joined by `_`, with an `ssh` discriminator so
    /// the same repository reached over different schemes never collides.
    pub fn slug(&self) -> String {
        let mut parts = vec![
            sanitize(self.owner()),
            sanitize(self.short_name()),
            sanitize(self.host()),
        ];
        if self.is_ssh() {
            parts.push("ssh".to_string());
        }
        parts.join("_")
    }

    /// Provenance comparison used by registry lookups; case-insensitive
    /// on `owner/repo` and exact on host.
    pub fn matches(&self, other: &RepositoryIdentity) -> bool {
        self.host() == other.host()
            && self
                .reference_name()
                .eq_ignore_ascii_case(&other.reference_name())
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Replaces anything outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let id = RepositoryIdentity::parse("owner/repo").unwrap();
        assert_eq!(id.canonical(), "https://github.com/owner/repo");
        assert_eq!(id.reference_name(), "owner/repo");
        assert_eq!(id.short_name(), "repo");
        assert!(!id.is_ssh());
    }

    #[test]
    fn test_parse_https_url() {
        let id = RepositoryIdentity::parse("https://gitlab.com/team/tool.git").unwrap();
        assert_eq!(id.host(), "gitlab.com");
        assert_eq!(id.short_name(), "tool");
        assert_eq!(id.canonical(), "https://gitlab.com/team/tool");
    }

    #[test]
    fn test_parse_ssh_spec() {
        let id = RepositoryIdentity::parse("git@github.com:owner/repo.git").unwrap();
        assert!(id.is_ssh());
        assert_eq!(id.reference_name(), "owner/repo");
        assert_eq!(id.canonical(), "git@github.com:owner/repo.git");
    }

    #[test]
    fn test_parse_invalid_is_fatal() {
        assert!(RepositoryIdentity::parse("not a reference").is_err());
        assert!(RepositoryIdentity::parse("").is_err());
        assert!(RepositoryIdentity::parse("a/b/c/d").is_err());
    }

    #[test]
    fn test_slug_is_filesystem_safe() {
        let id = RepositoryIdentity::parse("owner/my-tool").unwrap();
        let slug = id.slug();
        assert_eq!(slug, "owner_my_tool_github_com");
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_slug_distinguishes_schemes() {
        let https = RepositoryIdentity::parse("owner/repo").unwrap();
        let ssh = RepositoryIdentity::parse("git@github.com:owner/repo").unwrap();
        assert_ne!(https.slug(), ssh.slug());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let a = RepositoryIdentity::parse("Owner/Repo").unwrap();
        let b = RepositoryIdentity::parse("owner/repo").unwrap();
        assert!(a.matches(&b));
    }
}
