use std::fmt;

use anyhow::{Context, Result};
use reqwest::Url;

use crate::config::GatewayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Auth,
    Classes,
    Submissions,
}

impl Upstream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Upstream::Auth => "auth-service",
            Upstream::Classes => "class-service",
            Upstream::Submissions => "submission-service",
        }
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PREFIXES: [(&str, Upstream); 3] = [
    ("/api/auth", Upstream::Auth),
    ("/api/classes", Upstream::Classes),
    ("/api/submissions", Upstream::Submissions),
];

/// Maps a public path to its backend and the path the backend expects.
///
/// The auth service mounts its routes under `/auth`, so that prefix is kept;
/// the other services receive the remainder of the path.
pub fn resolve(path: &str) -> Option<(Upstream, String)> {
    PREFIXES.iter().find_map(|(prefix, upstream)| {
        let rest = path.strip_prefix(prefix)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        let rewritten = match upstream {
            Upstream::Auth => format!("/auth{rest}"),
            _ if rest.is_empty() => "/".to_string(),
            _ => rest.to_string(),
        };
        Some((*upstream, rewritten))
    })
}

/// Base URLs of the backends.
#[derive(Debug, Clone)]
pub struct Upstreams {
    auth: Url,
    classes: Url,
    submissions: Url,
}

impl Upstreams {
    pub fn new(auth: &str, classes: &str, submissions: &str) -> Result<Self> {
        let parse = |name: &str, raw: &str| {
            Url::parse(raw).with_context(|| format!("Invalid {name} base URL '{raw}'"))
        };
        Ok(Self {
            auth: parse("auth-service", auth)?,
            classes: parse("class-service", classes)?,
            submissions: parse("submission-service", submissions)?,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(
            &config.auth_service_url,
            &config.class_service_url,
            &config.submission_service_url,
        )
    }

    pub fn base(&self, upstream: Upstream) -> &Url {
        match upstream {
            Upstream::Auth => &self.auth,
            Upstream::Classes => &self.classes,
            Upstream::Submissions => &self.submissions,
        }
    }

    /// Absolute target URL. `path` and `query` are forwarded as received,
    /// already percent-encoded.
    pub fn target(&self, upstream: Upstream, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}{}", self.base(upstream).as_str().trim_end_matches('/'), path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_rewritten_per_service() {
        assert_eq!(
            resolve("/api/auth/login"),
            Some((Upstream::Auth, "/auth/login".to_string()))
        );
        assert_eq!(resolve("/api/auth"), Some((Upstream::Auth, "/auth".to_string())));
        assert_eq!(
            resolve("/api/classes/subjects/s1"),
            Some((Upstream::Classes, "/subjects/s1".to_string()))
        );
        assert_eq!(
            resolve("/api/submissions"),
            Some((Upstream::Submissions, "/".to_string()))
        );
    }

    #[test]
    fn lookalike_prefixes_do_not_match() {
        assert_eq!(resolve("/api/authz/login"), None);
        assert_eq!(resolve("/api/classesx"), None);
        assert_eq!(resolve("/auth/login"), None);
        assert_eq!(resolve("/"), None);
    }

    #[test]
    fn target_keeps_base_path_and_query() {
        let upstreams = Upstreams::new(
            "http://auth:4001",
            "http://classes:4002/v1/",
            "http://submissions:4003",
        )
        .unwrap();
        assert_eq!(
            upstreams.target(Upstream::Classes, "/subjects/a%20b", Some("x=1&y=2")),
            "http://classes:4002/v1/subjects/a%20b?x=1&y=2"
        );
        assert_eq!(
            upstreams.target(Upstream::Auth, "/auth/me", Some("")),
            "http://auth:4001/auth/me"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(Upstreams::new("not a url", "http://c", "http://s").is_err());
    }
}
