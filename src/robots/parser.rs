//! Robots.txt rule matching
//!
//! Rules are matched with the robotstxt crate, a port of Google's matcher:
//! `*` and named groups, Allow/Disallow with longest-match precedence.

use robotstxt::DefaultMatcher;

/// Robots.txt rules for one domain
///
/// `AllowAll` stands in for a robots.txt that is missing, unreachable or
/// unparseable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRobots {
    /// Raw robots.txt body, matched on demand
    Rules(String),
    /// Permissive sentinel
    AllowAll,
}

impl ParsedRobots {
    /// Wraps a fetched robots.txt body
    pub fn from_content(content: &str) -> Self {
        Self::Rules(content.to_string())
    }

    /// Returns the permissive sentinel
    pub fn allow_all() -> Self {
        Self::AllowAll
    }

    pub fn is_permissive(&self) -> bool {
        matches!(self, Self::AllowAll)
    }

    /// Returns the raw robots.txt body (empty for the permissive sentinel)
    pub fn content(&self) -> &str {
        match self {
            Self::Rules(content) => content,
            Self::AllowAll => "",
        }
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// `url` may be absolute or a bare path. A `user_agent` of `*` is
    /// matched against the wildcard group only; named groups never bind it.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::Rules(content) if content.trim().is_empty() => true,
            Self::Rules(content) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}
