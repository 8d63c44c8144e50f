//! Rule records: `<scope>##<selector>`.

use std::fmt;

use thiserror::Error;

/// Separates the scope from the selector in a rule string.
pub const SCOPE_SEPARATOR: &str = "##";

/// Scope that applies on every host.
pub const WILDCARD_SCOPE: &str = "*";

/// Where a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `##selector`, written when the user opted out of host scoping.
    Unscoped,
    /// `*##selector`
    Wildcard,
    /// `example.com##selector`
    Host(String),
}

impl Scope {
    fn parse(raw: &str) -> Self {
        match raw {
            "" => Self::Unscoped,
            WILDCARD_SCOPE => Self::Wildcard,
            host => Self::Host(host.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unscoped => "",
            Self::Wildcard => WILDCARD_SCOPE,
            Self::Host(host) => host,
        }
    }

    pub fn applies_to(&self, host: &str) -> bool {
        match self {
            Self::Unscoped | Self::Wildcard => true,
            Self::Host(scope) => scope == host,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule has no '##' separator")]
    MissingSeparator,

    #[error("rule selector is empty")]
    EmptySelector,

    #[error("selector '{0}' would hide the whole page")]
    ReservedSelector(String),

    #[error("no host available to scope the rule to")]
    MissingHost,
}

/// A validated hide rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleRecord {
    scope: Scope,
    selector: String,
}

impl RuleRecord {
    pub fn new(scope: Scope, selector: impl Into<String>) -> Result<Self, RuleError> {
        let selector = selector.into();
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(RuleError::EmptySelector);
        }
        if trimmed.eq_ignore_ascii_case("body") || trimmed.eq_ignore_ascii_case("html") {
            return Err(RuleError::ReservedSelector(trimmed.to_string()));
        }
        Ok(Self { scope, selector })
    }

    /// Rule for `selector` on the current page, scoped to `host` when
    /// `include_scope` is set.
    pub fn for_host(host: &str, selector: &str, include_scope: bool) -> Result<Self, RuleError> {
        let scope = if include_scope {
            if host.is_empty() {
                return Err(RuleError::MissingHost);
            }
            Scope::Host(host.to_string())
        } else {
            Scope::Unscoped
        };
        Self::new(scope, selector)
    }

    /// Parse a stored rule. Anything after a second `##` is ignored.
    pub fn parse(raw: &str) -> Result<Self, RuleError> {
        let mut parts = raw.split(SCOPE_SEPARATOR);
        let scope = parts.next().unwrap_or_default();
        let selector = parts.next().ok_or(RuleError::MissingSeparator)?;
        Self::new(Scope::parse(scope), selector)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn applies_to(&self, host: &str) -> bool {
        self.scope.applies_to(host)
    }
}

impl fmt::Display for RuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SCOPE_SEPARATOR}{}", self.scope.as_str(), self.selector)
    }
}
