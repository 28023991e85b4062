//! Version normalization and range constraints.
//!
//! Constraints are written in the npm range dialect that CI configs commonly
//! use (`1.2.3`, `^2`, `>=1.4 <2`, `1.x || 3.x`, `1.0 - 1.4`). They are mapped
//! onto [`semver::VersionReq`] alternatives so matching follows the usual
//! semver rules, including prerelease handling.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use thiserror::Error;

/// Strip one leading `v` from a release tag.
///
/// ```
/// use prebuilt_schema::normalize_version;
///
/// assert_eq!(normalize_version("v1.2.3"), "1.2.3");
/// assert_eq!(normalize_version("1.2.3"), "1.2.3");
/// ```
pub fn normalize_version(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// Parse a normalized version string, tolerating surrounding whitespace and a
/// leading `=`.
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('=').unwrap_or(trimmed).trim_start();
    Version::parse(normalize_version(trimmed)).ok()
}

/// A version range could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid version constraint '{input}': {reason}")]
pub struct ConstraintError {
    /// Constraint as written by the user.
    pub input: String,
    /// Parser message.
    pub reason: String,
}

/// A parsed version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// A bare wildcard (`*`, `x`, `X`, blank).
    ///
    /// Under range semantics ([`Self::matches_version`]) this is
    /// [`VersionReq::STAR`], which rejects prereleases. As a cache lookup key
    /// ([`Self::matches`]) it accepts every entry, including non-semver tags.
    Any,
    /// Satisfied when any of the alternatives matches.
    AnyOf(Vec<VersionReq>),
}

impl VersionConstraint {
    /// Parse an npm-style range.
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let trimmed = input.trim();
        if is_wildcard(trimmed) {
            return Ok(Self::Any);
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let alternative = alternative.trim();
            let translated = translate_alternative(alternative);
            if is_wildcard(alternative) || translated == "*" {
                return Ok(Self::Any);
            }
            let req = VersionReq::parse(&translated).map_err(|e| ConstraintError {
                input: input.to_string(),
                reason: e.to_string(),
            })?;
            alternatives.push(req);
        }
        Ok(Self::AnyOf(alternatives))
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Check a parsed version with semver range semantics.
    pub fn matches_version(&self, version: &Version) -> bool {
        match self {
            Self::Any => VersionReq::STAR.matches(version),
            Self::AnyOf(reqs) => reqs.iter().any(|req| req.matches(version)),
        }
    }

    /// Check a cache key. [`Self::Any`] accepts anything; otherwise the key
    /// must parse as a version satisfying the range.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            Self::Any => true,
            Self::AnyOf(_) => parse_version(version).is_some_and(|v| self.matches_version(&v)),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::AnyOf(reqs) => {
                let parts: Vec<String> = reqs.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(" || "))
            }
        }
    }
}

fn is_wildcard(s: &str) -> bool {
    matches!(s, "" | "*" | "x" | "X")
}

/// Rewrite one npm alternative (space-separated, AND-ed) into cargo syntax.
fn translate_alternative(alternative: &str) -> String {
    let tokens: Vec<&str> = alternative.split_whitespace().collect();

    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={}, <={}", strip_v(low), strip_v(high));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if is_operator(token) {
            pending_op = Some(token);
            continue;
        }
        let token = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => token.to_string(),
        };
        comparators.push(translate_comparator(&token));
    }
    if let Some(op) = pending_op {
        // dangling operator; let the semver parser report it
        comparators.push(op.to_string());
    }
    // semver only accepts `*` as the sole comparator; next to others it adds nothing
    if comparators.len() > 1 {
        comparators.retain(|c| c != "*");
    }
    comparators.join(", ")
}

fn translate_comparator(comparator: &str) -> String {
    let split = comparator
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);
    let version = strip_v(version);

    if !op.is_empty() {
        return format!("{op}{version}");
    }
    // npm treats a bare version as exact (or as a partial range); cargo would
    // read it as a caret requirement.
    let core = version.split(['-', '+']).next().unwrap_or(version);
    if core.split('.').all(is_wildcard) {
        // `x.x.x`, `*.*`: semver rejects wildcard minor/patch after a wildcard major
        "*".to_string()
    } else if core.split('.').any(is_wildcard) {
        version.to_string()
    } else {
        format!("={version}")
    }
}

fn is_operator(token: &str) -> bool {
    matches!(token, "<" | "<=" | ">" | ">=" | "=" | "~" | "^")
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}
