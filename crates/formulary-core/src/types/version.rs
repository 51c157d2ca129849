//! Version and version specifier types.
//!
//! `Version` follows semantic version precedence (build metadata ignored,
//! prerelease identifiers compared field by field). `VersionReq` is a
//! comma-separated list of comparators that must all hold; an empty
//! specifier matches every version.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Semantic version (major.minor.patch-prerelease+build)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

/// Version requirement (`>=1.0.0,<2.0.0`, `^1.2`, `==1.*`, `~=1.4`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionReq {
    pub comparators: Vec<Comparator>,
}

/// Individual version comparator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: PartialVersion,
}

/// Comparison operator for version requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Exact,      // ==1.0.0, =1.0.0, 1.0.0, ==1.*
    NotEqual,   // !=1.0.0, !=1.*
    Greater,    // >1.0.0
    GreaterEq,  // >=1.0.0
    Less,       // <1.0.0
    LessEq,     // <=1.0.0
    Tilde,      // ~1.0.0
    Caret,      // ^1.0.0
    Compatible, // ~=1.4
    Wildcard,   // *
}

/// Partial version for comparisons (may have missing components)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialVersion {
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub prerelease: Option<String>,
}

/// Version parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid number in version: {component}")]
    InvalidNumber { component: String },

    #[error("Invalid prerelease identifier: {prerelease}")]
    InvalidPrerelease { prerelease: String },

    #[error("Invalid build metadata: {build}")]
    InvalidBuild { build: String },

    #[error("Invalid version specifier '{input}': {reason}")]
    InvalidSpecifier { input: String, reason: String },
}

impl Version {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Check if this version satisfies a version requirement
    pub fn satisfies(&self, req: &VersionReq) -> bool {
        req.matches(self)
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Get the precedence for comparison (ignores build metadata)
    fn precedence_cmp(&self, other: &Self) -> Ordering {
        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Equal => match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => prerelease_cmp(a, b),
            },
            other => other,
        }
    }
}

/// Compare dot-separated prerelease identifiers.
///
/// Numeric identifiers compare numerically and sort before alphanumeric ones;
/// a shorter identifier list sorts first when it is a prefix of the longer.
fn prerelease_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            },
        }
    }
}

fn is_valid_identifier_list(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn parse_number(component: &str) -> Result<u64, VersionError> {
    component.parse().map_err(|_| VersionError::InvalidNumber {
        component: component.to_string(),
    })
}

/// Split `1.2.3-pre+build` into its numeric core, prerelease and build parts.
fn split_version(input: &str) -> Result<(&str, Option<String>, Option<String>), VersionError> {
    let (version_part, build) = match input.split_once('+') {
        Some((v, b)) => {
            if !is_valid_identifier_list(b) {
                return Err(VersionError::InvalidBuild {
                    build: b.to_string(),
                });
            }
            (v, Some(b.to_string()))
        },
        None => (input, None),
    };

    let (core_part, prerelease) = match version_part.split_once('-') {
        Some((c, p)) => {
            if !is_valid_identifier_list(p) {
                return Err(VersionError::InvalidPrerelease {
                    prerelease: p.to_string(),
                });
            }
            (c, Some(p.to_string()))
        },
        None => (version_part, None),
    };

    Ok((core_part, prerelease, build))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let stripped = input.strip_prefix('v').unwrap_or(input);
        let (core_part, prerelease, build) = split_version(stripped)?;

        // One to three numeric components; missing ones are zero
        let parts: Vec<&str> = core_part.split('.').collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let major = parse_number(parts[0])?;
        let minor = parts.get(1).map(|p| parse_number(p)).transpose()?.unwrap_or(0);
        let patch = parts.get(2).map(|p| parse_number(p)).transpose()?.unwrap_or(0);

        Ok(Version {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }

        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }

        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.precedence_cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_cmp(other)
    }
}

impl VersionReq {
    /// A requirement that matches every version
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a comma- or whitespace-separated version requirement string
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let mut comparators = Vec::new();
        for clause in input.split(',') {
            let mut pending_op: Option<&str> = None;
            for word in clause.split_whitespace() {
                // An operator written apart from its version (">= 1.0")
                if word.chars().all(|c| "<>=!~^".contains(c)) {
                    pending_op = Some(word);
                    continue;
                }
                let text = match pending_op.take() {
                    Some(op) => format!("{}{}", op, word),
                    None => word.to_string(),
                };
                comparators.push(Comparator::parse(&text)?);
            }
            if let Some(op) = pending_op {
                return Err(VersionError::InvalidSpecifier {
                    input: input.to_string(),
                    reason: format!("operator '{}' has no version", op),
                });
            }
        }
        Ok(VersionReq { comparators })
    }

    /// Check if a version matches this requirement
    pub fn matches(&self, version: &Version) -> bool {
        self.comparators.iter().all(|comp| comp.matches(version))
    }

    /// True when no comparator constrains the version
    pub fn is_any(&self) -> bool {
        self.comparators.iter().all(|c| c.op == Op::Wildcard)
    }
}

impl FromStr for VersionReq {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionReq::parse(s)
    }
}

impl TryFrom<String> for VersionReq {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        VersionReq::parse(&value)
    }
}

impl From<VersionReq> for String {
    fn from(req: VersionReq) -> Self {
        req.to_string()
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, comparator) in self.comparators.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", comparator)?;
        }
        Ok(())
    }
}

impl Comparator {
    /// Parse a single comparator such as `>=1.2` or `==2.*`
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        if input == "*" {
            return Ok(Comparator {
                op: Op::Wildcard,
                version: PartialVersion::new(0),
            });
        }

        // Longer operators first so `~=` is not read as `~`
        const OPERATORS: [(&str, Op); 10] = [
            ("~=", Op::Compatible),
            ("==", Op::Exact),
            ("!=", Op::NotEqual),
            (">=", Op::GreaterEq),
            ("<=", Op::LessEq),
            (">", Op::Greater),
            ("<", Op::Less),
            ("=", Op::Exact),
            ("^", Op::Caret),
            ("~", Op::Tilde),
        ];
        let (op, version_str) = OPERATORS
            .iter()
            .find_map(|(prefix, op)| input.strip_prefix(prefix).map(|rest| (*op, rest.trim())))
            .unwrap_or((Op::Exact, input));

        let invalid = |reason: &str| VersionError::InvalidSpecifier {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if version_str.is_empty() {
            return Err(invalid("missing version"));
        }

        let version = PartialVersion::parse(version_str)?;
        let is_partial = version.minor.is_none() || version.patch.is_none();

        let version = match op {
            // `==1.2` means `==1.2.0`; only an explicit `.*` leaves parts open
            Op::Exact | Op::NotEqual if !version_str.ends_with(".*") => version.zero_filled(),
            Op::Exact | Op::NotEqual => version,
            Op::Compatible if version.minor.is_none() => {
                return Err(invalid("'~=' needs at least major.minor"));
            },
            _ if version_str.ends_with(".*") => {
                return Err(invalid("wildcards are only allowed with '==' and '!='"));
            },
            Op::Greater | Op::GreaterEq | Op::Less | Op::LessEq if is_partial => {
                version.zero_filled()
            },
            _ => version,
        };

        Ok(Comparator { op, version })
    }

    /// Check if a version matches this comparator
    pub fn matches(&self, version: &Version) -> bool {
        match self.op {
            Op::Exact => self.version.matches_exact(version),
            Op::NotEqual => !self.version.matches_exact(version),
            Op::Wildcard => true,
            Op::Greater => version > &self.version.to_version(),
            Op::GreaterEq => version >= &self.version.to_version(),
            Op::Less => version < &self.version.to_version(),
            Op::LessEq => version <= &self.version.to_version(),
            Op::Tilde => self.version.matches_tilde(version),
            Op::Caret => self.version.matches_caret(version),
            Op::Compatible => self.version.matches_compatible(version),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Wildcard => return f.write_str("*"),
            Op::Exact => "==",
            Op::NotEqual => "!=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Tilde => "~",
            Op::Caret => "^",
            Op::Compatible => "~=",
        };
        write!(f, "{}{}", op, self.version)?;
        let open_ended = self.version.minor.is_none() || self.version.patch.is_none();
        if matches!(self.op, Op::Exact | Op::NotEqual) && open_ended {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

impl PartialVersion {
    /// A partial version with only the major component
    pub fn new(major: u64) -> Self {
        Self {
            major,
            minor: None,
            patch: None,
            prerelease: None,
        }
    }

    /// Parse `1`, `1.2`, `1.2.3`, `1.2.3-rc.1` or a trailing `.*` wildcard
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.strip_prefix('v').unwrap_or(input);
        let input = input.strip_suffix(".*").unwrap_or(input);
        let (core_part, prerelease, _build) = split_version(input)?;

        let parts: Vec<&str> = core_part.split('.').collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        Ok(PartialVersion {
            major: parse_number(parts[0])?,
            minor: parts.get(1).map(|p| parse_number(p)).transpose()?,
            patch: parts.get(2).map(|p| parse_number(p)).transpose()?,
            prerelease,
        })
    }

    fn zero_filled(self) -> Self {
        Self {
            minor: Some(self.minor.unwrap_or(0)),
            patch: Some(self.patch.unwrap_or(0)),
            ..self
        }
    }

    /// Convert to a full version (filling missing parts with 0)
    pub fn to_version(&self) -> Version {
        Version {
            major: self.major,
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            prerelease: self.prerelease.clone(),
            build: None,
        }
    }

    /// Check exact match
    fn matches_exact(&self, version: &Version) -> bool {
        version.major == self.major
            && self.minor.map_or(true, |m| version.minor == m)
            && self.patch.map_or(true, |p| version.patch == p)
            && (self.patch.is_none() || version.prerelease == self.prerelease)
    }

    /// Check tilde match (~1.2.3 allows >=1.2.3 <1.3.0)
    fn matches_tilde(&self, version: &Version) -> bool {
        if version.major != self.major || version < &self.to_version() {
            return false;
        }

        match self.minor {
            Some(minor) => version.minor == minor,
            None => true,
        }
    }

    /// Check caret match (^1.2.3 allows >=1.2.3 <2.0.0, ^0.2.3 allows <0.3.0)
    fn matches_caret(&self, version: &Version) -> bool {
        if version.major != self.major || version < &self.to_version() {
            return false;
        }

        if self.major > 0 {
            return true;
        }

        match (self.minor, self.patch) {
            (None, _) => true,
            (Some(minor), _) if minor > 0 => version.minor == minor,
            (Some(minor), None) => version.minor == minor,
            (Some(minor), Some(patch)) => version.minor == minor && version.patch == patch,
        }
    }

    /// Check compatible-release match (~=1.4 allows >=1.4 ==1.*, ~=1.4.2 allows >=1.4.2 ==1.4.*)
    fn matches_compatible(&self, version: &Version) -> bool {
        if version < &self.to_version() || version.major != self.major {
            return false;
        }

        match (self.minor, self.patch) {
            (Some(minor), Some(_)) => version.minor == minor,
            _ => true,
        }
    }
}

impl fmt::Display for PartialVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{}", minor)?;
        }
        if let Some(patch) = self.patch {
            write!(f, ".{}", patch)?;
        }
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_version_parsing() {
        let v = Version::from_str("1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.prerelease, None);
        assert_eq!(v.build, None);
    }

    #[test]
    fn test_short_versions_are_zero_filled() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("v2.0.1"), Version::new(2, 0, 1));
        assert!(Version::from_str("1.2.3.4").is_err());
        assert!(Version::from_str("1..2").is_err());
        assert!(Version::from_str("").is_err());
    }

    #[test]
    fn test_version_with_prerelease_and_build() {
        let v = Version::from_str("1.2.3-alpha.1+build.1").unwrap();
        assert_eq!(v.prerelease, Some("alpha.1".to_string()));
        assert_eq!(v.build, Some("build.1".to_string()));
        assert_eq!(v.to_string(), "1.2.3-alpha.1+build.1");
    }

    #[test]
    fn test_prerelease_precedence() {
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.beta"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.11"));
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
        assert_eq!(v("1.0.0+a"), v("1.0.0+b"));
    }

    #[test]
    fn test_version_req_exact() {
        let req = VersionReq::parse("1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(!req.matches(&v("1.2.4")));

        let req = VersionReq::parse("==1.2").unwrap();
        assert!(req.matches(&v("1.2.0")));
        assert!(!req.matches(&v("1.2.1")));
    }

    #[test]
    fn test_version_req_wildcards() {
        let req = VersionReq::parse("*").unwrap();
        assert!(req.matches(&v("999.999.999")));

        let req = VersionReq::parse("==1.*").unwrap();
        assert!(req.matches(&v("1.0.0")));
        assert!(req.matches(&v("1.9.3")));
        assert!(!req.matches(&v("2.0.0")));

        let req = VersionReq::parse("!=1.2.*").unwrap();
        assert!(req.matches(&v("1.3.0")));
        assert!(!req.matches(&v("1.2.7")));

        assert!(VersionReq::parse(">=1.*").is_err());
    }

    #[test]
    fn test_empty_req_matches_everything() {
        let req = VersionReq::parse("").unwrap();
        assert!(req.comparators.is_empty());
        assert!(req.is_any());
        assert!(req.matches(&v("0.0.1")));
        assert_eq!(req.to_string(), "");
    }

    #[test]
    fn test_version_req_range() {
        let req = VersionReq::parse(">=1.0.0,<2.0.0").unwrap();
        assert_eq!(req.comparators.len(), 2);
        assert!(req.matches(&v("1.0.0")));
        assert!(req.matches(&v("1.99.0")));
        assert!(!req.matches(&v("2.0.0")));
        assert!(!req.matches(&v("0.9.0")));

        let spaced = VersionReq::parse(">= 1.0, < 2").unwrap();
        assert_eq!(spaced, req);
        assert_eq!(spaced.to_string(), ">=1.0.0,<2.0.0");
    }

    #[test]
    fn test_version_req_caret() {
        let req = VersionReq::parse("^1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(req.matches(&v("1.3.0")));
        assert!(!req.matches(&v("2.0.0")));
        assert!(!req.matches(&v("1.2.2")));

        let req = VersionReq::parse("^0.2.3").unwrap();
        assert!(req.matches(&v("0.2.9")));
        assert!(!req.matches(&v("0.3.0")));

        let req = VersionReq::parse("^0.0.3").unwrap();
        assert!(req.matches(&v("0.0.3")));
        assert!(!req.matches(&v("0.0.4")));
    }

    #[test]
    fn test_version_req_tilde_and_compatible() {
        let req = VersionReq::parse("~1.2.3").unwrap();
        assert!(req.matches(&v("1.2.9")));
        assert!(!req.matches(&v("1.3.0")));
        assert!(!req.matches(&v("1.2.2")));

        let req = VersionReq::parse("~=1.4").unwrap();
        assert!(req.matches(&v("1.4.0")));
        assert!(req.matches(&v("1.9.0")));
        assert!(!req.matches(&v("2.0.0")));

        let req = VersionReq::parse("~=1.4.2").unwrap();
        assert!(req.matches(&v("1.4.5")));
        assert!(!req.matches(&v("1.5.0")));

        assert!(VersionReq::parse("~=1").is_err());
    }

    #[test]
    fn test_version_req_operators() {
        let req = VersionReq::parse(">1.2.3").unwrap();
        assert!(!req.matches(&v("1.2.3")));
        assert!(req.matches(&v("1.2.4")));

        let req = VersionReq::parse("<=1.2.3").unwrap();
        assert!(req.matches(&v("1.2.3")));
        assert!(!req.matches(&v("1.2.4")));

        let req = VersionReq::parse("!=1.2.3").unwrap();
        assert!(!req.matches(&v("1.2.3")));
        assert!(req.matches(&v("1.2.4")));
    }

    #[test]
    fn test_invalid_specifiers() {
        assert!(VersionReq::parse(">=").is_err());
        assert!(VersionReq::parse(">= ").is_err());
        assert!(VersionReq::parse("banana").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.2.3")).unwrap();
        assert_eq!(json, "\"1.2.3\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.2.3"));

        let req: VersionReq = serde_json::from_str("\">=1.0\"").unwrap();
        assert_eq!(req.to_string(), ">=1.0.0");
    }
}
