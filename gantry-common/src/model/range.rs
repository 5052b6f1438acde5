//! Version requirement grammar.
//!
//! A bare version like `1.5` is a soft requirement: a recommendation that
//! constrains nothing. Bracketed forms are hard ranges over the version
//! order: `[1.0]`, `[1.0,2.0)`, `(,1.5]`, `[1.0,)`, and comma-joined
//! unions such as `(,1.0],[1.2,)`.

use std::cmp::Ordering;
use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GantryError, Result};
use crate::model::version::Version;

const CONTEXT: &str = "version range";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// One contiguous interval of a hard range. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Interval {
    fn contains(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            match version.compare(&lower.version) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match version.compare(&upper.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    fn is_degenerate(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => match lo.version.compare(&hi.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lo.inclusive && hi.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    fn intersect(&self, other: &Interval) -> Option<Interval> {
        let lower = tighter_bound(&self.lower, &other.lower, true);
        let upper = tighter_bound(&self.upper, &other.upper, false);
        let merged = Interval { lower, upper };
        if merged.is_degenerate() {
            None
        } else {
            Some(merged)
        }
    }
}

/// Picks the tighter of two optional bounds: the higher lower bound or the
/// lower upper bound. Equal versions combine inclusivity with AND.
fn tighter_bound(a: &Option<Bound>, b: &Option<Bound>, is_lower: bool) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (Some(x), Some(y)) => match x.version.compare(&y.version) {
            Ordering::Equal => Some(Bound {
                version: x.version.clone(),
                inclusive: x.inclusive && y.inclusive,
            }),
            Ordering::Less => Some(if is_lower { y.clone() } else { x.clone() }),
            Ordering::Greater => Some(if is_lower { x.clone() } else { y.clone() }),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionRange {
    /// A recommendation; satisfied by any version.
    Soft(Version),
    /// A union of intervals; empty vector means no version satisfies.
    Hard(Vec<Interval>),
}

impl VersionRange {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GantryError::ParseError(CONTEXT, "empty requirement".into()));
        }
        if trimmed.starts_with('[') || trimmed.starts_with('(') {
            return Ok(VersionRange::Hard(parse_intervals(trimmed)?));
        }
        if trimmed.contains(['[', ']', '(', ')', ',']) {
            return Err(GantryError::ParseError(
                CONTEXT,
                format!("'{trimmed}' mixes range punctuation into a plain version"),
            ));
        }
        Ok(VersionRange::Soft(Version::parse(trimmed)))
    }

    pub fn is_soft(&self) -> bool {
        matches!(self, VersionRange::Soft(_))
    }

    pub fn is_hard(&self) -> bool {
        matches!(self, VersionRange::Hard(_))
    }

    pub fn soft_recommendation(&self) -> Option<&Version> {
        match self {
            VersionRange::Soft(version) => Some(version),
            VersionRange::Hard(_) => None,
        }
    }

    /// True when no version can satisfy this range. Soft requirements are
    /// never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            VersionRange::Soft(_) => false,
            VersionRange::Hard(intervals) => intervals.is_empty(),
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionRange::Soft(_) => true,
            VersionRange::Hard(intervals) => intervals.iter().any(|i| i.contains(version)),
        }
    }

    /// Intersects two requirements. A soft requirement is the identity:
    /// it constrains nothing, so the other side passes through.
    pub fn intersect(&self, other: &VersionRange) -> VersionRange {
        match (self, other) {
            (VersionRange::Soft(_), _) => other.clone(),
            (_, VersionRange::Soft(_)) => self.clone(),
            (VersionRange::Hard(a), VersionRange::Hard(b)) => {
                let mut merged = Vec::new();
                for x in a {
                    for y in b {
                        if let Some(interval) = x.intersect(y) {
                            merged.push(interval);
                        }
                    }
                }
                merged.sort_by(|x, y| cmp_interval_start(x, y));
                merged.dedup();
                VersionRange::Hard(merged)
            }
        }
    }

    /// Highest candidate the range admits. Among candidates that compare
    /// equal, a release is preferred over a snapshot.
    pub fn pick_highest_satisfying(&self, candidates: &[Version]) -> Option<Version> {
        let mut best: Option<&Version> = None;
        for candidate in candidates {
            if !self.contains(candidate) {
                continue;
            }
            best = match best {
                None => Some(candidate),
                Some(current) => match candidate.compare(current) {
                    Ordering::Greater => Some(candidate),
                    Ordering::Equal if current.is_snapshot() && !candidate.is_snapshot() => {
                        Some(candidate)
                    }
                    _ => Some(current),
                },
            };
        }
        best.cloned()
    }
}

fn cmp_interval_start(a: &Interval, b: &Interval) -> Ordering {
    match (&a.lower, &b.lower) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.version.compare(&y.version),
    }
}

fn parse_intervals(raw: &str) -> Result<Vec<Interval>> {
    let mut intervals = Vec::new();
    let mut rest = raw;
    loop {
        let open_inclusive = match rest.chars().next() {
            Some('[') => true,
            Some('(') => false,
            Some(other) => {
                return Err(GantryError::ParseError(
                    CONTEXT,
                    format!("expected '[' or '(' in '{raw}', found '{other}'"),
                ))
            }
            None => {
                return Err(GantryError::ParseError(
                    CONTEXT,
                    format!("trailing separator in '{raw}'"),
                ))
            }
        };
        let close = rest.find([']', ')']).ok_or_else(|| {
            GantryError::ParseError(CONTEXT, format!("unclosed bracket in '{raw}'"))
        })?;
        let close_inclusive = rest[close..].starts_with(']');
        let body = &rest[1..close];
        intervals.push(build_interval(raw, body, open_inclusive, close_inclusive)?);
        rest = &rest[close + 1..];
        if rest.is_empty() {
            return Ok(intervals);
        }
        rest = rest.strip_prefix(',').ok_or_else(|| {
            GantryError::ParseError(
                CONTEXT,
                format!("expected ',' between ranges in '{raw}'"),
            )
        })?;
    }
}

fn build_interval(
    raw: &str,
    body: &str,
    open_inclusive: bool,
    close_inclusive: bool,
) -> Result<Interval> {
    let parts: Vec<&str> = body.split(',').collect();
    let interval = match parts.as_slice() {
        [single] => {
            let text = single.trim();
            if text.is_empty() {
                return Err(GantryError::ParseError(
                    CONTEXT,
                    format!("empty range member in '{raw}'"),
                ));
            }
            if !(open_inclusive && close_inclusive) {
                return Err(GantryError::ParseError(
                    CONTEXT,
                    format!("exact requirement must be written [{text}] in '{raw}'"),
                ));
            }
            let bound = Bound {
                version: Version::parse(text),
                inclusive: true,
            };
            Interval {
                lower: Some(bound.clone()),
                upper: Some(bound),
            }
        }
        [low, high] => {
            let lower = bound_from(low, open_inclusive);
            let upper = bound_from(high, close_inclusive);
            Interval { lower, upper }
        }
        _ => {
            return Err(GantryError::ParseError(
                CONTEXT,
                format!("too many commas inside one range of '{raw}'"),
            ))
        }
    };
    if interval.is_degenerate() {
        return Err(GantryError::ParseError(
            CONTEXT,
            format!("range admits no versions in '{raw}'"),
        ));
    }
    Ok(interval)
}

fn bound_from(text: &str, inclusive: bool) -> Option<Bound> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(Bound {
            version: Version::parse(trimmed),
            inclusive,
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Soft(version) => write!(f, "{version}"),
            VersionRange::Hard(intervals) => {
                for (i, interval) in intervals.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_interval(f, interval)?;
                }
                Ok(())
            }
        }
    }
}

fn write_interval(f: &mut fmt::Formatter<'_>, interval: &Interval) -> fmt::Result {
    if let (Some(lo), Some(hi)) = (&interval.lower, &interval.upper) {
        if lo.inclusive && hi.inclusive && lo.version == hi.version {
            return write!(f, "[{}]", lo.version);
        }
    }
    match &interval.lower {
        Some(lo) => write!(f, "{}{}", if lo.inclusive { '[' } else { '(' }, lo.version)?,
        None => f.write_str("(")?,
    }
    f.write_str(",")?;
    match &interval.upper {
        Some(hi) => write!(f, "{}{}", hi.version, if hi.inclusive { ']' } else { ')' }),
        None => f.write_str(")"),
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionRange::parse(&raw).map_err(|e| D::Error::custom(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    fn r(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    #[test]
    fn parse_display_round_trips() {
        for raw in [
            "1.5",
            "[1.0]",
            "[1.0,2.0)",
            "(,1.5]",
            "[1.0,)",
            "(,1.0],[1.2,)",
            "(1.0,2.0)",
        ] {
            assert_eq!(r(raw).to_string(), raw, "round trip of {raw}");
        }
    }

    #[test]
    fn soft_requirements_constrain_nothing() {
        let soft = r("1.5");
        assert!(soft.is_soft());
        assert_eq!(soft.soft_recommendation(), Some(&v("1.5")));
        assert!(soft.contains(&v("0.1")));
        assert!(soft.contains(&v("99.0")));
    }

    #[test]
    fn half_open_interval_membership() {
        let range = r("[1.0,2.0)");
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("1.5")));
        assert!(range.contains(&v("1.999")));
        assert!(!range.contains(&v("2.0")));
        assert!(!range.contains(&v("0.9")));
    }

    #[test]
    fn unbounded_sides() {
        let upper = r("(,1.5]");
        assert!(upper.contains(&v("0.1")));
        assert!(upper.contains(&v("1.5")));
        assert!(!upper.contains(&v("1.6")));

        let lower = r("[1.0,)");
        assert!(lower.contains(&v("1.0")));
        assert!(lower.contains(&v("42")));
        assert!(!lower.contains(&v("0.9")));
    }

    #[test]
    fn exact_requirement_matches_equal_versions() {
        let exact = r("[1.0]");
        assert!(exact.contains(&v("1.0")));
        assert!(exact.contains(&v("1.0.0")));
        assert!(!exact.contains(&v("1.0.1")));
    }

    #[test]
    fn union_takes_either_side() {
        let union = r("(,1.0],[1.2,)");
        assert!(union.contains(&v("0.5")));
        assert!(union.contains(&v("1.0")));
        assert!(!union.contains(&v("1.1")));
        assert!(union.contains(&v("1.2")));
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        for raw in ["[1.0", "[2.0,1.0]", "(1.0)", "[1.0,2.0)x", "[a,b,c]", "[]", "1.0]"] {
            assert!(
                VersionRange::parse(raw).is_err(),
                "'{raw}' should not parse"
            );
        }
    }

    #[test]
    fn picks_highest_satisfying_candidate() {
        let range = r("[1.0,2.0)");
        let candidates = [v("1.0"), v("1.5"), v("2.0")];
        assert_eq!(range.pick_highest_satisfying(&candidates), Some(v("1.5")));

        let none: Option<Version> = r("[3.0,)").pick_highest_satisfying(&candidates);
        assert_eq!(none, None);
    }

    #[test]
    fn equal_candidates_prefer_the_release() {
        let range = r("[1.0,2.0)");
        let picked = range
            .pick_highest_satisfying(&[v("1.5-SNAPSHOT"), v("1.4")])
            .unwrap();
        assert_eq!(picked.as_str(), "1.5-SNAPSHOT");

        let picked = range
            .pick_highest_satisfying(&[v("1.5-SNAPSHOT"), v("1.5")])
            .unwrap();
        assert_eq!(picked.as_str(), "1.5");
    }

    #[test]
    fn intersection_narrows_ranges() {
        let merged = r("[1.0,2.0)").intersect(&r("[1.5,3.0]"));
        assert_eq!(merged.to_string(), "[1.5,2.0)");
        assert!(merged.contains(&v("1.5")));
        assert!(!merged.contains(&v("2.0")));
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let merged = r("(,1.0]").intersect(&r("[1.2,)"));
        assert!(merged.is_empty());
        assert!(!merged.contains(&v("1.1")));
    }

    #[test]
    fn soft_is_identity_for_intersection() {
        let hard = r("[1.0,2.0)");
        assert_eq!(r("1.5").intersect(&hard), hard);
        assert_eq!(hard.intersect(&r("1.5")), hard);
    }

    #[test]
    fn serde_uses_the_text_form() {
        let range: VersionRange = serde_json::from_str("\"[1.0,2.0)\"").unwrap();
        assert!(range.is_hard());
        assert_eq!(serde_json::to_string(&range).unwrap(), "\"[1.0,2.0)\"");
        assert!(serde_json::from_str::<VersionRange>("\"[oops\"").is_err());
    }
}
