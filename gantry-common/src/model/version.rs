//! Version ordering for build-tool artifact versions.
//!
//! Versions tokenize on `.` and `-` separators and on digit/letter
//! transitions. Numeric tokens compare numerically, qualifier tokens by a
//! fixed ladder (`alpha` < `beta` < `milestone` < `rc` < `snapshot` <
//! release < `sp`), and unknown qualifiers sort lexically after `sp`.
//! Missing trailing components count as zero, so `1.0 == 1.0.0`, and a
//! `-SNAPSHOT` version orders below its release.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Deployed snapshots carry a timestamp in place of the SNAPSHOT literal,
// e.g. 1.0-20260820.101530-3 for build 3 of 1.0-SNAPSHOT.
static TIMESTAMPED_SNAPSHOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<base>.+)-(?P<date>\d{8})\.(?P<time>\d{6})-(?P<build>\d+)$").unwrap());

const SNAPSHOT_SUFFIX: &str = "-snapshot";

const RANK_ALPHA: u8 = 1;
const RANK_BETA: u8 = 2;
const RANK_MILESTONE: u8 = 3;
const RANK_RC: u8 = 4;
const RANK_SNAPSHOT: u8 = 5;
const RANK_RELEASE: u8 = 6;
const RANK_SP: u8 = 7;
const RANK_OTHER: u8 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Token {
    Num(u64),
    // Rank plus the lowercased text; text is only kept for RANK_OTHER,
    // where ties break lexically.
    Qual(u8, String),
}

impl Token {
    fn null_of_same_kind(&self) -> Token {
        match self {
            Token::Num(_) => Token::Num(0),
            Token::Qual(..) => Token::Qual(RANK_RELEASE, String::new()),
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Token::Num(0)) || matches!(self, Token::Qual(RANK_RELEASE, _))
    }
}

fn cmp_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Num(x), Token::Num(y)) => x.cmp(y),
        // A numeric token always outranks a qualifier at the same position.
        (Token::Num(_), Token::Qual(..)) => Ordering::Greater,
        (Token::Qual(..), Token::Num(_)) => Ordering::Less,
        (Token::Qual(ra, ta), Token::Qual(rb, tb)) => ra.cmp(rb).then_with(|| ta.cmp(tb)),
    }
}

fn compare_token_lists(a: &[Token], b: &[Token]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ord = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => cmp_tokens(x, y),
            (Some(x), None) => cmp_tokens(x, &x.null_of_same_kind()),
            (None, Some(y)) => cmp_tokens(&y.null_of_same_kind(), y),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Maps a qualifier token to its ladder rank. `attached` is true when the
/// token was split off a digit run without a separator, which is what makes
/// the one-letter aliases (`a`/`b`/`m`) valid.
fn qualifier_token(text: &str, attached: bool) -> Token {
    let lower = text.to_ascii_lowercase();
    let rank = match lower.as_str() {
        "alpha" => RANK_ALPHA,
        "beta" => RANK_BETA,
        "milestone" => RANK_MILESTONE,
        "rc" | "cr" => RANK_RC,
        "snapshot" => RANK_SNAPSHOT,
        "" | "ga" | "final" | "release" => RANK_RELEASE,
        "sp" => RANK_SP,
        "a" if attached => RANK_ALPHA,
        "b" if attached => RANK_BETA,
        "m" if attached => RANK_MILESTONE,
        _ => RANK_OTHER,
    };
    if rank == RANK_OTHER {
        Token::Qual(rank, lower)
    } else {
        Token::Qual(rank, String::new())
    }
}

fn push_chunk(tokens: &mut Vec<Token>, chunk: &str, is_digits: bool, followed_by_digit: bool) {
    if chunk.is_empty() {
        return;
    }
    if is_digits {
        tokens.push(Token::Num(chunk.parse::<u64>().unwrap_or(u64::MAX)));
    } else {
        // Zeros contribute nothing ahead of a qualifier: 1.0-SNAPSHOT and
        // 1.0.0-SNAPSHOT are the same version.
        trim_null_nums(tokens);
        tokens.push(qualifier_token(chunk, followed_by_digit));
    }
}

fn trim_null_nums(tokens: &mut Vec<Token>) {
    while matches!(tokens.last(), Some(Token::Num(0))) {
        tokens.pop();
    }
}

fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chunk = String::new();
    let mut chunk_is_digits = false;
    for ch in raw.chars() {
        if ch == '.' || ch == '-' {
            push_chunk(&mut tokens, &chunk, chunk_is_digits, false);
            chunk.clear();
        } else {
            let digit = ch.is_ascii_digit();
            if !chunk.is_empty() && digit != chunk_is_digits {
                // Transition between digits and letters splits the token;
                // a qualifier running into a digit enables the short
                // aliases, as in 1.0a1.
                push_chunk(&mut tokens, &chunk, chunk_is_digits, digit);
                chunk.clear();
            }
            chunk_is_digits = digit;
            chunk.push(ch);
        }
    }
    push_chunk(&mut tokens, &chunk, chunk_is_digits, false);
    tokens
}

fn trim_nulls(tokens: &mut Vec<Token>) {
    while tokens.last().is_some_and(Token::is_null) {
        tokens.pop();
    }
}

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    tokens: Vec<Token>,
    snapshot: bool,
    timestamped: bool,
}

impl Version {
    /// Parses a version string. Never fails: any string is an ordered
    /// version, however odd.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(caps) = TIMESTAMPED_SNAPSHOT_RE.captures(trimmed) {
            // The timestamp block sorts inside the snapshot band of its
            // base version: newer pins above older ones, all below the
            // release. Trailing zeros of the base drop before the marker
            // so positions line up with the literal -SNAPSHOT form.
            let mut tokens = tokenize(&caps["base"]);
            trim_null_nums(&mut tokens);
            tokens.push(Token::Qual(RANK_SNAPSHOT, String::new()));
            tokens.push(Token::Num(caps["date"].parse().unwrap_or(u64::MAX)));
            tokens.push(Token::Num(caps["time"].parse().unwrap_or(u64::MAX)));
            tokens.push(Token::Num(caps["build"].parse().unwrap_or(u64::MAX)));
            return Self {
                raw: trimmed.to_string(),
                tokens,
                snapshot: true,
                timestamped: true,
            };
        }
        let mut tokens = tokenize(trimmed);
        trim_nulls(&mut tokens);
        let lower = trimmed.to_ascii_lowercase();
        let snapshot = lower.ends_with(SNAPSHOT_SUFFIX) || lower == "snapshot";
        Self {
            raw: trimmed.to_string(),
            tokens,
            snapshot,
            timestamped: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    pub fn is_timestamped_snapshot(&self) -> bool {
        self.timestamped
    }

    /// For a timestamped snapshot, the `-SNAPSHOT` version it was deployed
    /// from; otherwise the version itself.
    pub fn base_version(&self) -> Version {
        if self.timestamped {
            if let Some(caps) = TIMESTAMPED_SNAPSHOT_RE.captures(&self.raw) {
                return Version::parse(&format!("{}-SNAPSHOT", &caps["base"]));
            }
        }
        self.clone()
    }

    pub fn compare(&self, other: &Version) -> Ordering {
        compare_token_lists(&self.tokens, &other.tokens)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tokens.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Version::parse(raw)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Err(D::Error::custom("version must not be empty"));
        }
        Ok(Version::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn numeric_components_compare_numerically() {
        assert!(v("1.0") < v("1.1"));
        assert!(v("1.2") < v("1.10"));
        assert!(v("2.0") < v("10.0"));
        assert!(v("1.0") < v("1.0.1"));
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1.0"), v("1.0-ga"));
        assert_eq!(v("1.0"), v("1.0.final"));
        let mut set = HashSet::new();
        set.insert(v("1.0"));
        assert!(set.contains(&v("1.0.0")));
    }

    #[test]
    fn snapshot_orders_below_release() {
        assert!(v("1.0-SNAPSHOT") < v("1.0"));
        assert!(v("1.0") < v("1.0.1-SNAPSHOT"));
        assert!(v("1.0-SNAPSHOT") < v("1.0-sp1"));
    }

    #[test]
    fn qualifier_ladder_is_ordered() {
        let ladder = [
            "1.0-alpha",
            "1.0-beta",
            "1.0-milestone",
            "1.0-rc",
            "1.0-SNAPSHOT",
            "1.0",
            "1.0-sp",
        ];
        for pair in ladder.windows(2) {
            assert!(
                v(pair[0]) < v(pair[1]),
                "{} should sort below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn unknown_qualifiers_sort_after_sp_lexically() {
        assert!(v("1.0-sp") < v("1.0-abc"));
        assert!(v("1.0-abc") < v("1.0-xyz"));
        assert!(v("1.0") < v("1.0-abc"));
    }

    #[test]
    fn short_aliases_apply_when_attached_to_digits() {
        assert_eq!(v("1.0a1"), v("1.0-alpha-1"));
        assert_eq!(v("1.0b2"), v("1.0-beta-2"));
        assert_eq!(v("1.0m3"), v("1.0-milestone-3"));
        assert_eq!(v("1.0-cr1"), v("1.0-rc1"));
        // Unattached single letters are ordinary qualifiers.
        assert_ne!(v("1.0-a"), v("1.0-alpha"));
    }

    #[test]
    fn trailing_zeros_before_qualifiers_are_ignored() {
        assert_eq!(v("1.0-SNAPSHOT"), v("1.0.0-SNAPSHOT"));
        assert_eq!(v("1.0-alpha"), v("1-alpha"));
        assert!(v("1.0.0-SNAPSHOT") < v("1.0"));
        assert_eq!(v("1.0.0-20260820.101530-3"), v("1.0-20260820.101530-3"));
    }

    #[test]
    fn comparison_ignores_case() {
        assert_eq!(v("1.0-ALPHA"), v("1.0-alpha"));
        assert_eq!(v("1.0-snapshot"), v("1.0-SNAPSHOT"));
    }

    #[test]
    fn order_is_total_and_consistent() {
        let mut versions = vec![v("1.0"), v("0.9"), v("1.0-rc"), v("1.1"), v("1.0-SNAPSHOT")];
        versions.sort();
        let rendered: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(rendered, ["0.9", "1.0-rc", "1.0-SNAPSHOT", "1.0", "1.1"]);
    }

    #[test]
    fn timestamped_snapshots_belong_to_their_base() {
        let pinned = v("1.0-20260820.101530-3");
        assert!(pinned.is_snapshot());
        assert!(pinned.is_timestamped_snapshot());
        assert_eq!(pinned.base_version(), v("1.0-SNAPSHOT"));
        assert!(v("1.0-SNAPSHOT") < pinned);
        assert!(pinned < v("1.0"));
        assert!(pinned < v("1.0-20260821.000000-1"));
        assert!(v("1.0-20260820.101530-2") < pinned);
    }

    #[test]
    fn display_round_trips_raw_text() {
        for raw in ["1.0", "1.0-SNAPSHOT", "1.0-20260820.101530-3", "2.5.1-rc2"] {
            assert_eq!(v(raw).to_string(), raw);
        }
    }

    #[test]
    fn serde_uses_the_string_form() {
        let version: Version = serde_json::from_str("\"1.0-SNAPSHOT\"").unwrap();
        assert!(version.is_snapshot());
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"1.0-SNAPSHOT\"");
        assert!(serde_json::from_str::<Version>("\"  \"").is_err());
    }
}
