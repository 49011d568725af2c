//! Capability rule table: the mapping between author-facing tokens and the
//! packed restriction bitmap.
//!
//! Bit layout (a zero range means "unrestricted" for that facet):
//!
//! ```text
//!   bits 0-1  DOM access      00 = full, 01 = protective, 11 = none
//!   bit  2    cookie access   0 = allowed, 1 = denied
//!   bit  3    network access  0 = allowed, 1 = denied
//! ```
//!
//! A JS capability string is `token(;token)*;` where the last token may be a
//! whitelist, `JS_WL:name(,name)*`. The table is immutable once built; one
//! instance is shared by everything in a scheduling domain.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DOM_MASK: u64 = 0b11;
pub const DOM_PROTECTIVE: u64 = 0b01;
pub const DOM_NONE: u64 = 0b11;
pub const COOKIE_DENIED: u64 = 1 << 2;
pub const NETWORK_DENIED: u64 = 1 << 3;

/// Every facet at its most restrictive level.
pub const ALL_RESTRICTIONS: u64 = DOM_NONE | COOKIE_DENIED | NETWORK_DENIED;

pub const TOKEN_NO_DOM: &str = "No_DOM_Access";
pub const TOKEN_PROTECTIVE_DOM: &str = "DOM_Access_Protective";
pub const TOKEN_DOM: &str = "DOM_Access";
pub const TOKEN_NO_COOKIE: &str = "No_Cookie_Access";
pub const TOKEN_COOKIE: &str = "Cookie_Access";
pub const TOKEN_NO_NETWORK: &str = "No_Network_Access";
pub const TOKEN_NETWORK: &str = "Network_Access";

/// Marker that opens the terminal whitelist token.
pub const WHITELIST_MARKER: &str = "JS_WL";

pub const TOKEN_SEPARATOR: char = ';';
pub const WHITELIST_PREFIX: char = ':';
pub const WHITELIST_NAME_SEPARATOR: char = ',';

/// One independently restrictable facet of a capability.
struct Facet {
    mask: u64,
    /// Restrictive levels, most restrictive first.
    levels: &'static [(u64, &'static str)],
    permissive: &'static str,
}

// Fixed render order.
const FACETS: [Facet; 3] = [
    Facet {
        mask: DOM_MASK,
        levels: &[(DOM_NONE, TOKEN_NO_DOM), (DOM_PROTECTIVE, TOKEN_PROTECTIVE_DOM)],
        permissive: TOKEN_DOM,
    },
    Facet {
        mask: COOKIE_DENIED,
        levels: &[(COOKIE_DENIED, TOKEN_NO_COOKIE)],
        permissive: TOKEN_COOKIE,
    },
    Facet {
        mask: NETWORK_DENIED,
        levels: &[(NETWORK_DENIED, TOKEN_NO_NETWORK)],
        permissive: TOKEN_NETWORK,
    },
];

/// What a capability loader does with a string it cannot parse.
///
/// ```toml
/// malformed_spec = "unrestricted"
/// malformed_spec = "fail-closed"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedSpecPolicy {
    /// Discard the string and leave the capability unrestricted.
    #[default]
    Unrestricted,
    /// Discard the string and restrict every facet.
    FailClosed,
}

/// DOM access level decoded from the DOM bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomAccess {
    Full,
    Protective,
    None,
}

impl DomAccess {
    /// Decode the DOM facet. The unassigned `10` pattern reads as `None`.
    pub fn from_bitmap(bitmap: u64) -> Self {
        match bitmap & DOM_MASK {
            0 => DomAccess::Full,
            DOM_PROTECTIVE => DomAccess::Protective,
            _ => DomAccess::None,
        }
    }
}

/// Whether the cookie facet is restricted in `bitmap`.
pub fn denies_cookie(bitmap: u64) -> bool {
    bitmap & COOKIE_DENIED != 0
}

/// Whether the network facet is restricted in `bitmap`.
pub fn denies_network(bitmap: u64) -> bool {
    bitmap & NETWORK_DENIED != 0
}

/// Result of a successful parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCapability {
    pub bitmap: u64,
    pub whitelist: BTreeSet<String>,
}

/// Why a capability string was rejected. Parsing is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityParseError {
    #[error("capability string contains no tokens")]
    Empty,

    #[error("unrecognized capability token '{0}'")]
    UnknownToken(String),

    #[error("malformed whitelist: {0}")]
    MalformedWhitelist(String),

    #[error("IPC capability '{0}' is not a decimal bitmap")]
    InvalidIpcBitmap(String),
}

/// Bidirectional token table plus the malformed-string policy.
#[derive(Debug, Clone)]
pub struct CapabilityRules {
    tokens: HashMap<&'static str, u64>,
    inverse: HashMap<u64, &'static str>,
    shadows: HashMap<&'static str, &'static str>,
    on_malformed: MalformedSpecPolicy,
}

impl Default for CapabilityRules {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRules {
    /// Build the standard table with the unrestricted malformed-string policy.
    pub fn new() -> Self {
        let mut tokens = HashMap::new();
        let mut inverse = HashMap::new();
        let mut shadows = HashMap::new();

        for facet in &FACETS {
            tokens.insert(facet.permissive, 0);
            for &(bits, token) in facet.levels {
                tokens.insert(token, bits);
                shadows.insert(token, facet.permissive);
            }
        }
        for (&token, &bits) in &tokens {
            if bits != 0 {
                inverse.insert(bits, token);
            }
        }

        Self {
            tokens,
            inverse,
            shadows,
            on_malformed: MalformedSpecPolicy::default(),
        }
    }

    /// Replace the malformed-string policy.
    pub fn with_malformed_policy(mut self, policy: MalformedSpecPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn malformed_policy(&self) -> MalformedSpecPolicy {
        self.on_malformed
    }

    /// Bitmap contribution of a registered token.
    pub fn token_bits(&self, token: &str) -> Option<u64> {
        self.tokens.get(token).copied()
    }

    /// Permissive counterpart of a restrictive token.
    pub fn permissive_counterpart(&self, token: &str) -> Option<&'static str> {
        self.shadows.get(token).copied()
    }

    /// Parse a JS capability string into a bitmap and whitelist.
    ///
    /// Tokens are separated by `;` and empty tokens are skipped. A token
    /// starting with `JS_WL` consumes the rest of the string, so the whitelist
    /// must come last. Any unrecognized token rejects the whole string.
    pub fn parse(&self, spec: &str) -> Result<ParsedCapability, CapabilityParseError> {
        let mut parsed = ParsedCapability::default();
        let mut saw_token = false;
        let mut rest = spec;

        while !rest.is_empty() {
            let (token, tail) = rest.split_once(TOKEN_SEPARATOR).unwrap_or((rest, ""));
            let token = token.trim();

            if token.is_empty() {
                rest = tail;
                continue;
            }
            saw_token = true;

            if let Some(bits) = self.token_bits(token) {
                parsed.bitmap |= bits;
                rest = tail;
                continue;
            }

            if let Some(list) = rest.trim_start().strip_prefix(WHITELIST_MARKER) {
                parsed.whitelist = parse_whitelist(list)?;
                break;
            }

            return Err(CapabilityParseError::UnknownToken(token.to_string()));
        }

        if !saw_token {
            return Err(CapabilityParseError::Empty);
        }
        Ok(parsed)
    }

    /// Render the canonical token string for `bitmap`.
    ///
    /// Every facet contributes exactly one token, in fixed order, each
    /// followed by `;`. The whitelist is not part of the bitmap, so
    /// `parse(render(b))` recovers `b` but never a whitelist.
    pub fn render(&self, bitmap: u64) -> String {
        let mut out = String::new();
        for facet in &FACETS {
            let bits = bitmap & facet.mask;
            let (_, strictest) = facet.levels[0];
            let token = if bits == 0 {
                self.permissive_counterpart(strictest).unwrap_or(facet.permissive)
            } else {
                // Unassigned patterns round up to the strictest level.
                self.inverse.get(&bits).copied().unwrap_or(strictest)
            };
            out.push_str(token);
            out.push(TOKEN_SEPARATOR);
        }
        out
    }

    /// Render `bitmap` followed by a terminal whitelist token when non-empty.
    pub fn render_with_whitelist(&self, bitmap: u64, whitelist: &BTreeSet<String>) -> String {
        let mut out = self.render(bitmap);
        if !whitelist.is_empty() {
            out.push_str(WHITELIST_MARKER);
            out.push(WHITELIST_PREFIX);
            for (i, name) in whitelist.iter().enumerate() {
                if i > 0 {
                    out.push(WHITELIST_NAME_SEPARATOR);
                }
                out.push_str(name);
            }
            out.push(TOKEN_SEPARATOR);
        }
        out
    }
}

fn parse_whitelist(list: &str) -> Result<BTreeSet<String>, CapabilityParseError> {
    let list = list.strip_prefix(WHITELIST_PREFIX).ok_or_else(|| {
        CapabilityParseError::MalformedWhitelist(format!(
            "expected '{}' after {}",
            WHITELIST_PREFIX, WHITELIST_MARKER
        ))
    })?;
    let list = list.trim_end().trim_end_matches(TOKEN_SEPARATOR);
    if list.trim().is_empty() {
        return Err(CapabilityParseError::MalformedWhitelist(
            "whitelist has no names".to_string(),
        ));
    }

    let mut names = BTreeSet::new();
    for name in list.split(WHITELIST_NAME_SEPARATOR) {
        let name = name.trim();
        if name.is_empty() || name.contains(TOKEN_SEPARATOR) || name.contains(char::is_whitespace) {
            return Err(CapabilityParseError::MalformedWhitelist(format!(
                "invalid object name '{}'",
                name
            )));
        }
        names.insert(name.to_string());
    }
    Ok(names)
}
