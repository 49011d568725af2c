//! The task capability value type.
//!
//! A `Capability` restricts what code running inside one task may do. It is
//! owned by exactly one task; propagation copies values, never aliases them,
//! so narrowing a child can never affect its parent.
//!
//! An unrestricted capability has a zero bitmap, an empty whitelist, and
//! always renders as the empty string. `restricted` is set by a successful
//! JS load, by any non-empty IPC string, by a fail-closed malformed load, or
//! by copying another capability.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::rules::{CapabilityParseError, CapabilityRules, MalformedSpecPolicy, ALL_RESTRICTIONS};

/// Restriction descriptor attached to a task.
#[derive(Debug, Clone, Default)]
pub struct Capability {
    restricted: bool,
    bitmap: u64,
    whitelist: BTreeSet<String>,
    // Memoized encodings, reset on every mutation.
    js_string: OnceCell<String>,
    ipc_string: OnceCell<String>,
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.restricted == other.restricted
            && self.bitmap == other.bitmap
            && self.whitelist == other.whitelist
    }
}

impl Eq for Capability {}

impl Capability {
    /// An unrestricted capability.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a capability from a JS capability string.
    ///
    /// Malformed input follows the rules' malformed-string policy and is
    /// logged; use `load_from_js_string` to handle the parse error.
    pub fn from_js_string(spec: &str, rules: &CapabilityRules) -> Self {
        let mut capability = Self::new();
        if let Err(e) = capability.load_from_js_string(spec, rules) {
            warn!(spec = %spec, error = %e, "malformed capability string");
        }
        capability
    }

    /// Build a capability from an IPC capability string. Malformed input is
    /// logged; use `load_from_ipc_string` to handle the error.
    pub fn from_ipc_string(spec: &str, rules: &CapabilityRules) -> Self {
        let mut capability = Self::new();
        if let Err(e) = capability.load_from_ipc_string(spec, rules) {
            warn!(ipc = %spec, error = %e, "malformed ipc capability");
        }
        capability
    }

    /// Copy restricted flag, bitmap, whitelist and cached encodings from `other`.
    pub fn set_from(&mut self, other: &Capability) {
        self.restricted = other.restricted;
        if other.restricted {
            self.bitmap = other.bitmap;
            self.whitelist = other.whitelist.clone();
        } else {
            self.bitmap = 0;
            self.whitelist.clear();
        }
        self.js_string = other.js_string.clone();
        self.ipc_string = other.ipc_string.clone();
    }

    /// Combine with `other` so the result is at least as restrictive as both.
    ///
    /// An unrestricted capability simply inherits `other`. Otherwise the
    /// restriction bits are unioned and the whitelist keeps only names
    /// present in both.
    pub fn narrow_down_from(&mut self, other: &Capability) {
        if !self.restricted {
            self.set_from(other);
            return;
        }

        self.bitmap |= other.bitmap;
        self.whitelist.retain(|name| other.whitelist.contains(name));
        self.invalidate_encodings();
    }

    /// Load a JS capability string.
    ///
    /// Empty input resets to unrestricted. A malformed string is discarded as
    /// a whole and the rules' `MalformedSpecPolicy` decides the result; the
    /// parse error is returned so the caller can report it.
    pub fn load_from_js_string(
        &mut self,
        spec: &str,
        rules: &CapabilityRules,
    ) -> Result<(), CapabilityParseError> {
        if spec.trim().is_empty() {
            self.reset();
            return Ok(());
        }

        match rules.parse(spec) {
            Ok(parsed) => {
                self.restricted = true;
                self.bitmap = parsed.bitmap;
                self.whitelist = parsed.whitelist;
                self.invalidate_encodings();
                Ok(())
            }
            Err(e) => {
                self.apply_malformed_policy(rules.malformed_policy());
                Err(e)
            }
        }
    }

    /// Load an IPC capability string: the bitmap as a decimal integer.
    ///
    /// Empty input resets to unrestricted. Any other input restricts the
    /// capability. The bitmap is read from the leading decimal digits (zero
    /// when there are none, saturating on overflow); trailing garbage is
    /// reported as `InvalidIpcBitmap`. Under `FailClosed` a malformed string
    /// restricts every facet instead. The IPC form carries no whitelist, so
    /// any existing whitelist is dropped.
    pub fn load_from_ipc_string(
        &mut self,
        spec: &str,
        rules: &CapabilityRules,
    ) -> Result<(), CapabilityParseError> {
        let spec = spec.trim();
        if spec.is_empty() {
            self.reset();
            return Ok(());
        }

        let digits_end = spec
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(spec.len());
        let (digits, rest) = spec.split_at(digits_end);
        let (bitmap, clean) = match digits.parse::<u64>() {
            Ok(bitmap) => (bitmap, rest.is_empty()),
            Err(_) if digits.is_empty() => (0, false),
            Err(_) => (u64::MAX, false),
        };

        self.restricted = true;
        self.whitelist.clear();
        self.invalidate_encodings();
        if clean {
            self.bitmap = bitmap;
            return Ok(());
        }

        self.bitmap = match rules.malformed_policy() {
            MalformedSpecPolicy::Unrestricted => bitmap,
            MalformedSpecPolicy::FailClosed => ALL_RESTRICTIONS,
        };
        Err(CapabilityParseError::InvalidIpcBitmap(spec.to_string()))
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn bitmap(&self) -> u64 {
        self.bitmap
    }

    pub fn whitelist(&self) -> impl Iterator<Item = &str> {
        self.whitelist.iter().map(String::as_str)
    }

    /// Whether `name` is exempt from the object restriction.
    pub fn contains_in_whitelist(&self, name: &str) -> bool {
        self.whitelist.contains(name)
    }

    /// Canonical JS string, or `""` when unrestricted.
    pub fn to_js_string(&self, rules: &CapabilityRules) -> &str {
        if !self.restricted {
            return "";
        }
        self.js_string
            .get_or_init(|| rules.render_with_whitelist(self.bitmap, &self.whitelist))
    }

    /// Decimal bitmap, or `""` when unrestricted.
    pub fn to_ipc_string(&self) -> &str {
        if !self.restricted {
            return "";
        }
        self.ipc_string.get_or_init(|| self.bitmap.to_string())
    }

    /// Serializable copy of the restriction state, for logs and audit records.
    pub fn snapshot(&self) -> CapabilitySnapshot {
        CapabilitySnapshot {
            restricted: self.restricted,
            bitmap: self.bitmap,
            whitelist: self.whitelist.iter().cloned().collect(),
        }
    }

    fn reset(&mut self) {
        self.restricted = false;
        self.bitmap = 0;
        self.whitelist.clear();
        self.invalidate_encodings();
    }

    fn apply_malformed_policy(&mut self, policy: MalformedSpecPolicy) {
        match policy {
            MalformedSpecPolicy::Unrestricted => self.reset(),
            MalformedSpecPolicy::FailClosed => {
                self.restricted = true;
                self.bitmap = ALL_RESTRICTIONS;
                self.whitelist.clear();
                self.invalidate_encodings();
            }
        }
    }

    fn invalidate_encodings(&mut self) {
        self.js_string.take();
        self.ipc_string.take();
    }
}

/// Plain-data view of a capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub restricted: bool,
    pub bitmap: u64,
    /// Sorted whitelist entries.
    pub whitelist: Vec<String>,
}

impl CapabilitySnapshot {
    pub fn contains_in_whitelist(&self, name: &str) -> bool {
        self.whitelist.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }
}
