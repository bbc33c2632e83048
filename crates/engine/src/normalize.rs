//! Normalization rules for collection metadata
//!
//! Statistics reported by `collStats` drift between database releases in ways
//! that say nothing about the data: a field appears, disappears or changes its
//! numeric representation. A [`NormalizationRuleSet`] lists those fields and
//! what to do with each, so a snapshot recorded under one release still
//! compares equal to one captured under another.
//!
//! Rule sets are data. They load from `fidelity.toml` (see
//! [`FidelityConfig`](crate::FidelityConfig)), serialize to JSON for
//! diagnostics, and grow by adding entries.
//!
//! Two built-in sets exist:
//! - [`NormalizationRuleSet::capture_defaults`]: applied when a snapshot is taken
//! - [`NormalizationRuleSet::comparison_defaults`]: applied to both sides of a
//!   comparison

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use strata_fidelity_core::{is_default_value, Metadata};

// ============================================================================
// Rule types
// ============================================================================

/// Numeric representation a `coerce-type` rule converts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Floor to a whole number
    Integer,
    /// Widen to a double
    Float,
}

/// What a rule does to its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleAction {
    /// Remove the key
    Ignore,
    /// Convert a numeric value; other values are left as they are
    CoerceType(ValueType),
    /// Remove the key when its value is its type's default
    DropIfDefault,
}

/// One entry of a rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRule {
    /// Action to apply
    pub action: RuleAction,
    /// Where the drift comes from, e.g. the release that introduced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl NormalizationRule {
    /// Rule without a note
    pub fn new(action: RuleAction) -> Self {
        Self { action, note: None }
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Apply this rule to `key` in `metadata`
    fn apply(&self, key: &str, metadata: &mut Metadata) {
        match self.action {
            RuleAction::Ignore => {
                metadata.remove(key);
            }
            RuleAction::DropIfDefault => {
                if metadata.get(key).map_or(false, is_default_value) {
                    metadata.remove(key);
                }
            }
            RuleAction::CoerceType(target) => {
                if let Some(value) = metadata.get_mut(key) {
                    if let Some(coerced) = coerce(value, target) {
                        *value = coerced;
                    }
                }
            }
        }
    }
}

/// Converted value, or `None` when `value` is left as it is
fn coerce(value: &Value, target: ValueType) -> Option<Value> {
    let Value::Number(n) = value else {
        return None;
    };
    match target {
        ValueType::Integer => {
            if n.is_i64() || n.is_u64() {
                return None;
            }
            let floored = n.as_f64()?.floor();
            if floored.is_finite() && floored >= i64::MIN as f64 && floored <= i64::MAX as f64 {
                Some(Value::from(floored as i64))
            } else {
                None
            }
        }
        ValueType::Float => {
            if n.is_f64() {
                return None;
            }
            n.as_f64().map(Value::from)
        }
    }
}

// ============================================================================
// Rule sets
// ============================================================================

/// Mapping from metadata key to the rule applied to it
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use strata_fidelity_engine::{NormalizationRuleSet, RuleAction};
///
/// let rules = NormalizationRuleSet::new().with("systemFlags", RuleAction::Ignore);
/// let stats = json!({"count": 3, "systemFlags": 1});
/// let normalized = rules.normalized(stats.as_object().unwrap());
/// assert_eq!(serde_json::Value::Object(normalized), json!({"count": 3}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizationRuleSet {
    rules: BTreeMap<String, NormalizationRule>,
}

static CAPTURE_RULES: Lazy<NormalizationRuleSet> = Lazy::new(|| {
    NormalizationRuleSet::new()
        .with_rule(
            "avgObjSize",
            NormalizationRule::new(RuleAction::CoerceType(ValueType::Integer))
                .with_note("double in 2.4, int in 2.6"),
        )
        .with_rule(
            "primary",
            NormalizationRule::new(RuleAction::Ignore)
                .with_note("only reported through a router"),
        )
        .with_rule(
            "sharded",
            NormalizationRule::new(RuleAction::Ignore)
                .with_note("only reported through a router"),
        )
});

static COMPARISON_RULES: Lazy<NormalizationRuleSet> = Lazy::new(|| {
    NormalizationRuleSet::new()
        .with_rule(
            "systemFlags",
            NormalizationRule::new(RuleAction::Ignore).with_note("gone as of 2.7.1"),
        )
        .with_rule(
            "paddingFactor",
            NormalizationRule::new(RuleAction::Ignore).with_note("changed in 2.7.7"),
        )
        .with_rule(
            "paddingFactorNote",
            NormalizationRule::new(RuleAction::Ignore).with_note("added in 2.7.7"),
        )
        .with_rule(
            "maxSize",
            NormalizationRule::new(RuleAction::Ignore).with_note("added in 2.7.8"),
        )
        .with_rule(
            "indexDetails",
            NormalizationRule::new(RuleAction::Ignore).with_note("added in 2.8.0-rc3"),
        )
        .with_rule(
            "capped",
            NormalizationRule::new(RuleAction::DropIfDefault)
                .with_note("explicit capped: false added in 2.8.0-rc5"),
        )
});

impl NormalizationRuleSet {
    /// Empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules applied when a snapshot is taken
    ///
    /// `avgObjSize` is floored to an integer; the router-only `primary` and
    /// `sharded` fields are removed.
    pub fn capture_defaults() -> Self {
        CAPTURE_RULES.clone()
    }

    /// Rules applied to both sides of a metadata comparison
    ///
    /// `systemFlags`, `paddingFactor`, `paddingFactorNote`, `maxSize` and
    /// `indexDetails` are removed; `capped` is removed when `false`.
    pub fn comparison_defaults() -> Self {
        COMPARISON_RULES.clone()
    }

    /// Add (or replace) a rule without a note
    pub fn with(self, key: impl Into<String>, action: RuleAction) -> Self {
        self.with_rule(key, NormalizationRule::new(action))
    }

    /// Add (or replace) a rule
    pub fn with_rule(mut self, key: impl Into<String>, rule: NormalizationRule) -> Self {
        self.insert(key, rule);
        self
    }

    /// Add (or replace) a rule, returning the one it replaced
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        rule: NormalizationRule,
    ) -> Option<NormalizationRule> {
        self.rules.insert(key.into(), rule)
    }

    /// Remove the rule for `key`
    pub fn remove(&mut self, key: &str) -> Option<NormalizationRule> {
        self.rules.remove(key)
    }

    /// Rule for `key`
    pub fn get(&self, key: &str) -> Option<&NormalizationRule> {
        self.rules.get(key)
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizationRule)> {
        self.rules.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Merge `other` into this set; its entries win on conflicting keys
    pub fn extend(&mut self, other: NormalizationRuleSet) {
        self.rules.extend(other.rules);
    }

    /// Apply every rule to `metadata` in place
    ///
    /// Idempotent: applying twice leaves the same result as applying once.
    pub fn apply(&self, metadata: &mut Metadata) {
        for (key, rule) in &self.rules {
            rule.apply(key, metadata);
        }
    }

    /// Normalized copy of `metadata`
    pub fn normalized(&self, metadata: &Metadata) -> Metadata {
        let mut copy = metadata.clone();
        self.apply(&mut copy);
        copy
    }
}
