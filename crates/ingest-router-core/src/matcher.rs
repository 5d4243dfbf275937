//! Rule table and key matching.
//!
//! [`RuleTable`] is built once at startup and never mutated afterwards; it is
//! cheap to clone and safe to share across tasks without locking.
//!
//! Matching is a pure function of the table and the object key:
//!
//! ```text
//! rule matches key  <=>  (prefix unset or key.starts_with(prefix))
//!                    and (suffix unset or key.ends_with(suffix))
//! ```
//!
//! Every matching rule is returned, in configuration order.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use ingest_router_model::{IngestionEvent, RoutingRule};

use crate::error::{RouterError, RouterResult};

/// Immutable, ordered set of routing rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Arc<[Arc<RoutingRule>]>,
}

impl RuleTable {
    /// Validate and freeze a rule list.
    ///
    /// Rule ids must be unique and non-empty, and every rule needs a target.
    /// A prefix or suffix, when set, must not be empty.
    /// Same-kind rules whose key spaces overlap are rejected when
    /// `exclusive_backends` is set and logged otherwise.
    pub fn new(rules: Vec<RoutingRule>, exclusive_backends: bool) -> RouterResult<Self> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if rule.id.trim().is_empty() {
                return Err(RouterError::InvalidRule {
                    rule: rule.id.clone(),
                    reason: "rule id is empty".to_owned(),
                });
            }
            if rule.target.trim().is_empty() {
                return Err(RouterError::InvalidRule {
                    rule: rule.id.clone(),
                    reason: "rule target is empty".to_owned(),
                });
            }
            if rule.key_prefix.as_deref() == Some("") || rule.key_suffix.as_deref() == Some("") {
                return Err(RouterError::InvalidRule {
                    rule: rule.id.clone(),
                    reason: "key prefix and suffix must not be empty when set".to_owned(),
                });
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RouterError::DuplicateRule(rule.id.clone()));
            }
        }

        for (first, second) in overlapping_pairs(&rules) {
            if exclusive_backends {
                return Err(RouterError::OverlappingRules {
                    first: first.id.clone(),
                    second: second.id.clone(),
                    kind: first.backend_kind,
                });
            }
            warn!(
                first = %first.id,
                second = %second.id,
                backend_kind = %first.backend_kind,
                "same-kind rules overlap, a matching object is dispatched to this backend more than once",
            );
        }

        debug!(rule_count = rules.len(), "rule table loaded");
        Ok(Self {
            rules: rules.into_iter().map(Arc::new).collect(),
        })
    }

    /// Rules matching the event's key, in configuration order.
    #[must_use]
    pub fn match_event(&self, event: &IngestionEvent) -> Vec<Arc<RoutingRule>> {
        self.match_key(&event.key)
    }

    /// Rules matching a raw key, in configuration order.
    #[must_use]
    pub fn match_key(&self, key: &str) -> Vec<Arc<RoutingRule>> {
        self.rules
            .iter()
            .filter(|rule| rule_matches(rule, key))
            .cloned()
            .collect()
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<RoutingRule>> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// All rules, in configuration order.
    #[must_use]
    pub fn rules(&self) -> &[Arc<RoutingRule>] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Whether `rule` matches `key`.
#[must_use]
pub fn rule_matches(rule: &RoutingRule, key: &str) -> bool {
    rule.key_prefix
        .as_deref()
        .is_none_or(|prefix| key.starts_with(prefix))
        && rule
            .key_suffix
            .as_deref()
            .is_none_or(|suffix| key.ends_with(suffix))
}

/// Whether some key matches both rules' filters.
///
/// Two prefixes admit a common key iff one is a prefix of the other; the
/// same holds for suffixes. When both hold, `longer_prefix + longer_suffix`
/// is such a key.
#[must_use]
pub fn filters_overlap(a: &RoutingRule, b: &RoutingRule) -> bool {
    let prefixes = match (a.key_prefix.as_deref(), b.key_prefix.as_deref()) {
        (Some(x), Some(y)) => x.starts_with(y) || y.starts_with(x),
        _ => true,
    };
    let suffixes = match (a.key_suffix.as_deref(), b.key_suffix.as_deref()) {
        (Some(x), Some(y)) => x.ends_with(y) || y.ends_with(x),
        _ => true,
    };
    prefixes && suffixes
}

/// Same-kind rule pairs whose key spaces overlap, in configuration order.
fn overlapping_pairs(rules: &[RoutingRule]) -> Vec<(&RoutingRule, &RoutingRule)> {
    let mut pairs = Vec::new();
    for (i, first) in rules.iter().enumerate() {
        for second in &rules[i + 1..] {
            if first.backend_kind == second.backend_kind && filters_overlap(first, second) {
                pairs.push((first, second));
            }
        }
    }
    pairs
}
