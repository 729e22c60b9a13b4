//! Operator rule matching.
//!
//! Rules are checked before any retrieval. Two passes over the tenant's
//! rules, each in creation order (creation time, then store insertion
//! sequence, then id):
//!
//! 1. exact rules: normalized trigger == normalized message
//! 2. contains rules: normalized trigger is a substring of the normalized message
//!
//! Normalization is `trim` + lowercase on both sides. The first match wins.

use crate::models::KnowledgeRule;

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Sort rules into the matcher's iteration order.
pub fn sort_rules(rules: &mut [KnowledgeRule]) {
    rules.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then(a.seq.cmp(&b.seq))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Find the rule that answers `message`, if any.
///
/// `rules` must already be in matcher order (see [`sort_rules`]); the
/// store backends return them that way.
///
/// A contains rule whose trigger is blank after trimming never matches,
/// including rules written to a store directly rather than through
/// `kb rules add`.
pub fn match_rule<'a>(rules: &'a [KnowledgeRule], message: &str) -> Option<&'a KnowledgeRule> {
    let msg = normalize(message);

    let exact = rules
        .iter()
        .filter(|r| r.is_exact_match)
        .find(|r| normalize(&r.trigger) == msg);
    if exact.is_some() {
        return exact;
    }

    rules
        .iter()
        .filter(|r| !r.is_exact_match)
        .find(|r| {
            let trigger = normalize(&r.trigger);
            // an empty trigger would match every message
            !trigger.is_empty() && msg.contains(&trigger)
        })
}
