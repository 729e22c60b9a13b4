//! Operator management of a tenant's trigger → response rules.
//!
//! Used by `kb rules add|list|delete`. Rules are evaluated by the responder
//! in the order [`list_rules`] returns them.

use anyhow::{bail, Result};

use knowledge_core::models::KnowledgeRule;
use knowledge_core::store::Store;

/// Create a rule. Blank triggers or responses are rejected; a blank
/// trigger would otherwise match every message as a contains rule.
pub async fn add_rule(
    store: &dyn Store,
    tenant_id: &str,
    trigger: &str,
    response: &str,
    exact: bool,
) -> Result<KnowledgeRule> {
    if trigger.trim().is_empty() {
        bail!("rule trigger must not be empty");
    }
    if response.trim().is_empty() {
        bail!("rule response must not be empty");
    }

    let rule = KnowledgeRule::new(tenant_id, trigger.trim(), response.trim(), exact);
    store.insert_rule(&rule).await?;
    tracing::info!(tenant_id, rule_id = %rule.id, exact, "rule added");
    Ok(rule)
}

pub async fn list_rules(store: &dyn Store, tenant_id: &str) -> Result<Vec<KnowledgeRule>> {
    store.list_rules(tenant_id).await
}

pub async fn delete_rule(store: &dyn Store, tenant_id: &str, rule_id: &str) -> Result<()> {
    if !store.delete_rule(tenant_id, rule_id).await? {
        bail!("rule {} not found for tenant {}", rule_id, tenant_id);
    }
    tracing::info!(tenant_id, rule_id, "rule deleted");
    Ok(())
}

/// Render rules as a pretty-printed JSON array, in evaluation order.
pub fn rules_json(rules: &[KnowledgeRule]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rules)?)
}

pub fn print_rules(rules: &[KnowledgeRule]) {
    if rules.is_empty() {
        println!("No rules configured.");
        return;
    }

    for (i, rule) in rules.iter().enumerate() {
        let kind = if rule.is_exact_match { "exact" } else { "contains" };
        println!("{}. [{}] {}", i + 1, kind, rule.id);
        println!("    trigger:  {}", rule.trigger);
        println!("    response: {}", rule.response);
    }
}
