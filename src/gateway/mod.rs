//! Remote filtering gateway API surface.
//!
//! The [`GatewayApi`] trait is the seam between the reconciler and the
//! vendor REST contract; [`GatewayClient`] is the production implementation
//! with retry, backoff, rate-limit honoring and a dry-run short-circuit.

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use client::GatewayClient;

use crate::error::GatewayError;

/// A remote list resource. The id is assigned by the gateway and treated
/// as durable across runs.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// A remote firewall rule. `traffic` is the boolean match expression over
/// list memberships.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub traffic: String,
}

/// Payload for creating or updating a rule.
#[derive(Debug, Clone, Serialize)]
pub struct RulePayload {
    pub name: String,
    pub description: String,
    pub action: String,
    pub enabled: bool,
    pub filters: Vec<String>,
    pub traffic: String,
}

impl RulePayload {
    /// Build a DNS block rule whose expression is a disjunction over the
    /// given list ids.
    pub fn block_rule(policy_name: &str, description: String, list_ids: &[String]) -> Self {
        Self {
            name: policy_name.to_string(),
            description,
            action: "block".to_string(),
            enabled: true,
            filters: vec!["dns".to_string()],
            traffic: build_traffic_expression(list_ids),
        }
    }
}

/// Render the rule match expression: one membership clause per list id,
/// OR-joined.
pub fn build_traffic_expression(list_ids: &[String]) -> String {
    list_ids
        .iter()
        .map(|id| format!("any(dns.domains[*] in ${id})"))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// The gateway operations the reconciler needs.
///
/// All mutating methods must be no-ops returning synthetic values when the
/// implementation is in dry-run mode, so reconciler control flow is
/// identical in simulation and real execution.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn get_lists(&self) -> Result<Vec<RemoteList>, GatewayError>;

    async fn get_list_items(&self, list_id: &str) -> Result<HashSet<String>, GatewayError>;

    /// Create a list with initial content; returns the assigned id.
    async fn create_list(&self, name: &str, items: &[String]) -> Result<String, GatewayError>;

    /// Incremental item patch (append/remove), not a full replace.
    async fn patch_list(
        &self,
        list_id: &str,
        append: &[String],
        remove: &[String],
    ) -> Result<(), GatewayError>;

    async fn delete_list(&self, list_id: &str) -> Result<(), GatewayError>;

    async fn get_rules(&self) -> Result<Vec<RemoteRule>, GatewayError>;

    async fn create_rule(&self, payload: &RulePayload) -> Result<(), GatewayError>;

    async fn update_rule(&self, rule_id: &str, payload: &RulePayload) -> Result<(), GatewayError>;

    async fn delete_rule(&self, rule_id: &str) -> Result<(), GatewayError>;
}
