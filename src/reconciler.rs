//! State-diffing converger mapping desired chunks onto remote resources.
//!
//! Planning is a pure function from (desired chunks, remote state) to an
//! ordered set of operations; [`apply`] is the thin effectful executor.
//! The [`Plan`] shape itself encodes the one hard ordering constraint:
//! list syncs first, then the rule update, then surplus deletions, so the
//! rule never references a deleted list id.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::gateway::{GatewayApi, RemoteList, RemoteRule, RulePayload};

/// Snapshot of the remote resources owned by one feed.
#[derive(Debug, Default)]
pub struct RemoteState {
    /// This feed's lists, name-sorted (position i = chunk i)
    pub lists: Vec<RemoteList>,
    /// Current item sets for the lists being diffed, by list id
    pub items: HashMap<String, HashSet<String>>,
    /// The feed's rule, if it exists
    pub rule: Option<RemoteRule>,
    /// Account-wide list count, including unrelated lists
    pub total_lists: usize,
}

/// One list-level operation at a chunk position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOp {
    /// No list exists at this position yet
    Create {
        index: usize,
        name: String,
        items: Vec<String>,
    },
    /// Incremental item diff against the existing list at this position
    Patch {
        index: usize,
        id: String,
        append: Vec<String>,
        remove: Vec<String>,
    },
    /// Existing list already matches the desired chunk
    Keep { index: usize, id: String },
}

/// What to do with the feed's rule once list ids are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    Create,
    Update { id: String },
}

/// The full ordered reconciliation plan for one feed.
#[derive(Debug)]
pub struct Plan {
    pub list_ops: Vec<ListOp>,
    pub rule: RuleAction,
    /// Surplus lists beyond the last used position, deleted only after
    /// the rule update lands
    pub delete_ids: Vec<String>,
}

impl Plan {
    pub fn created(&self) -> usize {
        self.list_ops
            .iter()
            .filter(|op| matches!(op, ListOp::Create { .. }))
            .count()
    }

    pub fn patched(&self) -> usize {
        self.list_ops
            .iter()
            .filter(|op| matches!(op, ListOp::Patch { .. }))
            .count()
    }

    pub fn kept(&self) -> usize {
        self.list_ops
            .iter()
            .filter(|op| matches!(op, ListOp::Keep { .. }))
            .count()
    }
}

/// Summary of one feed's reconciliation for logs and state.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub chunks: usize,
    pub created: usize,
    pub patched: usize,
    pub kept: usize,
    pub deleted: usize,
}

/// Display name of the list at a chunk position.
pub fn list_name(prefix: &str, index: usize) -> String {
    format!("{prefix} {:03}", index + 1)
}

/// Abort before any mutation if the desired chunk count does not fit in
/// the slots left over by unrelated configuration.
pub fn check_capacity(
    needed: usize,
    total_lists: usize,
    feed_lists: usize,
    max_lists: usize,
) -> Result<(), GatewayError> {
    let used_by_others = total_lists.saturating_sub(feed_lists);
    let available = max_lists.saturating_sub(used_by_others);
    if needed > available {
        return Err(GatewayError::Capacity {
            needed,
            available,
            limit: max_lists,
        });
    }
    Ok(())
}

/// Read the remote resources relevant to one feed.
///
/// Item sets are fetched only for lists at positions that will be diffed;
/// fetches run concurrently under the client's global call cap.
pub async fn read_remote_state(
    api: &dyn GatewayApi,
    prefix: &str,
    policy_name: &str,
    chunk_count: usize,
    concurrency: usize,
) -> Result<RemoteState, GatewayError> {
    let all_lists = api.get_lists().await?;
    let total_lists = all_lists.len();

    let mut lists: Vec<RemoteList> = all_lists
        .into_iter()
        .filter(|l| l.name.starts_with(prefix))
        .collect();
    lists.sort_by(|a, b| a.name.cmp(&b.name));

    let items: HashMap<String, HashSet<String>> = stream::iter(
        lists
            .iter()
            .take(chunk_count)
            .map(|l| l.id.clone())
            .map(|id| async move {
                let items = api.get_list_items(&id).await?;
                Ok::<_, GatewayError>((id, items))
            }),
    )
    .buffer_unordered(concurrency.max(1))
    .try_collect()
    .await?;

    let rule = api
        .get_rules()
        .await?
        .into_iter()
        .find(|r| r.name == policy_name);

    Ok(RemoteState {
        lists,
        items,
        rule,
        total_lists,
    })
}

/// Compute the reconciliation plan. Pure: no I/O, fully deterministic.
///
/// Chunk `i` maps onto the i-th existing list by position; content
/// differences become incremental append/remove patches so unrelated
/// concurrent edits are not clobbered by a full replace.
pub fn plan(prefix: &str, chunks: &[Vec<String>], remote: &RemoteState) -> Plan {
    let mut list_ops = Vec::with_capacity(chunks.len());

    for (index, chunk) in chunks.iter().enumerate() {
        match remote.lists.get(index) {
            Some(existing) => {
                let desired: HashSet<&str> = chunk.iter().map(String::as_str).collect();
                let empty = HashSet::new();
                let current = remote.items.get(&existing.id).unwrap_or(&empty);

                let mut append: Vec<String> = chunk
                    .iter()
                    .filter(|d| !current.contains(d.as_str()))
                    .cloned()
                    .collect();
                let mut remove: Vec<String> = current
                    .iter()
                    .filter(|d| !desired.contains(d.as_str()))
                    .cloned()
                    .collect();
                append.sort_unstable();
                remove.sort_unstable();

                if append.is_empty() && remove.is_empty() {
                    list_ops.push(ListOp::Keep {
                        index,
                        id: existing.id.clone(),
                    });
                } else {
                    list_ops.push(ListOp::Patch {
                        index,
                        id: existing.id.clone(),
                        append,
                        remove,
                    });
                }
            }
            None => list_ops.push(ListOp::Create {
                index,
                name: list_name(prefix, index),
                items: chunk.clone(),
            }),
        }
    }

    let rule = match &remote.rule {
        Some(r) => RuleAction::Update { id: r.id.clone() },
        None => RuleAction::Create,
    };

    let delete_ids = remote
        .lists
        .iter()
        .skip(chunks.len())
        .map(|l| l.id.clone())
        .collect();

    Plan {
        list_ops,
        rule,
        delete_ids,
    }
}

/// Execute a plan.
///
/// Chunk syncs run concurrently and join before the rule update; surplus
/// deletions run last and are best-effort (a leftover unused list wastes
/// quota but cannot break enforcement, unlike a dangling rule reference).
pub async fn apply(
    api: &dyn GatewayApi,
    plan: &Plan,
    policy_name: &str,
    total_domains: usize,
    concurrency: usize,
) -> Result<ReconcileOutcome, GatewayError> {
    let mut indexed: Vec<(usize, String)> =
        stream::iter(plan.list_ops.iter().map(|op| async move {
            match op {
                ListOp::Create { index, name, items } => {
                    let id = api.create_list(name, items).await?;
                    info!("Created list '{name}' ({} items)", items.len());
                    Ok::<_, GatewayError>((*index, id))
                }
                ListOp::Patch {
                    index,
                    id,
                    append,
                    remove,
                } => {
                    api.patch_list(id, append, remove).await?;
                    info!("Patched list {id}: +{} -{}", append.len(), remove.len());
                    Ok((*index, id.clone()))
                }
                ListOp::Keep { index, id } => {
                    debug!("List {id} is up to date");
                    Ok((*index, id.clone()))
                }
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    indexed.sort_by_key(|(index, _)| *index);
    let used_ids: Vec<String> = indexed.into_iter().map(|(_, id)| id).collect();

    let description = format!(
        "Blocklist: {total_domains} domains. Updated: {} UTC",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    );
    let payload = RulePayload::block_rule(policy_name, description, &used_ids);

    match &plan.rule {
        RuleAction::Update { id } => {
            api.update_rule(id, &payload).await?;
            info!("Updated rule '{policy_name}' ({} lists)", used_ids.len());
        }
        RuleAction::Create => {
            api.create_rule(&payload).await?;
            info!("Created rule '{policy_name}' ({} lists)", used_ids.len());
        }
    }

    let mut deleted = 0;
    for id in &plan.delete_ids {
        match api.delete_list(id).await {
            Ok(()) => {
                info!("Deleted surplus list {id}");
                deleted += 1;
            }
            // Quota waste, not a correctness break; a future run retries.
            Err(e) => warn!("Failed to delete surplus list {id}: {e}"),
        }
    }

    Ok(ReconcileOutcome {
        chunks: plan.list_ops.len(),
        created: plan.created(),
        patched: plan.patched(),
        kept: plan.kept(),
        deleted,
    })
}

/// Full reconciliation of one feed: read, capacity-check, plan, apply.
///
/// Any error before [`apply`]'s rule update leaves the remote rule
/// untouched, so old enforcement stays active on failure.
pub async fn reconcile(
    api: &dyn GatewayApi,
    prefix: &str,
    policy_name: &str,
    chunks: &[Vec<String>],
    max_lists: usize,
    concurrency: usize,
) -> Result<ReconcileOutcome, GatewayError> {
    let remote = read_remote_state(api, prefix, policy_name, chunks.len(), concurrency).await?;

    check_capacity(
        chunks.len(),
        remote.total_lists,
        remote.lists.len(),
        max_lists,
    )?;

    let plan = plan(prefix, chunks, &remote);
    let total_domains: usize = chunks.iter().map(Vec::len).sum();

    debug!(
        "Plan: {} create, {} patch, {} keep, {} delete",
        plan.created(),
        plan.patched(),
        plan.kept(),
        plan.delete_ids.len()
    );

    apply(api, &plan, policy_name, total_domains, concurrency).await
}
