//! The sync pipeline: fetch, normalize, reduce, reconcile, persist.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::artifact;
use crate::config::{Config, FeedConfig};
use crate::fetcher::Fetcher;
use crate::gateway::GatewayClient;
use crate::normalize::{self, RejectStats};
use crate::optimizer;
use crate::reconciler;
use crate::state::{FeedRunStats, RunState};
use crate::utils::domain_count;

/// One feed's reduced block-set, ready for reconciliation.
struct PreparedFeed<'a> {
    feed: &'a FeedConfig,
    domains: Vec<String>,
    stats: FeedRunStats,
}

pub async fn run(config: &Config, force: bool, dry_run: bool) -> Result<()> {
    if dry_run {
        info!("Dry-run: no gateway mutation and no local file will be written");
    }

    // Phase 1: fetch and normalize, in priority order. A feed whose sources
    // all fail is left untouched remotely; its lower-priority feeds are
    // skipped too, since their dedup subtraction depends on its coverage.
    // Feeds above the failure are unaffected.
    let fetcher = Fetcher::new()?;
    let mut aborted: Option<String> = None;
    let mut skipped = 0usize;
    let mut candidates: Vec<(&FeedConfig, HashSet<String>, RejectStats)> = Vec::new();

    for feed in config.feeds_by_priority() {
        if let Some(cause) = &aborted {
            warn!(
                "Skipping feed '{}': higher-priority feed '{cause}' failed and dedup depends on it",
                feed.name
            );
            skipped += 1;
            continue;
        }

        let results = fetcher.fetch_sources(&feed.sources).await;
        if results.iter().all(|r| r.body.is_empty()) {
            warn!(
                "All sources of feed '{}' failed to download; leaving its gateway state untouched",
                feed.name
            );
            aborted = Some(feed.name.clone());
            continue;
        }

        let mut domains = HashSet::new();
        let mut stats = RejectStats::default();
        for result in &results {
            let (set, source_stats) = normalize::parse_feed(&result.body, &config.filter);
            domains.extend(set);
            stats.merge(&source_stats);
        }

        info!(
            "Feed '{}': {} candidates ({} lines, {} rejected)",
            feed.name,
            domain_count(domains.len()),
            domain_count(stats.raw_lines),
            domain_count(stats.total_rejected())
        );
        candidates.push((feed, domains, stats));
    }

    // Phase 2: cross-feed dedup and reduction.
    let (prepared, reduce_aborted, reduce_skipped) =
        reduce_feeds(candidates, config.gateway.domain_quota());
    if aborted.is_none() {
        aborted = reduce_aborted;
    }
    skipped += reduce_skipped;

    // Phase 3: no-op short-circuit per feed, then reconcile the rest.
    let mut pending: Vec<(PreparedFeed, String)> = Vec::new();
    for p in prepared {
        let content = artifact::render(&p.domains);
        if !should_push(&p.feed.output, &content, force) {
            info!(
                "Feed '{}' is unchanged since the last sync, skipping (--force to push anyway)",
                p.feed.name
            );
            continue;
        }
        pending.push((p, content));
    }

    let mut synced: Vec<FeedRunStats> = Vec::new();
    let mut failed = 0usize;

    if pending.is_empty() {
        info!("Nothing to sync");
    } else {
        let client = GatewayClient::new(&config.gateway, dry_run)?;

        for (mut p, content) in pending {
            let chunks = optimizer::chunk_domains(&p.domains, config.gateway.max_list_size);
            p.stats.chunks = chunks.len();

            let outcome = reconciler::reconcile(
                &client,
                &p.feed.prefix,
                &p.feed.policy_name,
                &chunks,
                config.gateway.max_lists,
                config.gateway.concurrency,
            )
            .await;

            match outcome {
                Ok(outcome) => {
                    info!(
                        "Feed '{}': {} lists ({} created, {} patched, {} kept, {} deleted)",
                        p.feed.name,
                        outcome.chunks,
                        outcome.created,
                        outcome.patched,
                        outcome.kept,
                        outcome.deleted
                    );
                    if persist_artifact(p.feed, &content, dry_run) {
                        synced.push(p.stats);
                    } else {
                        failed += 1;
                    }
                }
                // One feed's API failure must not block the others.
                Err(e) => {
                    warn!("Feed '{}' failed to reconcile: {e}", p.feed.name);
                    failed += 1;
                }
            }
        }
    }

    if !dry_run && !synced.is_empty() {
        let mut state = RunState::load(&config.state_file).unwrap_or_default();
        state.last_sync = Some(Utc::now());
        for stats in synced {
            state.feeds.retain(|f| f.name != stats.name);
            state.feeds.push(stats);
        }
        state.save(&config.state_file)?;
    }

    if let Some(cause) = aborted {
        anyhow::bail!(
            "Feed '{cause}' produced no usable block-set; {skipped} lower-priority feed(s) skipped"
        );
    }
    if failed > 0 {
        anyhow::bail!("{failed} feed(s) failed to reconcile");
    }
    Ok(())
}

/// Cross-feed dedup and reduction, in priority order.
///
/// A feed that reduces to an empty block-set is dropped without touching
/// its remote lists, and every lower-priority feed is dropped with it:
/// their subtraction input would be wrong without its coverage. Returns
/// the prepared feeds, the name of the first dropped feed if any, and the
/// number of feeds skipped below it.
fn reduce_feeds<'a>(
    candidates: Vec<(&'a FeedConfig, HashSet<String>, RejectStats)>,
    quota: usize,
) -> (Vec<PreparedFeed<'a>>, Option<String>, usize) {
    let mut covered: HashSet<String> = HashSet::new();
    let mut prepared: Vec<PreparedFeed> = Vec::new();
    let mut aborted: Option<String> = None;
    let mut skipped = 0usize;

    for (feed, domains, rejects) in candidates {
        if let Some(cause) = &aborted {
            warn!(
                "Skipping feed '{}': higher-priority feed '{cause}' reduced to nothing",
                feed.name
            );
            skipped += 1;
            continue;
        }

        let own = optimizer::subtract_feeds(&domains, &covered);
        let deduped = domains.len() - own.len();
        covered.extend(own.iter().cloned());

        let blocked = optimizer::prune_subdomains(&own);
        let pruned = own.len() - blocked.len();

        if blocked.is_empty() {
            warn!(
                "Feed '{}' reduced to an empty block-set; leaving its gateway state untouched",
                feed.name
            );
            aborted = Some(feed.name.clone());
            continue;
        }
        if covered.len() > quota {
            warn!(
                "Combined block-set ({}) exceeds the account quota of {} domains",
                domain_count(covered.len()),
                domain_count(quota)
            );
        }

        info!(
            "Feed '{}': {} blocked after dedup (-{}) and pruning (-{})",
            feed.name,
            domain_count(blocked.len()),
            domain_count(deduped),
            domain_count(pruned)
        );

        let mut stats = FeedRunStats::from_rejects(&feed.name, &rejects);
        stats.deduped = deduped;
        stats.pruned = pruned;
        stats.blocked = blocked.len();
        prepared.push(PreparedFeed {
            feed,
            domains: blocked,
            stats,
        });
    }

    (prepared, aborted, skipped)
}

/// The no-op gate: push only when forced or when the rendered block-set
/// differs from the artifact left by the previous successful run.
fn should_push(output: &Path, content: &str, force: bool) -> bool {
    force || !artifact::unchanged(output, content)
}

/// Record the pushed block-set locally. Failure does not undo the remote
/// sync; it is reported like a feed failure so the exit code reflects it.
fn persist_artifact(feed: &FeedConfig, content: &str, dry_run: bool) -> bool {
    if dry_run {
        return true;
    }
    match artifact::write(&feed.output, content) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Feed '{}': synced but failed to write {}: {e:#}",
                feed.name,
                feed.output.display()
            );
            false
        }
    }
}
