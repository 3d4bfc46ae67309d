//! Local and remote status report.

use anyhow::Result;
use tracing::debug;

use crate::config::Config;
use crate::gateway::{GatewayApi, GatewayClient};
use crate::state::RunState;
use crate::utils::domain_count;

pub async fn run(config: &Config) -> Result<()> {
    let state = RunState::load(&config.state_file)?;

    match state.last_sync {
        Some(ts) => println!("Last sync: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync: never"),
    }

    for stats in &state.feeds {
        println!("\nFeed '{}'", stats.name);
        println!(
            "  blocked:   {} domains in {} list(s)",
            domain_count(stats.blocked),
            stats.chunks
        );
        println!(
            "  reduced:   -{} deduped, -{} subdomains",
            domain_count(stats.deduped),
            domain_count(stats.pruned)
        );
        println!(
            "  rejected:  {} invalid, {} punycode, {} tld, {} keyword",
            stats.rejected_invalid,
            stats.rejected_punycode,
            stats.rejected_tld,
            stats.rejected_keyword
        );
    }

    // Remote usage is best-effort: status must work without credentials.
    match remote_usage(config).await {
        Ok((lists, domains, rules)) => {
            println!(
                "\nRemote: {} / {} lists used, {} domains, {} rule(s)",
                lists,
                config.gateway.max_lists,
                domain_count(domains),
                rules
            );
        }
        Err(e) => {
            debug!("Remote status unavailable: {e:#}");
            println!("\nRemote: unavailable (set credentials to query the gateway)");
        }
    }

    Ok(())
}

async fn remote_usage(config: &Config) -> Result<(usize, usize, usize)> {
    let client = GatewayClient::new(&config.gateway, false)?;
    let lists = client.get_lists().await?;
    let rules = client.get_rules().await?;

    let managed = |name: &str| config.feeds.iter().any(|f| name.starts_with(&f.prefix));
    let domains: usize = lists
        .iter()
        .filter(|l| managed(&l.name))
        .map(|l| l.count as usize)
        .sum();
    let rule_count = rules
        .iter()
        .filter(|r| config.feeds.iter().any(|f| f.policy_name == r.name))
        .count();

    Ok((lists.len(), domains, rule_count))
}
