//! Full teardown of every managed remote resource and local file.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

use crate::config::Config;
use crate::gateway::{GatewayApi, GatewayClient};

pub async fn run(config: &Config, dry_run: bool, yes: bool) -> Result<()> {
    if !dry_run && !yes && !confirm()? {
        info!("Aborted");
        return Ok(());
    }

    let client = GatewayClient::new(&config.gateway, dry_run)?;

    // Rules go first so no rule ever references a deleted list.
    let rules = client.get_rules().await?;
    for feed in &config.feeds {
        for rule in rules.iter().filter(|r| r.name == feed.policy_name) {
            client.delete_rule(&rule.id).await?;
            info!("Deleted rule '{}' ({})", rule.name, rule.id);
        }
    }

    let lists = client.get_lists().await?;
    let mut deleted = 0usize;
    for feed in &config.feeds {
        for list in lists.iter().filter(|l| l.name.starts_with(&feed.prefix)) {
            client.delete_list(&list.id).await?;
            info!("Deleted list '{}' ({})", list.name, list.id);
            deleted += 1;
        }
    }
    info!("Deleted {deleted} list(s)");

    if dry_run {
        return Ok(());
    }

    for feed in &config.feeds {
        if feed.output.exists() {
            std::fs::remove_file(&feed.output)?;
            info!("Removed {}", feed.output.display());
        }
    }
    if config.state_file.exists() {
        std::fs::remove_file(&config.state_file)?;
        info!("Removed {}", config.state_file.display());
    }

    Ok(())
}

fn confirm() -> Result<bool> {
    print!("This deletes ALL managed gateway rules and lists. Type 'yes' to continue: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let confirmed = answer.trim().eq_ignore_ascii_case("yes");
    if !confirmed {
        warn!("Confirmation not given");
    }
    Ok(confirmed)
}
