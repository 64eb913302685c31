//! Configured-channel health listing for `gf sources`.

use anyhow::Result;

use crate::config::Config;
use crate::partition;

pub fn list_sources(config: &Config) -> Result<()> {
    println!("feed provider: {}", config.feed.provider);
    match config.feed.provider.as_str() {
        "http" => {
            if let Some(base) = &config.feed.base_url {
                println!("gateway: {}", base);
            }
        }
        "static" => {
            if let Some(root) = &config.feed.fixture_root {
                let status = if root.exists() { "OK" } else { "MISSING" };
                println!("fixtures: {} ({})", root.display(), status);
            }
        }
        _ => {}
    }
    println!();

    if config.feed.channels.is_empty() {
        println!("No channels configured.");
        return Ok(());
    }

    println!("{:<24} {:>10} {}", "CHANNEL", "PARTITIONS", "LAST CAPTURE");
    let partitions = partition::walk_partitions(&config.raw.root);

    for channel in &config.feed.channels {
        let slug = partition::channel_slug(channel);
        let mine: Vec<_> = partitions.iter().filter(|p| p.channel == slug).collect();
        let last = mine
            .iter()
            .map(|p| p.capture_date)
            .max()
            .map(|d| d.format(partition::DATE_FMT).to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("{:<24} {:>10} {}", channel, mine.len(), last);
    }

    Ok(())
}
