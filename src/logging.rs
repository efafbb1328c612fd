use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "vision_relay=debug,tower_http=debug"
    } else {
        "vision_relay=info,tower_http=warn"
    }
}

pub fn init(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    // A subscriber may already be installed when embedded or under test.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    Ok(())
}
