use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "vision-relay",
    version,
    about = "Relay browser requests to cloud OCR, translation, chat and image APIs"
)]
struct Cli {
    /// Address to listen on (overrides [server].addr)
    #[arg(short = 'a', long = "addr")]
    addr: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Run OCR once on this image file and print the result instead of serving
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// Target language for --data (default: [translator].default_lang)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Give up on --data after this many seconds
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    vision_relay::logging::init(cli.verbose)?;
    let settings =
        vision_relay::settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;

    if let Some(data) = cli.data {
        let output = vision_relay::run(
            vision_relay::Config {
                data,
                lang: cli.lang,
                timeout: cli.timeout.map(Duration::from_secs),
            },
            settings,
        )
        .await?;
        println!("{}", output);
        return Ok(());
    }

    let addr = cli.addr.unwrap_or_else(|| settings.server_addr.clone());
    vision_relay::server::run_server(settings, addr).await
}
