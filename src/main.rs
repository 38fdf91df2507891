use anyhow::Result;
use clap::Parser;
use plex_updater::cli;
use plex_updater::core::user_friendly_error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.init_logging();

    match cli.execute().await {
        Ok(_) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
