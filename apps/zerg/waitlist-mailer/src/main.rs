//! Waitlist Mailer Entry Point

use clap::Parser;
use core_config::tracing::install_color_eyre;
use eyre::Result;
use zerg_waitlist_mailer::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    zerg_waitlist_mailer::run(Cli::parse()).await
}
