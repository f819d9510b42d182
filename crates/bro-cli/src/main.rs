//! Bro CLI entry point.

use bro_cli::{bundle, cli, error, logger, ui};
use clap::Parser;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(ui::should_use_color(args.no_color));

    bundle::execute(args)
        .await
        .map_err(error::cli_error_to_miette)
}
