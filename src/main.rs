//! CLI entry point for mosaic clipping and crowd label aggregation

use clap::Parser;
use crowdmosaic::io::cli::{Cli, PipelineRunner};
use env_logger::{Builder, Env};

fn main() -> crowdmosaic::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG applies only when no -q / -v flag was given
    let use_env = !cli.verbosity_given() && std::env::var_os("RUST_LOG").is_some();
    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let mut builder = Builder::new();
        builder.filter_level(cli.log_level());
        builder
    };
    logger.format_timestamp(None).init();

    PipelineRunner::new(cli).run()
}
