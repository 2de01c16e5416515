use std::process::ExitCode;

use clap::Parser;

use pixelfe::cli::{self, CliArgs};
use pixelfe::{log_info, logger};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    logger::init(args.log.as_deref());
    log_info!("PixelFE {} starting", env!("CARGO_PKG_VERSION"));
    cli::run(args)
}
