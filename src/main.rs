use clap::Parser;
use log::info;
use ttglyph::cli::Cli;
use ttglyph::run;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("ttglyph {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
