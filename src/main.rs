use tracing_subscriber::EnvFilter;

use migra::cli::{self, Cli};

fn main() {
    let cli = Cli::parse_args();

    let default_filter = if cli.global.verbose {
        "migra=debug"
    } else {
        "migra=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(e.exit_code());
    }
}
