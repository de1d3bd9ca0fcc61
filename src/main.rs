use tracing_subscriber::EnvFilter;

use crate::util::print_error;

mod cli;
mod dirs;
mod util;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = argh::from_env::<cli::App>().run() {
        print_error(format!("{e:?}"));
        std::process::exit(1);
    }
}
