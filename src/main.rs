mod cli;
mod config;
mod docker;
mod error;
mod events;
mod render;
mod scheduler;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Args;
use render::renderer::TeraRenderer;
use scheduler::Scheduler;

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive("dockgen=info".parse().expect("valid directive"))
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    setup_logging();

    let args = Args::parse();

    if let Err(error) = run(args) {
        tracing::error!(%error, "dockgen exited with an error");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run(args: Args) -> Result<(), error::Error> {
    let config = args.resolve_config()?;
    let renderer = Box::new(TeraRenderer::default());
    let scheduler = Scheduler::new(config, renderer)?;
    scheduler.generate().await
}
