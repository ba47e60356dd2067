//! Fragment filter CLI
//!
//! Cleans background removal cutouts from the command line, or serves the
//! HTTP upload endpoint with `--serve`.

#[cfg(feature = "cli")]
use bgremove_fragments::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
