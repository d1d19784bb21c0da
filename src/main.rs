//! distpack - deterministic multi-target packaging pipeline.
//!
//! This binary turns one versioned source tree and a product name into
//! platform-specific distributables: a minimized executable archive plus
//! filtered installer descriptors for the AppImage, Inno Setup, packr and
//! macOS packagers.

use distpack::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
