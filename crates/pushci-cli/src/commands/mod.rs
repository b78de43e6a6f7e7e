//! CLI command implementations.

pub mod logs;
pub mod run;

use anyhow::Result;

pub fn validate(path: &str) -> Result<()> {
    match pushci_config::load_toolchain(path) {
        Ok(toolchain) => {
            println!("Toolchain '{}' is valid", toolchain.name);
            println!(
                "  setup: {}, lint: {}, test: {}",
                toolchain.setup.len(),
                toolchain.lint.len(),
                toolchain.test.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
