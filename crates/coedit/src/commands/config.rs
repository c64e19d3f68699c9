//! Print the effective configuration

use anyhow::Result;
use coedit_core::CoeditConfig;

pub fn run(config: &CoeditConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
