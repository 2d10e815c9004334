//! Config command - print the effective configuration

use std::path::Path;

use crate::error::Result;

pub fn run(path: Option<&Path>) -> Result<()> {
    let config = super::load_config(path)?;
    print!("{}", config.to_yaml()?);
    Ok(())
}
