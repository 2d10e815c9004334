//! Crd command - print the ChartManager CustomResourceDefinition

use crate::error::Result;

pub fn run() -> Result<()> {
    print!("{}", chartmgr_core::crd_yaml()?);
    Ok(())
}
