//! Endpoint config loader (strict parsing).

pub mod schema;

use std::fs;

use wspackets_core::error::{Result, WspError};

pub use schema::{ClientSection, ConnectionSection, ServerSection, WspConfig};

pub fn load_from_file(path: &str) -> Result<WspConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| WspError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<WspConfig> {
    let cfg: WspConfig =
        serde_yaml::from_str(s).map_err(|e| WspError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
