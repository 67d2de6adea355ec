use crate::error::Error;
use serde::de::DeserializeOwned;
use std::{fmt, path::Path};

pub fn from_toml_file<P: AsRef<Path> + fmt::Display, T: DeserializeOwned>(
    path: P,
) -> Result<T, Error> {
    tracing::info!("loading config from `{path}`...");

    let config_data = std::fs::read_to_string(path.as_ref())?;
    toml::from_str(&config_data).map_err(From::from)
}
