//! Resolves the datastore connection from the config file, the `ETCD_*`
//! environment and the global flags, in increasing precedence.
//!
//! Core never sees these types -- it receives a pre-built `DatastoreConfig`.

use std::path::PathBuf;

use calico_config::Config;
use calico_core::DatastoreConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(calico_config::config_path)
}

/// Load the layered config and apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = calico_config::load_config_from(&config_file(global))?;
    if let Some(ref authority) = global.etcd_authority {
        cfg.etcd.authority.clone_from(authority);
    }
    if let Some(ref scheme) = global.etcd_scheme {
        cfg.etcd.scheme.clone_from(scheme);
    }
    if let Some(timeout) = global.timeout {
        cfg.etcd.timeout = timeout;
    }
    Ok(cfg)
}

/// Build the `DatastoreConfig` for this invocation.
pub fn datastore_config(global: &GlobalOpts) -> Result<DatastoreConfig, CliError> {
    let cfg = load(global)?;
    let config = cfg.etcd.to_datastore_config()?;
    tracing::debug!(url = %config.url, timeout = ?config.timeout, "resolved etcd endpoint");
    Ok(config)
}
