//! Shared helpers for command handlers.

use std::future::Future;
use std::io::{IsTerminal, Read};
use std::path::Path;

use calico_core::model::net::parse_net;
use calico_core::{CoreError, DatastoreClient, Endpoint, EndpointTree};
use ipnet::IpNet;

use crate::error::CliError;

/// Attempts made by an endpoint profile update before giving up on a
/// contended endpoint.
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read a document from `path`, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Parse a CIDR argument, truncating host bits.
pub fn parse_cidr(value: &str) -> Result<IpNet, CliError> {
    parse_net(value).map_err(|e| CliError::Validation {
        field: "cidr".into(),
        reason: e.to_string(),
    })
}

/// Fail with `ProfileNotFound` unless every profile in `names` exists.
pub async fn require_profiles(client: &DatastoreClient, names: &[String]) -> Result<(), CliError> {
    for name in names {
        if !client.profile_exists(name).await? {
            return Err(CoreError::ProfileNotFound { name: name.clone() }.into());
        }
    }
    Ok(())
}

/// Run a read-modify-write endpoint operation, re-running it from a fresh
/// read whenever it loses a compare-and-swap race.
pub async fn retry_on_conflict<F, Fut>(endpoint_id: &str, mut op: F) -> Result<(), CliError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), CoreError>>,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        match op().await {
            Err(e) if e.is_concurrent_update() => {
                tracing::warn!(endpoint_id, attempt, "endpoint modified concurrently, retrying");
            }
            other => return other.map_err(CliError::from),
        }
    }
    Err(CliError::Contended {
        endpoint_id: endpoint_id.into(),
        attempts: MAX_UPDATE_ATTEMPTS,
    })
}

/// Flatten a host tree into a list of endpoints, in key order.
pub fn flatten(tree: &EndpointTree) -> Vec<Endpoint> {
    tree.values()
        .flat_map(|orchestrators| orchestrators.values())
        .flat_map(|workloads| workloads.values())
        .flat_map(|endpoints| endpoints.values())
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn conflict() -> CoreError {
        CoreError::ConcurrentUpdate {
            key: "/calico/v1/host/h/workload/docker/c/endpoint/e".into(),
        }
    }

    #[tokio::test]
    async fn retries_until_the_swap_lands() {
        let calls = Cell::new(0);
        retry_on_conflict("e", || {
            calls.set(calls.get() + 1);
            let result = if calls.get() < 3 { Err(conflict()) } else { Ok(()) };
            async move { result }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let calls = Cell::new(0);
        let err = retry_on_conflict("e", || {
            calls.set(calls.get() + 1);
            async { Err(conflict()) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Contended { attempts, .. } if attempts == MAX_UPDATE_ATTEMPTS));
        assert_eq!(calls.get(), MAX_UPDATE_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let err = retry_on_conflict("e", || {
            calls.set(calls.get() + 1);
            async {
                Err(CoreError::EndpointNotFound {
                    endpoint_id: "e".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::NotFound { .. }));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn bad_cidr_is_a_usage_error() {
        let err = parse_cidr("10.0.0.0/33").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
        assert_eq!(parse_cidr("10.1.2.3/16").unwrap().to_string(), "10.1.0.0/16");
    }
}
