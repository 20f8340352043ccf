//! Host registration command handlers.

use calico_core::{DatastoreClient, NextHops};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, NodeArgs, NodeCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// One registered host as shown by `node show`.
#[derive(Debug, Serialize)]
struct HostSummary {
    hostname: String,
    next_hops: Option<NextHops>,
    endpoints: usize,
}

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "IPv4")]
    ipv4: String,
    #[tabled(rename = "IPv6")]
    ipv6: String,
    #[tabled(rename = "Endpoints")]
    endpoints: usize,
}

impl From<&HostSummary> for HostRow {
    fn from(h: &HostSummary) -> Self {
        let hops = h.next_hops.clone().unwrap_or_default();
        Self {
            hostname: h.hostname.clone(),
            ipv4: hops.ipv4.map(|a| a.to_string()).unwrap_or_default(),
            ipv6: hops.ipv6.map(|a| a.to_string()).unwrap_or_default(),
            endpoints: h.endpoints,
        }
    }
}

pub async fn handle(
    client: &DatastoreClient,
    args: NodeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        NodeCommand::Register { hostname, ip, ip6 } => {
            client.ensure_global_config().await?;
            client.create_host(&hostname, ip, ip6).await?;
            output::status(&format!("Registered host {hostname}"), global.quiet);
            Ok(())
        }

        NodeCommand::Remove { hostname } => {
            if !util::confirm(
                &format!("Remove host '{hostname}' and all of its endpoints?"),
                global.yes,
            )? {
                return Ok(());
            }
            client.remove_host(&hostname).await?;
            output::status(&format!("Removed host {hostname}"), global.quiet);
            Ok(())
        }

        NodeCommand::Show => {
            let hosts = client.get_hosts().await?;
            let mut summaries = Vec::with_capacity(hosts.len());
            for (hostname, orchestrators) in &hosts {
                let next_hops = match client.get_default_next_hops(hostname).await {
                    Ok(hops) => Some(hops),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e.into()),
                };
                let endpoints = orchestrators
                    .values()
                    .flat_map(|workloads| workloads.values())
                    .map(std::collections::BTreeMap::len)
                    .sum();
                summaries.push(HostSummary {
                    hostname: hostname.clone(),
                    next_hops,
                    endpoints,
                });
            }
            let out = output::render_list(
                &global.output,
                &summaries,
                |x| HostRow::from(x),
                |h| h.hostname.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodeCommand::Ready => {
            client.ensure_global_config().await?;
            output::status("Datastore marked ready", global.quiet);
            Ok(())
        }
    }
}
