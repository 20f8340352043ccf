//! IP pool command handlers.

use calico_core::{DatastoreClient, IpPool, IpVersion};
use tabled::Tabled;

use crate::cli::{Family, GlobalOpts, PoolArgs, PoolCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PoolRow {
    #[tabled(rename = "CIDR")]
    cidr: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "IPIP")]
    ipip: String,
}

impl From<&IpPool> for PoolRow {
    fn from(pool: &IpPool) -> Self {
        Self {
            cidr: pool.cidr.to_string(),
            family: IpVersion::of_net(&pool.cidr).to_string(),
            ipip: if pool.ipip { "yes".into() } else { String::new() },
        }
    }
}

pub(super) fn versions(family: Option<Family>) -> Vec<IpVersion> {
    match family {
        Some(Family::V4) => vec![IpVersion::V4],
        Some(Family::V6) => vec![IpVersion::V6],
        None => vec![IpVersion::V4, IpVersion::V6],
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &DatastoreClient,
    args: PoolArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PoolCommand::Add { cidrs, ipip } => {
            let nets = cidrs
                .iter()
                .map(|c| util::parse_cidr(c))
                .collect::<Result<Vec<_>, _>>()?;
            if ipip && nets.iter().any(|n| IpVersion::of_net(n) == IpVersion::V6) {
                return Err(CliError::Validation {
                    field: "ipip".into(),
                    reason: "IP-in-IP is only supported for IPv4 pools".into(),
                });
            }
            for net in nets {
                client.add_ip_pool(&IpPool::new(net, ipip)).await?;
                output::status(&format!("Added pool {net}"), global.quiet);
            }
            Ok(())
        }

        PoolCommand::Remove { cidrs } => {
            let nets = cidrs
                .iter()
                .map(|c| util::parse_cidr(c))
                .collect::<Result<Vec<_>, _>>()?;
            let listed: Vec<String> = nets.iter().map(ToString::to_string).collect();
            if !util::confirm(&format!("Remove pool(s) {}?", listed.join(", ")), global.yes)? {
                return Ok(());
            }
            for net in nets {
                client.remove_ip_pool(&net).await?;
                output::status(&format!("Removed pool {net}"), global.quiet);
            }
            Ok(())
        }

        PoolCommand::Show { family } => {
            let mut pools = Vec::new();
            for version in versions(family) {
                for cidr in client.get_ip_pools(version).await? {
                    pools.push(client.get_ip_pool_config(&cidr).await?);
                }
            }
            let out = output::render_list(
                &global.output,
                &pools,
                |x| PoolRow::from(x),
                |p| p.cidr.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
