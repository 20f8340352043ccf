//! Global BGP peer command handlers.

use std::net::IpAddr;

use calico_core::{DatastoreClient, IpVersion};
use tabled::Tabled;

use crate::cli::{BgpArgs, BgpCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::pool::versions;

#[derive(Tabled)]
struct PeerRow {
    #[tabled(rename = "Peer address")]
    address: String,
    #[tabled(rename = "Family")]
    family: String,
}

impl From<&IpAddr> for PeerRow {
    fn from(addr: &IpAddr) -> Self {
        Self {
            address: addr.to_string(),
            family: IpVersion::of_addr(addr).to_string(),
        }
    }
}

pub async fn handle(
    client: &DatastoreClient,
    args: BgpArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        BgpCommand::Add { address } => {
            if client.add_bgp_peer(address).await? {
                output::status(&format!("Added BGP peer {address}"), global.quiet);
            } else {
                output::status(&format!("BGP peer {address} already configured"), global.quiet);
            }
            Ok(())
        }

        BgpCommand::Remove { address } => {
            client.remove_bgp_peer(address).await?;
            output::status(&format!("Removed BGP peer {address}"), global.quiet);
            Ok(())
        }

        BgpCommand::Show { family } => {
            let mut peers = Vec::new();
            for version in versions(family) {
                peers.extend(client.get_bgp_peers(version).await?);
            }
            let out = output::render_list(
                &global.output,
                &peers,
                |x| PeerRow::from(x),
                ToString::to_string,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
