//! Endpoint command handlers.

use calico_core::{DatastoreClient, Endpoint};
use tabled::Tabled;

use crate::cli::{EndpointArgs, EndpointCommand, EndpointProfileCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct EndpointRow {
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Orchestrator")]
    orchestrator: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Endpoint ID")]
    endpoint_id: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Nets")]
    nets: String,
    #[tabled(rename = "Profiles")]
    profiles: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&Endpoint> for EndpointRow {
    fn from(ep: &Endpoint) -> Self {
        let nets: Vec<String> = ep
            .ipv4_nets
            .iter()
            .map(ToString::to_string)
            .chain(ep.ipv6_nets.iter().map(ToString::to_string))
            .collect();
        Self {
            hostname: ep.hostname.clone(),
            orchestrator: ep.orchestrator_id.clone(),
            workload: ep.workload_id.clone(),
            endpoint_id: ep.endpoint_id.clone(),
            interface: ep.interface_name(),
            mac: ep.mac.to_string(),
            nets: nets.join(", "),
            profiles: ep.profile_ids.join(", "),
            state: ep.state.clone(),
        }
    }
}

fn matches_filter(ep: &Endpoint, hostname: Option<&str>, workload: Option<&str>) -> bool {
    hostname.is_none_or(|h| ep.hostname == h) && workload.is_none_or(|w| ep.workload_id == w)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &DatastoreClient,
    args: EndpointArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EndpointCommand::Show { hostname, workload } => {
            let endpoints: Vec<Endpoint> = util::flatten(&client.get_hosts().await?)
                .into_iter()
                .filter(|ep| matches_filter(ep, hostname.as_deref(), workload.as_deref()))
                .collect();
            let out = output::render_list(
                &global.output,
                &endpoints,
                |x| EndpointRow::from(x),
                |ep| ep.endpoint_id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EndpointCommand::Profile(profile) => handle_profile(client, profile.command, global).await,
    }
}

async fn handle_profile(
    client: &DatastoreClient,
    command: EndpointProfileCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        EndpointProfileCommand::Show { endpoint_id } => {
            let ep = client.get_endpoint_from_id(&endpoint_id).await?.into_endpoint();
            let out = output::render_single(
                &global.output,
                &ep.profile_ids,
                |ids| ids.join("\n"),
                |ids| ids.join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EndpointProfileCommand::Append {
            endpoint_id,
            profiles,
        } => {
            util::require_profiles(client, &profiles).await?;
            util::retry_on_conflict(&endpoint_id, || {
                client.append_profiles_to_endpoint(&endpoint_id, &profiles)
            })
            .await?;
            output::status(
                &format!("Appended {} to endpoint {endpoint_id}", profiles.join(", ")),
                global.quiet,
            );
            Ok(())
        }

        EndpointProfileCommand::Set {
            endpoint_id,
            profiles,
        } => {
            util::require_profiles(client, &profiles).await?;
            util::retry_on_conflict(&endpoint_id, || {
                client.set_profiles_on_endpoint(&endpoint_id, &profiles)
            })
            .await?;
            output::status(
                &format!("Set profiles of endpoint {endpoint_id}"),
                global.quiet,
            );
            Ok(())
        }

        EndpointProfileCommand::Remove {
            endpoint_id,
            profiles,
        } => {
            util::retry_on_conflict(&endpoint_id, || {
                client.remove_profiles_from_endpoint(&endpoint_id, &profiles)
            })
            .await?;
            output::status(
                &format!("Removed {} from endpoint {endpoint_id}", profiles.join(", ")),
                global.quiet,
            );
            Ok(())
        }
    }
}
