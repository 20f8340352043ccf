//! Command dispatch: bridges CLI args -> datastore operations -> output.

pub mod bgp;
pub mod endpoint;
pub mod node;
pub mod pool;
pub mod profile;
pub mod util;

use calico_core::DatastoreClient;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a datastore-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &DatastoreClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Profile(args) => profile::handle(client, args, global).await,
        Command::Pool(args) => pool::handle(client, args, global).await,
        Command::Bgp(args) => bgp::handle(client, args, global).await,
        Command::Endpoint(args) => endpoint::handle(client, args, global).await,
        Command::Node(args) => node::handle(client, args, global).await,
        Command::Completions(_) => Err(CliError::Other(
            "completions are generated without a datastore connection".into(),
        )),
    }
}
