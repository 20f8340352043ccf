//! Clap derive structures for the `calicoctl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// calicoctl -- manage Calico policy, pools and hosts stored in etcd
#[derive(Debug, Parser)]
#[command(
    name = "calicoctl",
    version,
    about = "Manage Calico network policy and IP pools in etcd",
    long_about = "Reads and writes the Calico v1 key space in etcd.\n\n\
        The etcd endpoint comes from --etcd-authority / --etcd-scheme,\n\
        then the ETCD_* environment variables, then the config file.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// etcd <host>:<port> (overrides ETCD_AUTHORITY and the config file)
    #[arg(long, global = true)]
    pub etcd_authority: Option<String>,

    /// etcd URL scheme: http or https
    #[arg(long, global = true)]
    pub etcd_scheme: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Path to an alternative config file
    #[arg(long, env = "CALICOCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Address family selector for pool and peer listings.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Family {
    /// IPv4 only
    #[value(name = "4")]
    V4,
    /// IPv6 only
    #[value(name = "6")]
    V6,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage security profiles
    #[command(alias = "prof")]
    Profile(ProfileArgs),

    /// Manage IP address pools
    Pool(PoolArgs),

    /// Manage global BGP peers
    Bgp(BgpArgs),

    /// Inspect endpoints and their profiles
    #[command(alias = "ep")]
    Endpoint(EndpointArgs),

    /// Register and inspect Calico hosts
    Node(NodeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Profile ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Create a profile with default rules (resets an existing one)
    Add { name: String },

    /// Delete a profile
    #[command(alias = "rm")]
    Remove {
        name: String,

        /// Delete even if endpoints still reference the profile
        #[arg(long)]
        no_check: bool,
    },

    /// List profile names
    #[command(alias = "ls")]
    List,

    /// Show a profile's tags and rules
    Show { name: String },

    /// List endpoints that carry a profile
    Members { name: String },

    /// Manage a profile's tags
    Tag(TagArgs),

    /// Manage a profile's rules
    Rule(RuleArgs),
}

#[derive(Debug, Args)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommand,
}

#[derive(Debug, Subcommand)]
pub enum TagCommand {
    /// Add a tag to a profile
    Add { profile: String, tag: String },

    /// Remove a tag from a profile
    #[command(alias = "rm")]
    Remove { profile: String, tag: String },
}

#[derive(Debug, Args)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommand,
}

#[derive(Debug, Subcommand)]
pub enum RuleCommand {
    /// Print a profile's rules in human-readable form
    Show { profile: String },

    /// Print a profile's rules as JSON
    Json { profile: String },

    /// Replace a profile's rules with a JSON document
    Update {
        profile: String,

        /// Read the document from a file instead of stdin
        #[arg(long, short = 'f')]
        from_file: Option<PathBuf>,
    },
}

// ── Pool ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub command: PoolCommand,
}

#[derive(Debug, Subcommand)]
pub enum PoolCommand {
    /// Add pools, or update their config
    Add {
        #[arg(required = true)]
        cidrs: Vec<String>,

        /// Route traffic to this pool through an IP-in-IP tunnel
        #[arg(long)]
        ipip: bool,
    },

    /// Remove pools
    #[command(alias = "rm")]
    Remove {
        #[arg(required = true)]
        cidrs: Vec<String>,
    },

    /// Show configured pools
    Show {
        /// Restrict to one address family
        #[arg(long)]
        family: Option<Family>,
    },
}

// ── BGP ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BgpArgs {
    #[command(subcommand)]
    pub command: BgpCommand,
}

#[derive(Debug, Subcommand)]
pub enum BgpCommand {
    /// Add a global BGP peer
    Add { address: IpAddr },

    /// Remove a global BGP peer
    #[command(alias = "rm")]
    Remove { address: IpAddr },

    /// Show global BGP peers
    Show {
        /// Restrict to one address family
        #[arg(long)]
        family: Option<Family>,
    },
}

// ── Endpoint ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EndpointArgs {
    #[command(subcommand)]
    pub command: EndpointCommand,
}

#[derive(Debug, Subcommand)]
pub enum EndpointCommand {
    /// List endpoints, optionally filtered
    Show {
        /// Only endpoints on this host
        #[arg(long)]
        hostname: Option<String>,

        /// Only endpoints of this workload
        #[arg(long)]
        workload: Option<String>,
    },

    /// Manage the profiles applied to an endpoint
    Profile(EndpointProfileArgs),
}

#[derive(Debug, Args)]
pub struct EndpointProfileArgs {
    #[command(subcommand)]
    pub command: EndpointProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum EndpointProfileCommand {
    /// Show the profiles applied to an endpoint
    Show { endpoint_id: String },

    /// Append profiles to an endpoint
    Append {
        endpoint_id: String,
        #[arg(required = true)]
        profiles: Vec<String>,
    },

    /// Replace an endpoint's profiles (none clears them)
    Set {
        endpoint_id: String,
        profiles: Vec<String>,
    },

    /// Remove profiles from an endpoint
    #[command(alias = "rm")]
    Remove {
        endpoint_id: String,
        #[arg(required = true)]
        profiles: Vec<String>,
    },
}

// ── Node ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// Register a host and its BGP addresses
    Register {
        #[arg(long)]
        hostname: String,

        /// IPv4 address BIRD listens on
        #[arg(long)]
        ip: IpAddr,

        /// IPv6 address BIRD6 listens on
        #[arg(long)]
        ip6: Option<IpAddr>,
    },

    /// Remove a host and all of its endpoints
    #[command(alias = "rm")]
    Remove {
        #[arg(long)]
        hostname: String,
    },

    /// List registered hosts
    Show,

    /// Initialize global config and mark the datastore ready
    Ready,
}

// ── Completions ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
