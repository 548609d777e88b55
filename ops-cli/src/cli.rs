use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ImageVault access control operator tool
#[derive(Parser, Debug)]
#[command(name = "imagevault-acl")]
#[command(about = "Inspect and validate ImageVault access control configuration")]
#[command(version)]
pub struct Cli {
    /// Access control configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "IMAGEVAULT_ACL_CONFIG", default_value = "acl.yaml")]
    pub config: PathBuf,

    /// Output format for structured results
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate the configuration, then print a summary
    Validate {
        /// List key pairs with their private keys masked
        #[arg(long)]
        show_keys: bool,
    },

    /// Run the request gate for one request
    Check {
        public_key: String,
        resource: String,

        /// User the request acts on
        #[arg(long)]
        user: Option<String>,

        /// `publickey` segment of an access rule route
        #[arg(long)]
        route_public_key: Option<String>,

        /// `group` segment of a group route
        #[arg(long)]
        route_group: Option<String>,
    },

    /// Print the users a public key may act for on a resource
    Users { public_key: String, resource: String },

    /// Print the access rules of a public key
    Rules {
        public_key: String,

        /// Replace group references with their current resources
        #[arg(long)]
        expand_groups: bool,
    },

    /// Print one page of resource groups
    Groups {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Print the resource catalog or one of its presets
    Resources {
        #[arg(long, value_enum, default_value_t = Preset::All)]
        preset: Preset,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    ReadOnly,
    ReadWrite,
    All,
}

impl Command {
    /// Whether the command needs the configuration file
    pub fn needs_config(&self) -> bool {
        !matches!(self, Command::Resources { .. })
    }
}
