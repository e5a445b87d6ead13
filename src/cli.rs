use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "onapp", about = "Manage virtual machines on an OnApp dashboard", version)]
pub struct Cli {
    /// Path to config file (default: ~/.onapp.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Try to connect to the dashboard server and access your profile
    Test,

    /// Show your user profile
    Profile,

    /// List recent transactions across the account
    Tx {
        /// How many to list
        #[arg(default_value_t = 10)]
        count: usize,
    },

    /// Manage virtual machines
    #[command(subcommand)]
    Vm(VmCommand),
}

#[derive(Subcommand, Debug)]
pub enum VmCommand {
    /// List virtual machines under your account
    List {
        /// Field filters, e.g. `Label=prod Hostname=com User=1 Memory=1024`
        /// (field names are case sensitive); a bare integer filters on Id
        filters: Vec<String>,
    },

    /// Boot a virtual machine
    Start {
        /// VM id, label, or hostname (fuzzy matched)
        query: String,
    },

    /// Stop a virtual machine
    Stop {
        /// VM id, label, or hostname (fuzzy matched)
        query: String,
    },

    /// Reboot a virtual machine
    Reboot {
        /// VM id, label, or hostname (fuzzy matched)
        query: String,
    },

    /// List recent transactions on a virtual machine
    Tx {
        /// VM id, label, or hostname (fuzzy matched)
        query: String,

        /// How many to list
        #[arg(default_value_t = 10)]
        count: usize,
    },

    /// List backups of a virtual machine
    Backups {
        /// VM id, label, or hostname (fuzzy matched)
        query: String,
    },

    /// List disks of a virtual machine
    Disks {
        /// VM id, label, or hostname (fuzzy matched)
        query: String,
    },

    /// Delete the local VM listing cache
    ClearCache,
}
