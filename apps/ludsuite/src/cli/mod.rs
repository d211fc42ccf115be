//! # LUD Suite CLI Module
//!
//! This module implements the CLI interface for LUD Suite.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show row counts
//! - `import` - Provision users from a JSON file
//! - `user add` - Create one user
//! - `user list` - List users, optionally by role
//! - `assign` - Assign a mentor to a mentee
//! - `link` - Link (or unlink) a mentor to an endorser
//! - `access` - Evaluate the access predicate
//! - `redirect` - Show a user's post-login destination
//! - `compact` - Compact a redb database

mod commands;

use crate::config::{Backend, Config};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ludsuite_core::{LudError, Role};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// LUD Suite - mentorship registry
///
/// Tracks mentors, mentees and endorsers, and decides who may see which
/// mentee's records.
#[derive(Parser, Debug)]
#[command(name = "ludsuite")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides `[storage].database`)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides `[storage].backend`)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides `[server].host`)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides `[server].port`)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show row counts per collection
    Status,

    /// Provision users from a JSON array of user rows
    Import {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Assign a mentor to a mentee
    Assign {
        /// Mentor user id
        #[arg(long)]
        mentor: u64,

        /// Mentee id
        #[arg(long)]
        mentee: u64,

        /// First day of the assignment (default: today)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day of the assignment
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Link a mentor to an endorser
    Link {
        /// Endorser user id
        #[arg(long)]
        endorser: u64,

        /// Mentor user id
        #[arg(long)]
        mentor: u64,

        /// Remove the link instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Evaluate whether a user may see a mentee's data
    Access {
        /// Requesting user id
        #[arg(long)]
        requester: u64,

        /// Mentee id
        #[arg(long)]
        mentee: u64,

        /// Evaluation date (default: today)
        #[arg(long)]
        on: Option<NaiveDate>,
    },

    /// Show where a user lands after login
    Redirect {
        /// User id
        #[arg(long)]
        user: u64,
    },

    /// Compact the redb database file
    Compact,
}

/// `user` subcommands.
#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create a user
    Add {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        /// admin, endorser, mentor, mentee or reviewer
        #[arg(long)]
        role: Option<Role>,

        /// Create a superuser (always stored as admin)
        #[arg(long)]
        superuser: bool,

        /// Program year; creates a mentee record for mentee users
        #[arg(long)]
        program_year: Option<u8>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,
    },

    /// List users
    List {
        /// Only users whose effective role is this one
        #[arg(long)]
        role: Option<Role>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LudError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.database = database;
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if cli.verbose {
        tracing::info!(
            backend = config.storage.backend.as_str(),
            database = %config.storage.database.display(),
            "Resolved storage settings"
        );
    }

    let storage = &config.storage;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { force }) => cmd_init(storage, force),
        Some(Commands::Status) => cmd_status(storage, json_mode),
        Some(Commands::Import { file }) => cmd_import(storage, json_mode, &file),
        Some(Commands::User {
            action:
                UserCommand::Add {
                    username,
                    email,
                    role,
                    superuser,
                    program_year,
                    first_name,
                    last_name,
                },
        }) => {
            let request = user_request(
                username,
                email,
                role,
                superuser,
                program_year,
                first_name,
                last_name,
            );
            cmd_user_add(storage, json_mode, &request)
        }
        Some(Commands::User {
            action: UserCommand::List { role },
        }) => cmd_user_list(storage, json_mode, role),
        Some(Commands::Assign {
            mentor,
            mentee,
            start,
            end,
        }) => cmd_assign(storage, json_mode, mentor, mentee, start, end),
        Some(Commands::Link {
            endorser,
            mentor,
            remove,
        }) => cmd_link(storage, json_mode, endorser, mentor, remove),
        Some(Commands::Access {
            requester,
            mentee,
            on,
        }) => cmd_access(storage, json_mode, requester, mentee, on),
        Some(Commands::Redirect { user }) => cmd_redirect(storage, json_mode, user),
        Some(Commands::Compact) => cmd_compact(storage),
        None => {
            // No subcommand - show status by default
            cmd_status(storage, json_mode)
        }
    }
}
