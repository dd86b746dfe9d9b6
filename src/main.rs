//! Binary entry point for rolegrid.
//!
//! Shows and edits a role's permission matrix from the command line.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, anyhow};
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use rolegrid::matrix::{ChangeStatus, MatrixPresenter};
use rolegrid::{
    Action, ConsoleConfig, Diff, EditingSession, Error, HttpPermissionService, PermissionKey,
    RoleId, observability,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Rolegrid - edit RBAC role permissions as a matrix.
#[derive(Parser)]
#[command(name = "rolegrid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show a role's permission matrix.
    Show {
        /// Role ID.
        role: String,

        /// Show a grouped list filtered by resource or action name.
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Stage permission edits and commit them.
    Apply {
        /// Role ID.
        role: String,

        #[command(flatten)]
        edits: EditArgs,

        /// Print the pending changes without committing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Create permissions on one resource, including actions outside the matrix.
    Add {
        /// Role ID.
        role: String,

        /// Resource name.
        resource: String,

        /// Action names.
        #[arg(required = true, num_args = 1..)]
        actions: Vec<String>,
    },
}

/// Edit flags of `apply`. They are staged in command-line order.
#[derive(Args, Debug, Default)]
struct EditArgs {
    /// Grant a permission (`resource:action`).
    #[arg(long, value_name = "RESOURCE:ACTION")]
    grant: Vec<String>,

    /// Revoke a permission (`resource:action`).
    #[arg(long, value_name = "RESOURCE:ACTION")]
    revoke: Vec<String>,

    /// Grant every matrix action on a resource.
    #[arg(long, value_name = "RESOURCE")]
    grant_all: Vec<String>,

    /// Revoke every matrix action on a resource.
    #[arg(long, value_name = "RESOURCE")]
    revoke_all: Vec<String>,
}

/// One staged edit.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    Grant(String),
    Revoke(String),
    GrantAll(String),
    RevokeAll(String),
}

/// Orders edits by their position on the command line.
///
/// Later flags win where edits overlap, so `--grant user:read --revoke-all
/// user` leaves `user:read` revoked. Values without a recorded position
/// keep their relative order after the positioned ones.
fn ordered_edits(matches: Option<&ArgMatches>, args: EditArgs) -> Vec<Edit> {
    let mut edits: Vec<(usize, Edit)> = Vec::new();
    let groups: [(&str, Vec<String>, fn(String) -> Edit); 4] = [
        ("grant", args.grant, Edit::Grant),
        ("revoke", args.revoke, Edit::Revoke),
        ("grant_all", args.grant_all, Edit::GrantAll),
        ("revoke_all", args.revoke_all, Edit::RevokeAll),
    ];
    for (id, values, edit) in groups {
        let positions = matches
            .and_then(|m| m.indices_of(id))
            .into_iter()
            .flatten()
            .chain(std::iter::repeat(usize::MAX));
        edits.extend(positions.zip(values).map(|(position, value)| (position, edit(value))));
    }
    edits.sort_by_key(|(position, _)| *position);
    edits.into_iter().map(|(_, edit)| edit).collect()
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env is not an error.
    let _ = dotenvy::dotenv();

    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, matches.subcommand_matches("apply"), &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration from an explicit path or the default locations.
fn load_config(path: Option<&std::path::Path>) -> rolegrid::Result<ConsoleConfig> {
    match path {
        Some(path) => ConsoleConfig::load_from_file(path),
        None => ConsoleConfig::load_default(),
    }
}

/// Runs the selected command.
///
/// `apply_matches` carries argument positions for ordering `apply` edits.
fn run_command(
    command: Commands,
    apply_matches: Option<&ArgMatches>,
    config: &ConsoleConfig,
) -> Result<()> {
    let service = Arc::new(
        HttpPermissionService::from_config(config).context("invalid service configuration")?,
    );

    match command {
        Commands::Show { role, search } => {
            let session = open_session(service, role)?;
            cmd_show(&session, search.as_deref())
        },
        Commands::Apply {
            role,
            edits,
            dry_run,
        } => {
            let edits = ordered_edits(apply_matches, edits);
            let mut session = open_session(service, role)?;
            cmd_apply(&mut session, &edits, dry_run)
        },
        Commands::Add {
            role,
            resource,
            actions,
        } => {
            let mut session = open_session(service, role)?;
            cmd_add(&mut session, &resource, &actions)
        },
    }
}

fn open_session(service: Arc<HttpPermissionService>, role: String) -> Result<EditingSession> {
    let mut session = EditingSession::new(service, RoleId::new(role));
    session
        .load()
        .with_context(|| format!("failed to load permissions for role '{}'", session.role()))?;
    Ok(session)
}

/// Show command.
fn cmd_show(session: &EditingSession, search: Option<&str>) -> Result<()> {
    if let Some(query) = search {
        let groups = session.groups()?.filter(query);
        if groups.is_empty() {
            println!("No permissions match '{query}'");
            return Ok(());
        }
        for (resource, actions) in groups.iter() {
            println!("{resource}: {}", actions.join(", "));
        }
        return Ok(());
    }

    let presenter = session.presenter()?;
    print_matrix(&presenter);
    print_custom(session)?;
    Ok(())
}

/// Stages edits in order.
fn stage_edits(session: &mut EditingSession, edits: &[Edit]) -> Result<()> {
    for edit in edits {
        match edit {
            Edit::Grant(arg) | Edit::Revoke(arg) => {
                let key = PermissionKey::parse(arg)?;
                let checked = matches!(edit, Edit::Grant(_));
                session.toggle(key.resource(), key.action(), checked)?;
            },
            Edit::GrantAll(resource) => {
                session.toggle_all(resource, true)?;
            },
            Edit::RevokeAll(resource) => {
                session.toggle_all(resource, false)?;
            },
        }
    }
    Ok(())
}

/// Apply command.
fn cmd_apply(session: &mut EditingSession, edits: &[Edit], dry_run: bool) -> Result<()> {
    stage_edits(session, edits)?;

    let diff = session.diff()?;
    if diff.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    print_diff(&diff);

    if dry_run {
        println!("Dry run: nothing committed.");
        return Ok(());
    }

    let report = session.commit().map_err(failed_changes)?;
    println!(
        "Committed: {} created, {} deleted.",
        report.created.len(),
        report.deleted.len()
    );
    Ok(())
}

/// Add command.
fn cmd_add(session: &mut EditingSession, resource: &str, actions: &[String]) -> Result<()> {
    let report = session
        .create_custom(resource, actions)
        .map_err(failed_changes)?;
    for key in &report.created {
        println!("Created {key} on role '{}'.", session.role());
    }
    Ok(())
}

/// Prints one line per failed change and converts the error.
fn failed_changes(err: Error) -> anyhow::Error {
    match err {
        Error::CommitFailed {
            failed,
            attempted,
            failures,
        } => {
            for failure in &failures {
                eprintln!("  failed: {failure}");
            }
            anyhow!("{failed} of {attempted} changes were not applied; permissions were reloaded")
        },
        Error::Resync { ref failures, .. } => {
            for failure in failures {
                eprintln!("  failed: {failure}");
            }
            err.into()
        },
        other => other.into(),
    }
}

fn print_matrix(presenter: &MatrixPresenter<'_>) {
    let rows = presenter.rows();
    if rows.is_empty() {
        println!("No permissions.");
        return;
    }

    let width = rows
        .iter()
        .map(|row| row.resource.len())
        .max()
        .unwrap_or(0)
        .max("resource".len());

    print!("  {:width$}", "resource");
    for action in Action::all() {
        print!("  {:^8}", action.label());
    }
    println!("  {:^8}", "All");

    for row in &rows {
        let marker = if row.has_changes { '*' } else { ' ' };
        print!("{marker} {:width$}", row.resource);
        for cell in &row.cells {
            print!("  {:^8}", cell_text(cell.checked, cell.status));
        }
        println!("  {:^8}", if row.all_checked { "[x]" } else { "[ ]" });
    }
}

const fn cell_text(checked: bool, status: ChangeStatus) -> &'static str {
    match (status, checked) {
        (ChangeStatus::Added, _) => "[+]",
        (ChangeStatus::Removed, _) => "[-]",
        (ChangeStatus::Unchanged, true) => "[x]",
        (ChangeStatus::Unchanged, false) => "[ ]",
    }
}

/// Lists canonical permissions the matrix cannot show.
fn print_custom(session: &EditingSession) -> Result<()> {
    let custom: Vec<String> = session
        .canonical()?
        .keys()
        .filter(|key| key.vocabulary_action().is_none())
        .map(ToString::to_string)
        .collect();
    if !custom.is_empty() {
        println!();
        println!("Other permissions: {}", custom.join(", "));
    }
    Ok(())
}

fn print_diff(diff: &Diff) {
    println!("Pending changes ({}):", diff.len());
    for key in diff.added() {
        println!("  + {key}");
    }
    for key in diff.removed() {
        println!("  - {key}");
    }
}
