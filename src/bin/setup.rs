//! Creates the database and loads the first roster.
//!
//! The admin named on the command line is created (or updated) first, and the
//! roster is then imported as that admin.

use anyhow::{Context, Result};
use clap::Parser;
use odzen::cli::RosterArg;
use odzen::manager::OdManager;
use odzen::models::{CredentialState, Principal, Role, User};
use odzen::settings::Settings;
use odzen::store::DirectoryStore;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// The CSV roster to import.
    roster: PathBuf,
    #[arg(long, value_enum, default_value_t = RosterArg::Students)]
    kind: RosterArg,
    /// Email of the admin account to create.
    #[arg(long)]
    admin: String,
    #[arg(long, default_value = "Administrator")]
    admin_name: String,
}

pub fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load()?;
    odzen::init_tracing(&settings);

    let mut manager = OdManager::connect(&settings)
        .with_context(|| format!("failed to open {}", settings.database_url))?;
    info!(database = %settings.database_url, "schema ready");

    let admin = User {
        email: args.admin.trim().to_lowercase(),
        name: args.admin_name,
        role: Role::Admin,
        department: String::new(),
        section: String::new(),
        year: String::new(),
        credential_state: CredentialState::Temporary,
    };
    odzen::validate::email(&admin.email)?;
    manager.store().upsert_user(&admin)?;

    let reader = File::open(&args.roster)
        .with_context(|| format!("failed to open {}", args.roster.display()))?;
    let report = manager.import_users(&Principal::from(&admin), reader, args.kind.into())?;

    println!("Imported {} users:", report.imported.len());
    for email in &report.imported {
        println!("  {email}");
    }
    for rejected in &report.rejected {
        println!("Skipped {rejected}");
    }

    Ok(())
}
