//! Brings the directory in line with a roster.
//!
//! Every user in the roster is created or updated. Users of the same role that
//! are in the directory but not in the roster are listed, not deleted: removing
//! someone is a separate, deliberate admin action.

use anyhow::{Context, Result};
use clap::Parser;
use odzen::cli::RosterArg;
use odzen::manager::OdManager;
use odzen::roster::RosterKind;
use odzen::settings::Settings;
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// The CSV roster to sync from.
    roster: PathBuf,
    #[arg(long, value_enum, default_value_t = RosterArg::Students)]
    kind: RosterArg,
    /// Email of the admin running the sync.
    #[arg(long = "as")]
    admin: String,
}

pub fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load()?;
    odzen::init_tracing(&settings);

    let mut manager = OdManager::connect(&settings)
        .with_context(|| format!("failed to open {}", settings.database_url))?;
    let admin = manager.principal(&args.admin)?;
    let kind = RosterKind::from(args.kind);

    let reader = File::open(&args.roster)
        .with_context(|| format!("failed to open {}", args.roster.display()))?;
    let report = manager.import_users(&admin, reader, kind)?;
    println!("Users added or updated: {}", report.imported.len());
    for rejected in &report.rejected {
        println!("Skipped {rejected}");
    }

    let missing: Vec<String> = manager
        .absent_from_roster(&admin, kind, &report)?
        .into_iter()
        .map(|user| user.email)
        .collect();
    println!("Users not in the roster: {:#?}", missing);

    Ok(())
}
