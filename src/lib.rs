//! On-duty (OD) leave requests and daily attendance for a college.
//!
//! Students request OD for events, teachers approve or reject the requests and
//! mark attendance, and attendance is labelled with the event that explains it
//! when it is read back.

pub mod approval;
pub mod bulk;
pub mod cli;
pub mod display;
pub mod eligibility;
pub mod error;
pub mod manager;
pub mod models;
pub mod reconcile;
pub mod roster;
pub mod schema;
pub mod settings;
pub mod store;
pub mod validate;

pub use error::{OdError, OdResult, ValidationError};

use crate::settings::Settings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Sends logs to stderr, filtered by `RUST_LOG` or else `settings.log_filter`.
pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
