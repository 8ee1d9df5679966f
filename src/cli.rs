//! This module contains the command-line interface [`Cli`] parser for managing OD requests and
//! attendance.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::bulk::{BulkMark, EventSelector};
use crate::models::{AttendanceStatus, NewEvent, OdStatus, Role};
use crate::roster::RosterKind;
use crate::store::{RecordFilter, UserFilter};

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(name = "odzen", version)]
pub struct Cli {
    /// Email of the user to act as.
    #[arg(long = "as", value_name = "EMAIL", global = true)]
    pub actor: Option<String>,

    /// The different commands available for managing OD requests and attendance.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or update users from a CSV roster (admin).
    ImportUsers {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = RosterArg::Students)]
        kind: RosterArg,
    },

    /// List users in the directory.
    Users(UserArgs),

    /// Remove a user from the directory (admin).
    DeleteUser { email: String },

    /// Create an event (teacher or admin).
    CreateEvent(EventArgs),

    /// List events, newest first.
    Events,

    /// Delete an event (admin, or the teacher who created it).
    DeleteEvent { id: String },

    /// Request OD for an event (student).
    SubmitOd(SubmitArgs),

    /// List OD requests, oldest first.
    Requests {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        status: Option<OdStatus>,
        /// Only requests for the event with this name.
        #[arg(long)]
        event: Option<String>,
    },

    /// Save the document attached to an OD request.
    ShowAttachment {
        id: String,
        /// Defaults to the attachment's own file name.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Approve a pending OD request (teacher).
    Approve { id: String },

    /// Reject a pending OD request (teacher).
    Reject { id: String },

    /// Mark your own attendance, or with `--student` change a student's existing record (teacher).
    Mark {
        status: AttendanceStatus,
        /// Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        student: Option<String>,
    },

    /// Mark every matching student who has no record for the day yet (teacher).
    MarkAll(MarkAllArgs),

    /// Show attendance, labelled with the event behind each record.
    Attendance(AttendanceArgs),

    /// List students currently on OD.
    ActiveOd {
        #[command(flatten)]
        filter: UserArgs,
        /// Only students on OD for the event with this name.
        #[arg(long)]
        event: Option<String>,
    },

    /// Replace your temporary password.
    SetPassword { password: String },

    /// Report students with more than one record for the same day.
    Audit,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterArg {
    Students,
    Teachers,
}

impl From<RosterArg> for RosterKind {
    fn from(arg: RosterArg) -> Self {
        match arg {
            RosterArg::Students => RosterKind::Students,
            RosterArg::Teachers => RosterKind::Teachers,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct UserArgs {
    #[arg(long)]
    pub role: Option<Role>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub section: Option<String>,
    #[arg(long)]
    pub year: Option<String>,
}

impl From<UserArgs> for UserFilter {
    fn from(args: UserArgs) -> Self {
        UserFilter {
            role: args.role,
            department: args.department,
            section: args.section,
            year: args.year,
        }
    }
}

#[derive(Args, Debug)]
pub struct EventArgs {
    pub name: String,
    /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM`.
    #[arg(long, value_parser = parse_when)]
    pub from: NaiveDateTime,
    #[arg(long, value_parser = parse_when)]
    pub to: NaiveDateTime,
    #[arg(long)]
    pub venue: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Defaults to your own email.
    #[arg(long)]
    pub organizer: Option<String>,
}

impl From<EventArgs> for NewEvent {
    fn from(args: EventArgs) -> Self {
        NewEvent {
            name: args.name,
            description: args.description,
            venue: args.venue,
            organizer: args.organizer,
            from_date: Some(args.from),
            to_date: Some(args.to),
        }
    }
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long)]
    pub event: Option<String>,
    #[arg(long)]
    pub from: NaiveDate,
    #[arg(long)]
    pub to: NaiveDate,
    /// A PDF, JPEG or PNG supporting the request.
    #[arg(long)]
    pub attachment: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MarkAllArgs {
    pub status: AttendanceStatus,
    /// Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub section: Option<String>,
    #[arg(long)]
    pub year: Option<String>,
    #[arg(long, conflicts_with = "event_name")]
    pub event_id: Option<String>,
    #[arg(long)]
    pub event_name: Option<String>,
}

impl From<MarkAllArgs> for BulkMark {
    fn from(args: MarkAllArgs) -> Self {
        let mut mark = BulkMark::new(args.status);
        mark.date = args.date;
        mark.filter.department = args.department;
        mark.filter.section = args.section;
        mark.filter.year = args.year;
        mark.event = args
            .event_id
            .map(EventSelector::Id)
            .or(args.event_name.map(EventSelector::Name));
        mark
    }
}

#[derive(Args, Debug)]
pub struct AttendanceArgs {
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub student: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub section: Option<String>,
}

impl From<AttendanceArgs> for RecordFilter {
    fn from(args: AttendanceArgs) -> Self {
        RecordFilter {
            student_email: args.student,
            date: args.date,
            department: args.department,
            section: args.section,
        }
    }
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` or `YYYY-MM-DDTHH:MM`. A bare date means midnight.
pub fn parse_when(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(when) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(when);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| format!("`{value}` is not a date (YYYY-MM-DD) or date and time"))
}

/// Guesses an attachment's mime type from its extension.
pub fn mime_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
