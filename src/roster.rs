//! Reads user rosters exported from a spreadsheet as CSV.
//!
//! Rosters come from many hands, so each field is accepted under a few header
//! spellings (see [`HEADER_SYNONYMS`]). Headers are matched case-insensitively
//! after trimming, and a roster missing any required field is rejected before a
//! single row is read.

use crate::error::{OdResult, ValidationError};
use crate::models::{CredentialState, Role, User};
use crate::validate;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use tracing::warn;

/// A column of the roster, under its canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Department,
    Section,
    Year,
    Password,
    PasswordSet,
}

impl Field {
    pub fn canonical(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Department => "department",
            Field::Section => "section",
            Field::Year => "year",
            Field::Password => "password",
            Field::PasswordSet => "password_set",
        }
    }

    fn is_required(self) -> bool {
        !matches!(self, Field::PasswordSet)
    }
}

/// Accepted header spellings for each field, in order of preference.
pub const HEADER_SYNONYMS: &[(Field, &[&str])] = &[
    (Field::Name, &["name", "student_name", "teacher_name"]),
    (Field::Email, &["email", "mail", "email_id"]),
    (Field::Department, &["department", "dept"]),
    (Field::Section, &["section", "sec"]),
    (Field::Year, &["year", "yr"]),
    (Field::Password, &["password", "pwd", "pass"]),
    (Field::PasswordSet, &["password_set", "password_sett", "pwd_set"]),
];

/// Which role the users of a roster get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterKind {
    Students,
    Teachers,
}

impl RosterKind {
    pub fn role(self) -> Role {
        match self {
            RosterKind::Students => Role::Student,
            RosterKind::Teachers => Role::Teacher,
        }
    }
}

/// The outcome of reading a roster.
#[derive(Debug, Default)]
pub struct ParsedRoster {
    pub users: Vec<User>,
    /// One [`ValidationError::InvalidRow`] per row that was skipped.
    pub rejected: Vec<ValidationError>,
    /// The email cell of every non-blank row, lowercased, skipped rows included.
    pub emails: Vec<String>,
}

/// Where each field lives in the roster's rows.
struct ColumnMap {
    columns: Vec<(Field, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, ValidationError> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        let mut columns = Vec::new();
        let mut missing = Vec::new();
        for &(field, synonyms) in HEADER_SYNONYMS {
            let found = synonyms
                .iter()
                .find_map(|synonym| normalized.iter().position(|h| h == synonym));
            match found {
                Some(index) => columns.push((field, index)),
                None if field.is_required() => missing.push(field.canonical()),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing.join(", ")));
        }
        Ok(Self { columns })
    }

    fn get<'r>(&self, record: &'r StringRecord, field: Field) -> &'r str {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|&(_, index)| record.get(index))
            .map(str::trim)
            .unwrap_or("")
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1")
}

fn user_from_row(
    columns: &ColumnMap,
    record: &StringRecord,
    kind: RosterKind,
) -> Result<User, String> {
    let mut missing = Vec::new();
    for &(field, _) in HEADER_SYNONYMS {
        if field.is_required() && columns.get(record, field).is_empty() {
            missing.push(field.canonical());
        }
    }
    if !missing.is_empty() {
        return Err(format!("missing {}", missing.join(", ")));
    }

    let email = columns.get(record, Field::Email).to_lowercase();
    validate::email(&email).map_err(|e| e.to_string())?;
    let name = columns.get(record, Field::Name);
    validate::name(name).map_err(|e| e.to_string())?;

    let credential_state = if is_truthy(columns.get(record, Field::PasswordSet)) {
        CredentialState::Set
    } else {
        CredentialState::Temporary
    };

    Ok(User {
        email,
        name: name.to_string(),
        role: kind.role(),
        department: columns.get(record, Field::Department).to_string(),
        section: columns.get(record, Field::Section).to_string(),
        year: columns.get(record, Field::Year).to_string(),
        credential_state,
    })
}

/// Reads a CSV roster. Bad rows are reported in [`ParsedRoster::rejected`] and do
/// not stop the rest from being read; a missing required column fails the whole
/// roster.
///
/// Row numbers count the header as row 1, matching what a spreadsheet shows.
pub fn parse<R: Read>(reader: R, kind: RosterKind) -> OdResult<ParsedRoster> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(reader.headers()?)?;

    let mut roster = ParsedRoster::default();
    for (index, result) in reader.records().enumerate() {
        let row = index + 2;
        let record = result?;

        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let email = columns.get(&record, Field::Email);
        if !email.is_empty() {
            roster.emails.push(email.to_lowercase());
        }

        match user_from_row(&columns, &record, kind) {
            Ok(user) => roster.users.push(user),
            Err(reason) => {
                warn!(row, %reason, "skipping roster row");
                roster
                    .rejected
                    .push(ValidationError::InvalidRow { row, reason });
            }
        }
    }

    Ok(roster)
}
