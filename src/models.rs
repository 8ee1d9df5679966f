//! The records the tracker stores, and the small enums they carry.

use crate::error::{OdError, OdResult, ValidationError};
use crate::schema::{attendance, events, users};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a fieldless enum stored as lowercase text.
macro_rules! text_enum {
    ($(#[$meta:meta])* pub enum $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
        )]
        #[serde(rename_all = "lowercase")]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} `{}`",
                        stringify!($name),
                        other
                    )),
                }
            }
        }

        impl ToSql<Text, Sqlite> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $name {
            fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
                let text = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
                text.parse().map_err(Into::into)
            }
        }
    };
}

text_enum! {
    /// What a user is allowed to do.
    pub enum Role {
        Admin => "admin",
        Teacher => "teacher",
        Student => "student",
    }
}

text_enum! {
    /// Whether a user still logs in with the password they were provisioned with.
    pub enum CredentialState {
        Temporary => "temporary",
        Set => "set",
    }
}

text_enum! {
    /// The lifecycle state of an [`OdRequest`].
    pub enum OdStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// A student's presence on a given day.
    pub enum AttendanceStatus {
        Present => "present",
        Absent => "absent",
    }
}

/// A user in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub department: String,
    pub section: String,
    pub year: String,
    pub credential_state: CredentialState,
}

/// The identity an operation is performed as.
///
/// This is passed explicitly into every mutating operation rather than read from
/// ambient session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub role: Role,
    pub department: String,
    pub section: String,
}

impl Principal {
    pub fn require_role(&self, required: Role) -> OdResult<()> {
        if self.role == required {
            Ok(())
        } else {
            Err(OdError::WrongRole {
                email: self.email.clone(),
                required,
                actual: self.role,
            })
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role,
            department: user.department.clone(),
            section: user.section.clone(),
        }
    }
}

/// A named, time-boxed activity students may request OD for.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Event {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub organizer: String,
    pub from_date: NaiveDateTime,
    pub to_date: NaiveDateTime,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

/// The fields a teacher fills in to create an [`Event`].
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub organizer: Option<String>,
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
}

/// A supporting document stored inline with an OD request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Base64 (standard alphabet) encoding of the file contents.
    pub data: String,
    pub mime_type: String,
    pub file_name: String,
}

impl Attachment {
    pub fn decode(&self) -> Result<Vec<u8>, ValidationError> {
        STANDARD
            .decode(&self.data)
            .map_err(|_| ValidationError::AttachmentEncoding)
    }
}

/// A student's leave request for an event over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdRequest {
    pub id: String,
    pub student_email: String,
    pub student_name: String,
    pub student_department: String,
    pub student_section: String,
    pub event_id: Option<String>,
    /// Copy of the event name taken at submission, used once the event is gone.
    pub event_name: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub attachment: Option<Attachment>,
    pub status: OdStatus,
    pub created_at: NaiveDateTime,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
}

impl OdRequest {
    /// Whether `date` falls within the request, both ends inclusive.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from_date <= date && date <= self.to_date
    }
}

/// What a student submits to open an [`OdRequest`].
#[derive(Debug, Clone)]
pub struct NewOdRequest {
    pub event_id: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub attachment: Option<NewAttachment>,
}

/// A raw upload, before validation and encoding.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

/// A student's attendance for a single calendar day.
///
/// The record is keyed by `(student_email, date)`; see [`AttendanceRecord::key`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttendanceRecord {
    pub student_email: String,
    pub date: NaiveDate,
    pub student_name: String,
    pub student_department: String,
    pub student_section: String,
    pub status: AttendanceStatus,
    pub event_id: Option<String>,
    pub event_name: Option<String>,
    pub event_venue: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub marked_by: String,
}

impl AttendanceRecord {
    /// The deterministic identifier of the record for `student_email` on `date`.
    pub fn key_for(student_email: &str, date: NaiveDate) -> String {
        format!("{}/{}", student_email, date.format("%Y-%m-%d"))
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.student_email, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("Approved".parse::<OdStatus>(), Ok(OdStatus::Approved));
        assert_eq!(" student ".parse::<Role>(), Ok(Role::Student));
        assert!("excused".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn record_key_is_email_and_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            AttendanceRecord::key_for("ana@college.edu", date),
            "ana@college.edu/2024-03-01"
        );
    }

    #[test]
    fn principal_role_check() {
        let teacher = Principal {
            email: "t@college.edu".to_string(),
            role: Role::Teacher,
            department: "CSE".to_string(),
            section: "A".to_string(),
        };
        assert!(teacher.require_role(Role::Teacher).is_ok());
        assert!(matches!(
            teacher.require_role(Role::Admin),
            Err(OdError::WrongRole {
                required: Role::Admin,
                actual: Role::Teacher,
                ..
            })
        ));
    }
}
