use crate::core::{DbError, Record, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const USERS_TABLE: &str = "users";

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Standard user account
    #[default]
    User,
    /// Administrator account
    Admin,
    /// Moderator account
    Moderator,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(format!("Unknown user type '{}'", other)),
        }
    }
}

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub birthday: String,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    pub user_type: UserType,
    pub is_active: bool,
    pub is_checked: bool,
    pub last_logged_at: Option<DateTime<Utc>>,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_record(record: &Record) -> Result<Self> {
        let text = |column: &str| -> Result<String> {
            record
                .get_str(column)
                .map(str::to_string)
                .ok_or_else(|| missing(column))
        };
        let timestamp = |column: &str| record.get_timestamp(column).ok_or_else(|| missing(column));

        Ok(Self {
            id: record.id().ok_or_else(|| missing("id"))?,
            firstname: text("firstname")?,
            lastname: text("lastname")?,
            email: text("email")?,
            birthday: text("birthday")?,
            hashed_password: record.get_str("hashedPassword").map(str::to_string),
            user_type: record
                .get_str("userType")
                .map(UserType::from_str)
                .transpose()
                .map_err(DbError::TypeMismatch)?
                .unwrap_or_default(),
            is_active: record.get_bool("isActive").unwrap_or(false),
            is_checked: record.get_bool("isChecked").unwrap_or(false),
            last_logged_at: record.get_timestamp("lastLoggedAt"),
            created_at: timestamp("created_at")?,
            updated_at: timestamp("updated_at")?,
        })
    }
}

fn missing(column: &str) -> DbError {
    DbError::ExecutionError(format!("Column '{}' missing from {} row", column, USERS_TABLE))
}

/// Data for a user about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub birthday: String,
    pub hashed_password: String,
    pub user_type: UserType,
}

impl NewUser {
    /// Trims names and normalizes the email to trimmed lowercase.
    pub fn into_record(self) -> Record {
        Record::new()
            .with("firstname", self.firstname.trim())
            .with("lastname", self.lastname.trim())
            .with("email", normalize_email(&self.email))
            .with("birthday", self.birthday)
            .with("hashedPassword", self.hashed_password)
            .with("userType", self.user_type.as_str())
            .with("isActive", false)
            .with("isChecked", false)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            firstname: "  John ".into(),
            lastname: " Doe".into(),
            email: "  John.Doe@Example.NET ".into(),
            birthday: "2001-01-01".into(),
            hashed_password: "$2b$04$hash".into(),
            user_type: UserType::default(),
        }
    }

    #[test]
    fn test_user_type_parsing() {
        assert_eq!("admin".parse::<UserType>(), Ok(UserType::Admin));
        assert_eq!(UserType::default().to_string(), "user");
        assert!("root".parse::<UserType>().is_err());
    }

    #[test]
    fn test_new_user_record_is_normalized() {
        let record = new_user().into_record();
        assert_eq!(record.get_str("firstname"), Some("John"));
        assert_eq!(record.get_str("lastname"), Some("Doe"));
        assert_eq!(record.get_str("email"), Some("john.doe@example.net"));
        assert_eq!(record.get_bool("isActive"), Some(false));
        assert_eq!(record.get_str("userType"), Some("user"));
    }

    #[test]
    fn test_from_record() {
        let now = Utc::now();
        let record = new_user()
            .into_record()
            .with("id", 4i64)
            .with("created_at", now)
            .with("updated_at", now)
            .with("lastLoggedAt", None::<DateTime<Utc>>);

        let user = User::from_record(&record).unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.email, "john.doe@example.net");
        assert_eq!(user.user_type, UserType::User);
        assert!(user.last_logged_at.is_none());

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["isActive"], false);
        assert!(json.get("hashedPassword").is_none());
    }

    #[test]
    fn test_from_record_reports_missing_columns() {
        let err = User::from_record(&Record::new().with("id", 1i64)).unwrap_err();
        assert!(matches!(err, DbError::ExecutionError(_)));
    }
}
