use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EmployeeId = i64;

/// Back office staff record. `password_hash` is an argon2 PHC string and is
/// never serialized.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub surname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub activated: bool,
    pub phone_number: String,
    pub enrolled: DateTime<Utc>,
}

impl fmt::Debug for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Employee")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("surname", &self.surname)
            .field("password_hash", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .field("activated", &self.activated)
            .field("phone_number", &self.phone_number)
            .field("enrolled", &self.enrolled)
            .finish()
    }
}

/// Fields the store needs to create an employee. Id and activation state are
/// assigned by the store; new employees always start unactivated.
#[derive(Clone)]
pub struct EmployeeDraft {
    pub name: String,
    pub surname: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub phone_number: String,
    pub enrolled: DateTime<Utc>,
}

/// Profile fields an employee may edit after registration. Credentials and
/// activation state are changed only through their own operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub phone_number: String,
}

/// Acting identity for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No credential was presented.
    Anonymous,
    Employee(Employee),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn employee(&self) -> Option<&Employee> {
        match self {
            Identity::Employee(employee) => Some(employee),
            Identity::Anonymous => None,
        }
    }
}

impl From<Employee> for Identity {
    fn from(value: Employee) -> Self {
        Identity::Employee(value)
    }
}
