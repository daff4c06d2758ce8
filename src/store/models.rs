//! Records kept by the user and travel-log stores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Users
// ============================================================================

/// Access level of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account: own profile and own travel logs only
    #[default]
    Employee,
    /// Can list, edit and delete every account and read every travel log
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored account. Holds the bcrypt hash, so it is never serialized;
/// client-facing responses go through [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Unique key of the record
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub fuel_card_no: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New employee account created at registration.
    pub fn new(name: &str, email: &str, password_hash: String, fuel_card_no: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::default(),
            fuel_card_no: fuel_card_no.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Apply a sparse patch in place. Returns true if any field changed.
    pub(crate) fn apply(&mut self, patch: &UserPatch) -> bool {
        let mut changed = false;
        if let Some(ref name) = patch.name {
            if *name != self.name {
                self.name = name.clone();
                changed = true;
            }
        }
        if let Some(ref fuel_card_no) = patch.fuel_card_no {
            if *fuel_card_no != self.fuel_card_no {
                self.fuel_card_no = fuel_card_no.clone();
                changed = true;
            }
        }
        if let Some(role) = patch.role {
            if role != self.role {
                self.role = role;
                changed = true;
            }
        }
        changed
    }
}

/// Redacted view of a [`User`]: everything except the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub fuel_card_no: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            fuel_card_no: u.fuel_card_no,
            created_at: u.created_at,
        }
    }
}

/// Sparse update of a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub fuel_card_no: Option<String>,
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.fuel_card_no.is_none() && self.role.is_none()
    }
}

// ============================================================================
// Travel logs
// ============================================================================

/// One odometer entry recorded by an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelLog {
    pub id: Uuid,
    pub user_email: String,
    /// Day of the trip, `YYYY-MM-DD` (UTC)
    pub date: String,
    pub meter_start: f64,
    pub meter_end: f64,
    pub official_km: f64,
    pub private_km: f64,
    pub total_km: f64,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::store::TravelStore::insert_travel`].
#[derive(Debug, Clone)]
pub struct NewTravelLog {
    pub user_email: String,
    pub meter_start: f64,
    pub meter_end: f64,
    pub official_km: f64,
    pub private_km: f64,
    pub remarks: String,
}

impl NewTravelLog {
    /// Materialize the log, stamping id, date and the derived distance.
    pub(crate) fn into_log(self) -> TravelLog {
        let now = Utc::now();
        TravelLog {
            id: Uuid::new_v4(),
            user_email: self.user_email,
            date: now.format("%Y-%m-%d").to_string(),
            meter_start: self.meter_start,
            meter_end: self.meter_end,
            official_km: self.official_km,
            private_km: self.private_km,
            total_km: self.meter_end - self.meter_start,
            remarks: self.remarks,
            created_at: now,
        }
    }
}
