use serde::{Deserialize, Serialize};

/// Key assigned by an object store's key generator. Starts at 1.
pub type RecordKey = u64;

/// A value read back from an object store together with the key it is stored under.
///
/// The key travels with the payload so that callers can delete exactly what
/// they read instead of guessing keys from positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: RecordKey,
    pub value: serde_json::Value,
}

/// Who marked the attendance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Teacher,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "Student"),
            Role::Teacher => write!(f, "Teacher"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::RollcallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Student" | "student" => Ok(Role::Student),
            "Teacher" | "teacher" => Ok(Role::Teacher),
            other => Err(crate::RollcallError::InvalidRecord(format!(
                "Invalid role: {}",
                other
            ))),
        }
    }
}

/// An attendance entry recorded while offline.
///
/// Field names match what the backend's `/sync` endpoint reads
/// (`userId`, `timestamp`, `lat`, `lon`, `role`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub timestamp: String,
    pub lat: f64,
    pub lon: f64,
    pub role: Role,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl AttendanceRecord {
    /// Build a record stamped with the current local time.
    pub fn now(user_id: u64, role: Role, lat: f64, lon: f64) -> Self {
        AttendanceRecord {
            user_id,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            lat,
            lon,
            role,
        }
    }

    /// Reject coordinates outside the valid geographic range.
    ///
    /// # Errors
    ///
    /// [`crate::RollcallError::InvalidGeolocation`] for out-of-range or NaN
    /// coordinates, [`crate::RollcallError::InvalidRecord`] for a timestamp
    /// not in [`TIMESTAMP_FORMAT`].
    pub fn validate(&self) -> crate::Result<()> {
        let lat_ok = (-90.0..=90.0).contains(&self.lat);
        let lon_ok = (-180.0..=180.0).contains(&self.lon);
        if !lat_ok || !lon_ok {
            return Err(crate::RollcallError::InvalidGeolocation {
                lat: self.lat,
                lon: self.lon,
            });
        }
        self.date()?;
        Ok(())
    }

    /// Calendar day the attendance was marked on.
    pub fn date(&self) -> crate::Result<chrono::NaiveDate> {
        chrono::NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map(|t| t.date())
            .map_err(|e| {
                crate::RollcallError::InvalidRecord(format!(
                    "timestamp {:?} is not {}: {}",
                    self.timestamp, TIMESTAMP_FORMAT, e
                ))
            })
    }

    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
