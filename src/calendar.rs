//! Academic calendar: holidays, and the extra classes that reopen some of them.
//!
//! Loaded from `{data_dir}/calendar.json`:
//!
//! ```json
//! { "holidays": ["2026-12-25"], "extraClasses": ["2026-12-26"] }
//! ```

use crate::error::{Result, RollcallError};
use crate::types::{AttendanceRecord, Role};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CALENDAR_FILE: &str = "calendar.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicCalendar {
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    #[serde(default, rename = "extraClasses")]
    pub extra_classes: Vec<NaiveDate>,
}

impl AcademicCalendar {
    /// Load `calendar.json` from `data_dir`. A missing or unreadable file
    /// yields an empty calendar, so no day is a holiday.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join(CALENDAR_FILE);
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<AcademicCalendar>(&content) {
                Ok(calendar) => {
                    tracing::info!(
                        "Loaded academic calendar: {} holidays, {} extra classes",
                        calendar.holidays.len(),
                        calendar.extra_classes.len()
                    );
                    calendar
                }
                Err(e) => {
                    tracing::error!("Failed to parse {}: {}, using empty calendar", CALENDAR_FILE, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!("Failed to read {}: {}, using empty calendar", CALENDAR_FILE, e);
                Self::default()
            }
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn has_extra_class(&self, date: NaiveDate) -> bool {
        self.extra_classes.contains(&date)
    }

    /// Students cannot mark attendance on a holiday unless an extra class is
    /// scheduled that day. Teachers always can.
    pub fn check(&self, record: &AttendanceRecord) -> Result<()> {
        if record.role != Role::Student {
            return Ok(());
        }
        let date = record.date()?;
        if self.is_holiday(date) && !self.has_extra_class(date) {
            return Err(RollcallError::HolidayWithoutClass {
                date: date.to_string(),
            });
        }
        Ok(())
    }
}
