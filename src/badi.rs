//! Badí' (Bahá'í) calendar arithmetic.
//!
//! The books are kept on the Badí' calendar: 19 named months of 19 days each,
//! with the intercalary Ayyám-i-Há period (4 or 5 days) between Mulk and
//! ‘Alá'. Year 1 began at Naw-Rúz 1844. This module uses the arithmetic
//! convention of a fixed Naw-Rúz on March 21; everything downstream works in
//! Badí' dates and the store's timestamps are Badí'-epoch strings.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Gregorian year in which Badí' year 1 began.
const ERA_START: i32 = 1844;

/// Days covered by the 18 months that precede Ayyám-i-Há.
const DAYS_THROUGH_MULK: i64 = 18 * 19;

/// Ordinal used for Ayyám-i-Há in the `month` table. The named months carry
/// ordinals 1–19; the intercalary period sorts before ‘Alá' by convention
/// but is not a month, so it takes 0.
pub const AYYAM_I_HA_ORD: u8 = 0;

/// The fixed month set seeded into the store: (ordinal, name).
pub const MONTHS: [(u8, &str); 20] = [
    (1, "Bahá"),
    (2, "Jalál"),
    (3, "Jamál"),
    (4, "‘Aẓamat"),
    (5, "Núr"),
    (6, "Raḥmat"),
    (7, "Kalimát"),
    (8, "Kamál"),
    (9, "Asmá'"),
    (10, "‘Izzat"),
    (11, "Mashíyyat"),
    (12, "‘Ilm"),
    (13, "Qudrat"),
    (14, "Qawl"),
    (15, "Masá'il"),
    (16, "Sharaf"),
    (17, "Sulṭán"),
    (18, "Mulk"),
    (AYYAM_I_HA_ORD, "Ayyám-i-Há"),
    (19, "‘Alá'"),
];

/// Look up a month name by its ordinal.
pub fn month_name(ord: u8) -> Option<&'static str> {
    MONTHS
        .iter()
        .find(|(o, _)| *o == ord)
        .map(|(_, name)| *name)
}

/// A date on the Badí' calendar. `month` 0 is Ayyám-i-Há.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadiDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

/// Failure to parse a `"0182-02-19"` date string.
#[derive(Debug, thiserror::Error)]
#[error("Not a Badí' date (expected YYYY-MM-DD): {0}")]
pub struct ParseDateError(String);

impl BadiDate {
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// Convert a Gregorian date to its Badí' equivalent.
    pub fn from_gregorian(date: NaiveDate) -> Self {
        // Gregorian year in which this Badí' year began.
        let base_year = if date >= nawruz(date.year()) {
            date.year()
        } else {
            date.year() - 1
        };
        let year = base_year - ERA_START + 1;
        let start = nawruz(base_year);
        let next_nawruz = nawruz(base_year + 1);
        let day_of_year = (date - start).num_days();

        if day_of_year < DAYS_THROUGH_MULK {
            return Self {
                year,
                month: (day_of_year / 19) as u8 + 1,
                day: (day_of_year % 19) as u8 + 1,
            };
        }

        // ‘Alá' is the 19 days ending the day before Naw-Rúz; whatever sits
        // between the end of Mulk and the start of ‘Alá' is Ayyám-i-Há.
        let ala_start = next_nawruz - Duration::days(19);
        if date >= ala_start {
            Self {
                year,
                month: 19,
                day: (date - ala_start).num_days() as u8 + 1,
            }
        } else {
            Self {
                year,
                month: AYYAM_I_HA_ORD,
                day: (day_of_year - DAYS_THROUGH_MULK) as u8 + 1,
            }
        }
    }

    /// Today's Badí' date, UTC.
    pub fn today_utc() -> Self {
        Self::from_gregorian(Utc::now().date_naive())
    }
}

impl fmt::Display for BadiDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for BadiDate {
    type Err = ParseDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '-');
        let year = parts.next().and_then(|p| p.parse::<i32>().ok());
        let month = parts.next().and_then(|p| p.parse::<u8>().ok());
        let day = parts.next().and_then(|p| p.parse::<u8>().ok());
        match (year, month, day) {
            (Some(year), Some(month), Some(day)) if month <= 19 && (1..=19).contains(&day) => {
                Ok(Self { year, month, day })
            }
            _ => Err(ParseDateError(s.to_string())),
        }
    }
}

/// Current Badí'-epoch timestamp, e.g. `"0182-19-03T14:22:05"`. Used for
/// every `c_time`/`m_time` column; the clock portion is UTC.
pub fn now_stamp() -> String {
    let now = Utc::now();
    let date = BadiDate::from_gregorian(now.date_naive());
    format!(
        "{date}T{:02}:{:02}:{:02}",
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn nawruz(gregorian_year: i32) -> NaiveDate {
    // March 21 exists in every year chrono can represent.
    NaiveDate::from_ymd_opt(gregorian_year, 3, 21).expect("March 21 is a valid date")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greg(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nawruz_starts_the_year() {
        assert_eq!(
            BadiDate::from_gregorian(greg(2025, 3, 21)),
            BadiDate::new(182, 1, 1)
        );
        // The day before belongs to the previous year's final month.
        assert_eq!(
            BadiDate::from_gregorian(greg(2025, 3, 20)),
            BadiDate::new(181, 19, 19)
        );
    }

    #[test]
    fn test_month_boundaries() {
        // Last day of Bahá and first day of Jalál.
        assert_eq!(
            BadiDate::from_gregorian(greg(2025, 4, 8)),
            BadiDate::new(182, 1, 19)
        );
        assert_eq!(
            BadiDate::from_gregorian(greg(2025, 4, 9)),
            BadiDate::new(182, 2, 1)
        );
    }

    #[test]
    fn test_ayyam_i_ha_common_year() {
        // Badí' 182 spans a 28-day February: four intercalary days.
        assert_eq!(
            BadiDate::from_gregorian(greg(2026, 2, 26)),
            BadiDate::new(182, AYYAM_I_HA_ORD, 1)
        );
        assert_eq!(
            BadiDate::from_gregorian(greg(2026, 3, 1)),
            BadiDate::new(182, AYYAM_I_HA_ORD, 4)
        );
        // ‘Alá' runs right up to the eve of Naw-Rúz.
        assert_eq!(
            BadiDate::from_gregorian(greg(2026, 3, 2)),
            BadiDate::new(182, 19, 1)
        );
        assert_eq!(
            BadiDate::from_gregorian(greg(2026, 3, 20)),
            BadiDate::new(182, 19, 19)
        );
    }

    #[test]
    fn test_ayyam_i_ha_leap_year() {
        // Badí' 184 spans February 2028 (a leap year): five intercalary days.
        assert_eq!(
            BadiDate::from_gregorian(greg(2028, 2, 26)),
            BadiDate::new(184, AYYAM_I_HA_ORD, 1)
        );
        assert_eq!(
            BadiDate::from_gregorian(greg(2028, 3, 1)),
            BadiDate::new(184, AYYAM_I_HA_ORD, 5)
        );
        assert_eq!(
            BadiDate::from_gregorian(greg(2028, 3, 2)),
            BadiDate::new(184, 19, 1)
        );
    }

    #[test]
    fn test_display_round_trip() {
        let date = BadiDate::new(182, 2, 19);
        assert_eq!(date.to_string(), "0182-02-19");
        assert_eq!("0182-02-19".parse::<BadiDate>().unwrap(), date);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-date".parse::<BadiDate>().is_err());
        assert!("0182-02".parse::<BadiDate>().is_err());
        assert!("0182-20-01".parse::<BadiDate>().is_err());
        assert!("0182-02-00".parse::<BadiDate>().is_err());
    }

    #[test]
    fn test_month_table_is_complete() {
        assert_eq!(MONTHS.len(), 20);
        assert_eq!(month_name(1), Some("Bahá"));
        assert_eq!(month_name(19), Some("‘Alá'"));
        assert_eq!(month_name(AYYAM_I_HA_ORD), Some("Ayyám-i-Há"));
        assert_eq!(month_name(20), None);
    }

    #[test]
    fn test_now_stamp_shape() {
        let stamp = now_stamp();
        // "0183-08-14T09:41:00" — date, 'T', clock.
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[10..11], "T");
        assert!(stamp[..4].parse::<i32>().unwrap() >= 182);
    }
}
