use std::fmt::Display;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Earliest date the schedule page is asked for when backfilling history.
pub const BACKFILL_START: NaiveDate = match NaiveDate::from_ymd_opt(2015, 1, 1) {
    Some(date) => date,
    None => panic!("invalid backfill start date"),
};

const RECENT_LOOKBACK_DAYS: u64 = 60;
const LOOKAHEAD_DAYS: u64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockingEvent {
    pub id: String,
    pub water_body: String,
    pub county: String,
    pub species: String,
    pub date: DateTime<Utc>,
    pub pounds: Option<u64>,
    pub number_of_fish: Option<u64>,
    pub category: Option<String>,
}

impl StockingEvent {
    /// The `(date, water body, species)` triple that stays stable when the
    /// page reorders its rows, unlike `id`.
    pub fn dedup_key(&self) -> (NaiveDate, &str, &str) {
        (self.date.date_naive(), &self.water_body, &self.species)
    }
}

impl Display for StockingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} · {} County · {}",
            self.date.date_naive(),
            self.water_body,
            self.county,
            self.species
        )?;
        if let Some(category) = &self.category {
            write!(f, " · Category {}", category)?;
        }
        match (self.number_of_fish, self.pounds) {
            (Some(fish), Some(lbs)) => write!(f, "\n   {} fish, {} lbs", fish, lbs),
            (Some(fish), None) => write!(f, "\n   {} fish", fish),
            (None, Some(lbs)) => write!(f, "\n   {} lbs", lbs),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Start date ({start}) cannot be after end date ({end})")]
pub struct RangeError {
    start: NaiveDate,
    end: NaiveDate,
}

/// Inclusive calendar range sent to the schedule page as query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError { start, end });
        }
        Ok(Self { start, end })
    }

    /// Recent corrections plus upcoming scheduled stockings.
    pub fn recent(today: NaiveDate) -> Self {
        Self {
            start: today - Days::new(RECENT_LOOKBACK_DAYS),
            end: today + Days::new(LOOKAHEAD_DAYS),
        }
    }

    /// As much history as the page will return.
    pub fn backfill(today: NaiveDate) -> Self {
        Self {
            start: BACKFILL_START.min(today),
            end: today + Days::new(LOOKAHEAD_DAYS),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Query string in the page's month-name format,
    /// e.g. `start_date=January+1%2C+2015&end_date=June+30%2C+2025`.
    pub fn query_string(&self) -> String {
        format!(
            "start_date={}&end_date={}",
            form_encode(&self.start.format("%B %-d, %Y").to_string()),
            form_encode(&self.end.format("%B %-d, %Y").to_string())
        )
    }
}

fn form_encode(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ' ' => "+".to_string(),
            ',' => "%2C".to_string(),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_query_string_uses_month_names() {
        let range = DateRange::new(date(2015, 1, 1), date(2025, 6, 30)).unwrap();
        assert_eq!(
            range.query_string(),
            "start_date=January+1%2C+2015&end_date=June+30%2C+2025"
        );
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let err = DateRange::new(date(2025, 2, 1), date(2025, 1, 1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Start date (2025-02-01) cannot be after end date (2025-01-01)"
        );
    }

    #[test]
    fn test_recent_and_backfill_windows() {
        let today = date(2024, 6, 1);

        let recent = DateRange::recent(today);
        assert_eq!(recent.start(), date(2024, 4, 2));
        assert_eq!(recent.end(), date(2025, 6, 1));

        let backfill = DateRange::backfill(today);
        assert_eq!(backfill.start(), BACKFILL_START);
        assert_eq!(backfill.end(), recent.end());
    }

    #[test]
    fn test_event_serializes_camel_case_iso_date() {
        let event = StockingEvent {
            id: "smith-creek-2024-06-01t00:00:00z-1".to_string(),
            water_body: "Smith Creek".to_string(),
            county: "Bath".to_string(),
            species: "Rainbow Trout".to_string(),
            date: date(2024, 6, 1).and_hms_opt(0, 0, 0).unwrap().and_utc(),
            pounds: None,
            number_of_fish: Some(500),
            category: Some("A".to_string()),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["waterBody"], "Smith Creek");
        assert_eq!(json["numberOfFish"], 500);
        assert_eq!(json["date"], "2024-06-01T00:00:00Z");
        assert!(json["pounds"].is_null());
    }
}
