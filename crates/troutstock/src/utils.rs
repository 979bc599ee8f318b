use std::collections::BTreeMap;

use crate::types::StockingEvent;

use chrono::NaiveDate;

/// Events whose calendar date falls within `start..=end`. Either bound may be
/// left open.
pub fn filter_by_range(
    events: &[StockingEvent],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<StockingEvent> {
    events
        .iter()
        .filter(|e| {
            let date = e.date.date_naive();
            start.is_none_or(|start| date >= start) && end.is_none_or(|end| date <= end)
        })
        .cloned()
        .collect()
}

/// Events keyed by water body, each list kept in input order.
pub fn group_by_water_body(events: &[StockingEvent]) -> BTreeMap<String, Vec<StockingEvent>> {
    let mut groups: BTreeMap<String, Vec<StockingEvent>> = BTreeMap::new();
    for event in events {
        groups
            .entry(event.water_body.clone())
            .or_default()
            .push(event.clone());
    }
    groups
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Start date ({start}) cannot be after end date ({end})")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("Offset must be greater than 0")]
    ZeroOffset,
    #[error("Limit must be greater than 0")]
    ZeroLimit,
}

#[derive(Debug, Default)]
pub struct EventFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub county: Option<String>,
    pub species: Option<String>,
    pub water_body: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl EventFilter {
    pub fn apply(self, events: Vec<StockingEvent>) -> Vec<StockingEvent> {
        let mut events = if self.start_date.is_some() || self.end_date.is_some() {
            filter_by_range(&events, self.start_date, self.end_date)
        } else {
            events
        };

        if let Some(county) = &self.county {
            events.retain(|e| e.county.eq_ignore_ascii_case(county.trim()));
        }
        if let Some(species) = &self.species {
            events.retain(|e| contains_ignore_case(&e.species, species.trim()));
        }
        if let Some(water_body) = &self.water_body {
            events.retain(|e| contains_ignore_case(&e.water_body, water_body.trim()));
        }
        if let Some(off) = self.offset {
            events = events.into_iter().skip(off).collect();
        }
        if let Some(lim) = self.limit {
            events.truncate(lim);
        }
        events
    }

    pub fn validate(self) -> Result<Self, FilterError> {
        if let Some(start) = self.start_date
            && let Some(end) = self.end_date
            && start > end
        {
            return Err(FilterError::InvertedRange { start, end });
        }
        if self.offset.is_some_and(|o| o == 0) {
            return Err(FilterError::ZeroOffset);
        }
        if self.limit.is_some_and(|l| l == 0) {
            return Err(FilterError::ZeroLimit);
        }
        Ok(self)
    }
}

#[derive(Debug)]
pub struct StockingStats {
    pub events: usize,
    pub water_bodies: usize,
    pub counties: usize,
    pub by_species: BTreeMap<String, usize>,
}

impl StockingStats {
    pub fn from_events(events: &[StockingEvent]) -> StockingStats {
        let mut by_species = BTreeMap::new();
        for species in events.iter().flat_map(|e| e.species.split(" + ")) {
            *by_species.entry(species.to_string()).or_insert(0) += 1;
        }

        StockingStats {
            events: events.len(),
            water_bodies: group_by_water_body(events).len(),
            counties: events
                .iter()
                .map(|e| e.county.as_str())
                .collect::<std::collections::BTreeSet<_>>()
                .len(),
            by_species,
        }
    }
}

impl std::fmt::Display for StockingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Stocking events: {}", self.events)?;
        writeln!(f, "  Water bodies:    {}", self.water_bodies)?;
        writeln!(f, "  Counties:        {}", self.counties)?;
        for (species, count) in &self.by_species {
            writeln!(f, "  {:<16} {}", format!("{}:", species), count)?;
        }
        Ok(())
    }
}
