//! Locating the schedule table and turning its rows into events.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::normalize::{UNKNOWN, extract_number, join_species, parse_date, parse_species};
use crate::table::{Row, Table};
use crate::types::StockingEvent;

const DATE_KEYWORDS: &[&str] = &["date", "when"];
const WATER_BODY_KEYWORDS: &[&str] = &["waterbody", "water", "location", "stream", "lake"];
const COUNTY_KEYWORDS: &[&str] = &["county"];
const SPECIES_KEYWORDS: &[&str] = &["species", "fish", "stocked"];
const CATEGORY_KEYWORDS: &[&str] = &["category", "cat"];
const NUMBER_OF_FISH_KEYWORDS: &[&str] = &["number", "count", "qty"];
const POUNDS_KEYWORDS: &[&str] = &["pounds", "lbs", "weight"];

#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("Missing date cell")]
    MissingDate,
    #[error("Missing water body cell")]
    MissingWaterBody,
    #[error("Unparseable date: {0}")]
    UnparseableDate(String),
}

/// Column index of every field the schedule may carry; `None` when the
/// table has no such column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub date: Option<usize>,
    pub water_body: Option<usize>,
    pub county: Option<usize>,
    pub species: Option<usize>,
    pub category: Option<usize>,
    pub number_of_fish: Option<usize>,
    pub pounds: Option<usize>,
}

impl ColumnMapping {
    /// Resolves each field to the first header cell containing one of its
    /// keywords. Fields resolve in declaration order and a claimed column is
    /// not offered to later fields, so "County" is never read as a count and
    /// "Location" never as a category.
    pub fn from_header(header: &[String]) -> Self {
        let header: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut claimed = vec![false; header.len()];
        let mut find = |keywords: &[&str]| {
            let column = header.iter().enumerate().position(|(i, text)| {
                !claimed[i] && keywords.iter().any(|k| text.contains(k))
            })?;
            claimed[column] = true;
            Some(column)
        };

        Self {
            date: find(DATE_KEYWORDS),
            water_body: find(WATER_BODY_KEYWORDS),
            county: find(COUNTY_KEYWORDS),
            species: find(SPECIES_KEYWORDS),
            category: find(CATEGORY_KEYWORDS),
            number_of_fish: find(NUMBER_OF_FISH_KEYWORDS),
            pounds: find(POUNDS_KEYWORDS),
        }
    }

    /// A table can only hold stocking events if it has both a date and a
    /// water body column.
    pub fn is_viable(&self) -> bool {
        self.date.is_some() && self.water_body.is_some()
    }
}

fn cell(row: &Row, column: Option<usize>) -> Option<&str> {
    column
        .and_then(|i| row.get(i))
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
}

fn event_id(water_body: &str, date: &DateTime<Utc>, row_index: usize) -> String {
    let raw = format!(
        "{}-{}-{}",
        water_body,
        date.to_rfc3339_opts(SecondsFormat::Secs, true),
        row_index
    );
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub fn build_event(
    row: &Row,
    row_index: usize,
    mapping: &ColumnMapping,
) -> Result<StockingEvent, RowError> {
    let date_text = cell(row, mapping.date).ok_or(RowError::MissingDate)?;
    let water_body = cell(row, mapping.water_body).ok_or(RowError::MissingWaterBody)?;
    let date =
        parse_date(date_text).ok_or_else(|| RowError::UnparseableDate(date_text.to_string()))?;

    let county = cell(row, mapping.county).unwrap_or(UNKNOWN).to_string();
    let species = join_species(&parse_species(cell(row, mapping.species).unwrap_or_default()));

    Ok(StockingEvent {
        id: event_id(water_body, &date, row_index),
        water_body: water_body.to_string(),
        county,
        species,
        date,
        pounds: cell(row, mapping.pounds).and_then(extract_number),
        number_of_fish: cell(row, mapping.number_of_fish).and_then(extract_number),
        category: cell(row, mapping.category).map(str::to_string),
    })
}

/// Lazily yields the events of one table, skipping rows that cannot become
/// an event. Call [`table_events`] again to start over.
pub struct TableEvents<'a> {
    rows: Box<dyn Iterator<Item = (usize, &'a Row)> + 'a>,
    mapping: ColumnMapping,
}

impl Iterator for TableEvents<'_> {
    type Item = StockingEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, row) in self.rows.by_ref() {
            match build_event(row, index, &self.mapping) {
                Ok(event) => return Some(event),
                Err(e) => log::debug!("Skipping row {}: {}", index, e),
            }
        }
        None
    }
}

/// Events of `table`, or `None` when its header does not look like a
/// stocking schedule.
pub fn table_events(table: &Table) -> Option<TableEvents<'_>> {
    let mapping = ColumnMapping::from_header(table.header()?);
    if !mapping.is_viable() {
        return None;
    }

    Some(TableEvents {
        rows: Box::new(table.data_rows()),
        mapping,
    })
}

/// Scans tables in document order and returns the events of the first one
/// that yields any. An empty result is not an error.
pub fn locate_events(tables: &[Table]) -> Vec<StockingEvent> {
    for (i, table) in tables.iter().enumerate() {
        let Some(events) = table_events(table) else {
            log::debug!("Table {} has no date and water body columns, skipping", i);
            continue;
        };

        let events: Vec<StockingEvent> = events.collect();
        if !events.is_empty() {
            log::info!("Found {} stocking events in table {}", events.len(), i);
            return events;
        }
        log::debug!("Table {} produced no events, trying the next one", i);
    }

    log::warn!("No stocking events found in {} table(s)", tables.len());
    Vec::new()
}
