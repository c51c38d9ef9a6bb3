//! Holiday calendars as model regressors

use crate::config::ForecastConfig;
use crate::data::{float_column, require_column, string_column};
use crate::error::Result;
use crate::utils::date_parser::parse_date;
use chrono::{Duration, NaiveDate};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// A named calendar event whose effect spans a window around its date
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolidayEvent {
    pub name: String,
    pub date: NaiveDate,
    /// Days before `date` the effect starts
    pub lower_window: u32,
    /// Days after `date` the effect lasts
    pub upper_window: u32,
}

impl HolidayEvent {
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            lower_window: 0,
            upper_window: 0,
        }
    }

    pub fn with_window(mut self, lower: u32, upper: u32) -> Self {
        self.lower_window = lower;
        self.upper_window = upper;
        self
    }

    /// Whether `day` falls inside `[date - lower_window, date + upper_window]`
    pub fn covers(&self, day: NaiveDate) -> bool {
        let offset = (day - self.date).num_days();
        offset >= -i64::from(self.lower_window) && offset <= i64::from(self.upper_window)
    }

    /// First and last covered day
    pub fn span(&self) -> (NaiveDate, NaiveDate) {
        (
            self.date - Duration::days(i64::from(self.lower_window)),
            self.date + Duration::days(i64::from(self.upper_window)),
        )
    }
}

/// Deduplicated set of holiday events, ordered by date then name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayTable {
    events: Vec<HolidayEvent>,
}

impl HolidayTable {
    /// Build a table; duplicate `(name, date)` pairs keep the widest window
    pub fn new(mut events: Vec<HolidayEvent>) -> Self {
        events.sort_by(|a, b| (a.date, &a.name).cmp(&(b.date, &b.name)));
        let mut merged: Vec<HolidayEvent> = Vec::with_capacity(events.len());
        for event in events {
            match merged.last_mut() {
                Some(last) if last.date == event.date && last.name == event.name => {
                    last.lower_window = last.lower_window.max(event.lower_window);
                    last.upper_window = last.upper_window.max(event.upper_window);
                }
                _ => merged.push(event),
            }
        }
        Self { events: merged }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[HolidayEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct holiday names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| e.name.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whether any event called `name` covers `day`
    pub fn is_active(&self, name: &str, day: NaiveDate) -> bool {
        self.events
            .iter()
            .any(|e| e.name == name && e.covers(day))
    }
}

/// Reshapes a raw holiday calendar into a [`HolidayTable`]
#[derive(Debug, Clone, PartialEq)]
pub struct HolidayTableBuilder {
    date_column: String,
    name_column: String,
    scope: Option<(String, String)>,
    default_window: (u32, u32),
    window_columns: Option<(String, String)>,
}

impl Default for HolidayTableBuilder {
    fn default() -> Self {
        Self::new("date", "description").with_scope("locale", "National")
    }
}

impl HolidayTableBuilder {
    /// Read dates and names from the given columns, keeping every row
    pub fn new(date_column: impl Into<String>, name_column: impl Into<String>) -> Self {
        Self {
            date_column: date_column.into(),
            name_column: name_column.into(),
            scope: None,
            default_window: (0, 0),
            window_columns: None,
        }
    }

    /// Keep only rows whose `column` equals `value`
    pub fn with_scope(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.scope = Some((column.into(), value.into()));
        self
    }

    /// Keep every row regardless of scope
    pub fn without_scope(mut self) -> Self {
        self.scope = None;
        self
    }

    /// Window used for rows that do not carry their own
    pub fn with_default_window(mut self, lower: u32, upper: u32) -> Self {
        self.default_window = (lower, upper);
        self
    }

    /// Take the default window from `config.holiday_window`
    pub fn with_config(self, config: &ForecastConfig) -> Self {
        let (lower, upper) = config.holiday_window;
        self.with_default_window(lower, upper)
    }

    /// Read per-row windows from these columns; empty cells fall back to the default window
    pub fn with_window_columns(
        mut self,
        lower_column: impl Into<String>,
        upper_column: impl Into<String>,
    ) -> Self {
        self.window_columns = Some((lower_column.into(), upper_column.into()));
        self
    }

    /// Build the table from a raw holidays frame
    ///
    /// Missing columns are a `DataError`. Rows with an unparseable date, a
    /// missing name or an invalid window are dropped with a warning.
    pub fn build(&self, df: &DataFrame) -> Result<HolidayTable> {
        let dates = string_column(df, &self.date_column)?;
        let names = string_column(df, &self.name_column)?;
        let scopes = match &self.scope {
            Some((column, _)) => Some(string_column(df, column)?),
            None => None,
        };
        let windows = match &self.window_columns {
            Some((lower, upper)) => {
                require_column(df, lower)?;
                require_column(df, upper)?;
                Some((float_column(df, lower)?, float_column(df, upper)?))
            }
            None => None,
        };

        let mut events = Vec::new();
        let mut out_of_scope = 0usize;
        let mut dropped = 0usize;

        for row in 0..df.height() {
            if let (Some(scopes), Some((_, wanted))) = (&scopes, &self.scope) {
                if scopes[row].as_deref() != Some(wanted.as_str()) {
                    out_of_scope += 1;
                    continue;
                }
            }

            let date = match dates[row].as_deref().map(parse_date) {
                Some(Ok(d)) => d,
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            let name = match names[row].as_deref().map(str::trim) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            let window = match &windows {
                Some((lower, upper)) => {
                    match (
                        window_cell(lower[row], self.default_window.0),
                        window_cell(upper[row], self.default_window.1),
                    ) {
                        (Some(l), Some(u)) => (l, u),
                        _ => {
                            dropped += 1;
                            continue;
                        }
                    }
                }
                None => self.default_window,
            };

            events.push(HolidayEvent::new(name, date).with_window(window.0, window.1));
        }

        if dropped > 0 {
            warn!(dropped, kept = events.len(), "dropped malformed holiday rows");
        }
        let table = HolidayTable::new(events);
        debug!(
            events = table.len(),
            names = table.names().len(),
            out_of_scope,
            "built holiday table"
        );
        Ok(table)
    }
}

/// A window cell must be a non-negative whole number; empty cells use the default
fn window_cell(cell: Option<f64>, default: u32) -> Option<u32> {
    match cell {
        None => Some(default),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => {
            Some(v as u32)
        }
        Some(_) => None,
    }
}
