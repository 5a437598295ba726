use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::logs::aggregate::{LogSummary, MacroSplit, NutrientTotals};
use crate::logs::repo::{Log, LogEntry};

/// Body for adding an entry: the free-text food query, e.g. "2 eggs".
#[derive(Debug, Deserialize)]
pub struct AddEntryRequest {
    pub entry_query: String,
}

/// Partial update of one entry; absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct PatchEntryRequest {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub calories: Option<f64>,
    pub fat: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct EntryView {
    pub entry_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbs: f64,
}

impl From<LogEntry> for EntryView {
    fn from(entry: LogEntry) -> Self {
        Self {
            entry_id: entry.id,
            name: entry.name,
            quantity: entry.quantity,
            calories: entry.calories,
            fat: entry.fat,
            protein: entry.protein,
            carbs: entry.carbs,
        }
    }
}

/// Full log state returned from every read and mutation.
#[derive(Debug, Serialize)]
pub struct LogDetail {
    pub id: Uuid,
    pub date: Date,
    pub entries: Vec<EntryView>,
    pub total: NutrientTotals,
    pub macros: MacroSplit,
}

impl LogDetail {
    pub fn new(log: Log, entries: Vec<LogEntry>, summary: LogSummary) -> Self {
        Self {
            id: log.id,
            date: log.log_date,
            entries: entries.into_iter().map(EntryView::from).collect(),
            total: summary.total,
            macros: summary.macros,
        }
    }
}

/// List item: a day's summary without its entries.
#[derive(Debug, Serialize)]
pub struct LogListItem {
    pub id: Uuid,
    pub date: Date,
    pub total: NutrientTotals,
    pub macros: MacroSplit,
}

impl LogListItem {
    pub fn new(log: Log, summary: LogSummary) -> Self {
        Self {
            id: log.id,
            date: log.log_date,
            total: summary.total,
            macros: summary.macros,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::OffsetDateTime;

    #[test]
    fn detail_serializes_the_summary_shape() {
        let log = Log {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            log_date: date!(2024 - 03 - 01),
            created_at: OffsetDateTime::now_utc(),
        };
        let entry = LogEntry {
            id: Uuid::new_v4(),
            log_id: log.id,
            name: "egg".into(),
            quantity: 2.0,
            calories: 140.0,
            fat: 10.0,
            protein: 12.0,
            carbs: 1.0,
            created_at: OffsetDateTime::now_utc(),
        };
        let summary = crate::logs::aggregate::summarize(std::slice::from_ref(&entry));
        let detail = LogDetail::new(log, vec![entry], summary);

        let json = serde_json::to_value(&detail).expect("serialize");
        assert_eq!(json["entries"][0]["name"], "egg");
        assert_eq!(json["total"]["calories"], 140.0);
        assert_eq!(json["macros"]["fat"], 64.3);
        assert!(json["entries"][0]["entry_id"].is_string());
    }

    #[test]
    fn patch_request_accepts_sparse_bodies() {
        let patch: PatchEntryRequest =
            serde_json::from_str(r#"{"calories": 90}"#).expect("deserialize");
        assert_eq!(patch.calories, Some(90.0));
        assert!(patch.name.is_none());
        assert!(patch.fat.is_none());
    }
}
