use serde::Serialize;

use crate::logs::repo::LogEntry;
use crate::nutrition::normalize::{round_tenth, round_whole};

pub const KCAL_PER_G_FAT: f64 = 9.0;
pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_CARBS: f64 = 4.0;

/// Nutrient sums across a log's entries, in kcal / grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbs: f64,
}

/// Each macro's share of total calories, as a percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroSplit {
    pub fat: f64,
    pub protein: f64,
    pub carbs: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LogSummary {
    pub total: NutrientTotals,
    pub macros: MacroSplit,
}

/// Recompute a log's summary from its current entry set.
///
/// Pure function of the input; called after every mutation so the summary
/// can never drift from the stored entries. The three percentages round
/// independently and may sum slightly past 100.
pub fn summarize(entries: &[LogEntry]) -> LogSummary {
    let mut total = NutrientTotals::default();
    for entry in entries {
        total.calories += entry.calories;
        total.fat += entry.fat;
        total.protein += entry.protein;
        total.carbs += entry.carbs;
    }
    total.calories = round_whole(total.calories);
    total.fat = round_tenth(total.fat);
    total.protein = round_tenth(total.protein);
    total.carbs = round_tenth(total.carbs);

    let macros = if total.calories > 0.0 {
        MacroSplit {
            fat: percentage(total.fat * KCAL_PER_G_FAT, total.calories),
            protein: percentage(total.protein * KCAL_PER_G_PROTEIN, total.calories),
            carbs: percentage(total.carbs * KCAL_PER_G_CARBS, total.calories),
        }
    } else {
        MacroSplit::default()
    };

    LogSummary { total, macros }
}

fn percentage(kcal: f64, total_kcal: f64) -> f64 {
    round_tenth(kcal / total_kcal * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn entry(name: &str, quantity: f64, calories: f64, fat: f64, protein: f64, carbs: f64) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            log_id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            calories,
            fat,
            protein,
            carbs,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn empty_log_is_all_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary, LogSummary::default());
    }

    #[test]
    fn single_entry_percentages() {
        // 140 kcal: fat 90 kcal -> 64.3%, protein 48 kcal -> 34.3%, carbs 4 kcal -> 2.9%
        let entries = vec![entry("Egg", 2.0, 140.0, 10.0, 12.0, 1.0)];
        let summary = summarize(&entries);
        assert_eq!(summary.total.calories, 140.0);
        assert_eq!(summary.total.fat, 10.0);
        assert_eq!(summary.total.protein, 12.0);
        assert_eq!(summary.total.carbs, 1.0);
        assert_eq!(summary.macros.fat, 64.3);
        assert_eq!(summary.macros.protein, 34.3);
        assert_eq!(summary.macros.carbs, 2.9);
    }

    #[test]
    fn calories_without_macro_grams_yield_zero_percentages() {
        // Percentages reflect macro contribution, not unaccounted energy.
        let entries = vec![
            entry("broth", 1.0, 100.0, 0.0, 0.0, 0.0),
            entry("broth", 1.0, 100.0, 0.0, 0.0, 0.0),
        ];
        let summary = summarize(&entries);
        assert_eq!(summary.total.calories, 200.0);
        assert_eq!(summary.macros, MacroSplit::default());
    }

    #[test]
    fn totals_sum_across_entries() {
        let entries = vec![
            entry("toast", 2.0, 160.0, 2.0, 6.0, 28.0),
            entry("butter", 1.0, 102.0, 11.5, 0.1, 0.0),
            entry("coffee", 1.0, 2.0, 0.0, 0.3, 0.0),
        ];
        let summary = summarize(&entries);
        assert_eq!(summary.total.calories, 264.0);
        assert_eq!(summary.total.fat, 13.5);
        assert_eq!(summary.total.protein, 6.4);
        assert_eq!(summary.total.carbs, 28.0);
    }

    #[test]
    fn summary_is_deterministic() {
        let entries = vec![entry("apple", 1.0, 95.0, 0.3, 0.5, 25.1)];
        assert_eq!(summarize(&entries), summarize(&entries));
    }
}
