use serde::Deserialize;

use crate::error::ApiError;

/// A value that the lookup service may return either as a JSON number or as
/// a numeric string ("12", " 3.5 "). Coercion is explicit; anything that
/// does not parse to a finite number is a normalization failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberLike {
    Number(f64),
    Text(String),
}

impl NumberLike {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// One item from the lookup's `foods` array, limited to the fields the log
/// records. Everything is optional at the wire level; `normalize` decides
/// what is required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFoodItem {
    pub food_name: Option<String>,
    pub serving_qty: Option<NumberLike>,
    pub nf_calories: Option<NumberLike>,
    pub nf_total_fat: Option<NumberLike>,
    pub nf_protein: Option<NumberLike>,
    pub nf_total_carbohydrate: Option<NumberLike>,
}

/// Canonical nutrition record for a new entry, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub name: String,
    pub quantity: f64,
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub carbs: f64,
}

pub fn round_whole(value: f64) -> f64 {
    value.round()
}

pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn numeric_field(raw: &Option<NumberLike>, name: &str) -> Result<f64, ApiError> {
    let value = raw
        .as_ref()
        .ok_or_else(|| ApiError::Normalization(format!("missing field `{name}`")))?;
    let parsed = value
        .as_f64()
        .ok_or_else(|| ApiError::Normalization(format!("field `{name}` is not numeric")))?;
    if !parsed.is_finite() {
        return Err(ApiError::Normalization(format!(
            "field `{name}` is not finite"
        )));
    }
    Ok(parsed.max(0.0))
}

/// Convert a raw lookup item into a canonical entry.
///
/// Calories round to the nearest whole kcal, macros to one decimal gram.
/// Negative inputs clamp to zero.
pub fn normalize(raw: &RawFoodItem) -> Result<NewEntry, ApiError> {
    let name = raw
        .food_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::Normalization("missing field `food_name`".into()))?
        .to_string();

    Ok(NewEntry {
        name,
        quantity: numeric_field(&raw.serving_qty, "serving_qty")?,
        calories: round_whole(numeric_field(&raw.nf_calories, "nf_calories")?),
        fat: round_tenth(numeric_field(&raw.nf_total_fat, "nf_total_fat")?),
        protein: round_tenth(numeric_field(&raw.nf_protein, "nf_protein")?),
        carbs: round_tenth(numeric_field(&raw.nf_total_carbohydrate, "nf_total_carbohydrate")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(
        name: &str,
        qty: NumberLike,
        calories: NumberLike,
        fat: NumberLike,
        protein: NumberLike,
        carbs: NumberLike,
    ) -> RawFoodItem {
        RawFoodItem {
            food_name: Some(name.to_string()),
            serving_qty: Some(qty),
            nf_calories: Some(calories),
            nf_total_fat: Some(fat),
            nf_protein: Some(protein),
            nf_total_carbohydrate: Some(carbs),
        }
    }

    #[test]
    fn normalizes_plain_numbers() {
        let item = raw(
            "egg",
            NumberLike::Number(2.0),
            NumberLike::Number(143.5),
            NumberLike::Number(9.51),
            NumberLike::Number(12.56),
            NumberLike::Number(0.72),
        );
        let entry = normalize(&item).expect("normalize");
        assert_eq!(entry.name, "egg");
        assert_eq!(entry.quantity, 2.0);
        assert_eq!(entry.calories, 144.0);
        assert_eq!(entry.fat, 9.5);
        assert_eq!(entry.protein, 12.6);
        assert_eq!(entry.carbs, 0.7);
    }

    #[test]
    fn coerces_numeric_strings() {
        let item = raw(
            "oatmeal",
            NumberLike::Text("1".into()),
            NumberLike::Text(" 158.2 ".into()),
            NumberLike::Text("3.18".into()),
            NumberLike::Text("5.94".into()),
            NumberLike::Text("27.3".into()),
        );
        let entry = normalize(&item).expect("normalize");
        assert_eq!(entry.quantity, 1.0);
        assert_eq!(entry.calories, 158.0);
        assert_eq!(entry.fat, 3.2);
        assert_eq!(entry.protein, 5.9);
        assert_eq!(entry.carbs, 27.3);
    }

    #[test]
    fn rejects_non_numeric_strings() {
        let item = raw(
            "mystery",
            NumberLike::Number(1.0),
            NumberLike::Text("a lot".into()),
            NumberLike::Number(0.0),
            NumberLike::Number(0.0),
            NumberLike::Number(0.0),
        );
        let err = normalize(&item).unwrap_err();
        assert!(matches!(err, ApiError::Normalization(_)));
        assert!(err.to_string().contains("nf_calories"));
    }

    #[test]
    fn rejects_missing_fields() {
        let item = RawFoodItem {
            food_name: Some("water".into()),
            serving_qty: Some(NumberLike::Number(1.0)),
            nf_calories: Some(NumberLike::Number(0.0)),
            nf_total_fat: None,
            nf_protein: Some(NumberLike::Number(0.0)),
            nf_total_carbohydrate: Some(NumberLike::Number(0.0)),
        };
        let err = normalize(&item).unwrap_err();
        assert!(err.to_string().contains("nf_total_fat"));
    }

    #[test]
    fn rejects_blank_name() {
        let mut item = raw(
            "  ",
            NumberLike::Number(1.0),
            NumberLike::Number(100.0),
            NumberLike::Number(1.0),
            NumberLike::Number(1.0),
            NumberLike::Number(1.0),
        );
        assert!(normalize(&item).is_err());
        item.food_name = None;
        assert!(normalize(&item).is_err());
    }

    #[test]
    fn clamps_negative_values_to_zero() {
        let item = raw(
            "odd",
            NumberLike::Number(1.0),
            NumberLike::Number(-50.0),
            NumberLike::Text("-1.2".into()),
            NumberLike::Number(0.0),
            NumberLike::Number(0.0),
        );
        let entry = normalize(&item).expect("normalize");
        assert_eq!(entry.calories, 0.0);
        assert_eq!(entry.fat, 0.0);
    }

    #[test]
    fn deserializes_mixed_wire_shapes() {
        let item: RawFoodItem = serde_json::from_str(
            r#"{
                "food_name": "banana",
                "serving_qty": 1,
                "nf_calories": "105",
                "nf_total_fat": 0.39,
                "nf_protein": "1.29",
                "nf_total_carbohydrate": 26.9
            }"#,
        )
        .expect("deserialize");
        let entry = normalize(&item).expect("normalize");
        assert_eq!(entry.calories, 105.0);
        assert_eq!(entry.carbs, 26.9);
    }
}
