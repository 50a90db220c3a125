use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One stored row of the `sales` table. Columns beyond the three known ones are
/// carried in `extra` so the API can pass them through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(default)]
    pub country_code: Option<String>,
    pub year: i32,
    #[serde(default)]
    pub sales: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SalesRecord {
    pub fn new(country_code: &str, year: i32, sales: impl Into<Value>) -> Self {
        Self {
            country_code: Some(country_code.to_string()),
            year,
            sales: sales.into(),
            extra: Map::new(),
        }
    }

    /// Sales as a number. Missing, null and non-numeric values count as zero.
    pub fn sales_value(&self) -> f64 {
        coerce_number(&self.sales)
    }

    /// Upper-cased country code, `None` when the row carries none.
    pub fn normalized_code(&self) -> Option<String> {
        self.country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    }
}

fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Normalized country code -> sales for a single year.
pub type SalesByCode = HashMap<String, f64>;

pub fn sales_by_code(records: &[SalesRecord]) -> SalesByCode {
    let mut map = SalesByCode::with_capacity(records.len());
    for record in records {
        if let Some(code) = record.normalized_code() {
            // Later rows for the same code override earlier ones.
            map.insert(code, record.sales_value());
        }
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyTotal {
    pub year: i32,
    pub total: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sales_coercion() {
        let mut record = SalesRecord::new("USA", 2023, 1_200_000);
        assert_eq!(record.sales_value(), 1_200_000.0);

        record.sales = json!("2500");
        assert_eq!(record.sales_value(), 2500.0);

        record.sales = json!("lots");
        assert_eq!(record.sales_value(), 0.0);

        record.sales = Value::Null;
        assert_eq!(record.sales_value(), 0.0);

        record.sales = json!(true);
        assert_eq!(record.sales_value(), 0.0);
    }

    #[test]
    fn extra_columns_round_trip_through_json() {
        let row = json!({"id": 7, "country_code": "FRA", "year": 2022, "sales": 10, "brand": "x"});
        let record: SalesRecord = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(record.extra.get("brand"), Some(&json!("x")));
        assert_eq!(serde_json::to_value(&record).unwrap(), row);
    }

    #[test]
    fn missing_sales_field_deserializes_as_zero() {
        let record: SalesRecord =
            serde_json::from_value(json!({"country_code": "DEU", "year": 2020})).unwrap();
        assert_eq!(record.sales_value(), 0.0);
    }

    #[test]
    fn mapping_normalizes_codes_and_last_write_wins() {
        let records = vec![
            SalesRecord::new("usa", 2024, 10),
            SalesRecord::new("DEU", 2024, 20),
            SalesRecord::new("USA", 2024, 50),
            SalesRecord {
                country_code: None,
                ..SalesRecord::new("", 2024, 99)
            },
            SalesRecord::new("  ", 2024, 98),
        ];
        let map = sales_by_code(&records);
        assert_eq!(map.len(), 2);
        assert_eq!(map["USA"], 50.0);
        assert_eq!(map["DEU"], 20.0);
    }
}
