use crate::config::MapConfig;
use crate::types::SalesByCode;
use geojson::Feature;
use serde_json::Value;

/// Finds the ISO code and display name of a feature. Map sources disagree on which
/// property carries the code, so several names are tried in priority order.
#[derive(Debug, Clone)]
pub struct CountryResolver {
    code_attributes: Vec<String>,
    name_attribute: String,
}

impl Default for CountryResolver {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

impl CountryResolver {
    pub fn new(code_attributes: Vec<String>, name_attribute: impl Into<String>) -> Self {
        Self {
            code_attributes,
            name_attribute: name_attribute.into(),
        }
    }

    pub fn from_config(config: &MapConfig) -> Self {
        Self::new(config.code_attributes.clone(), config.name_attribute.clone())
    }

    /// Upper-cased code from the first present, non-empty attribute; empty when none match.
    pub fn resolve_code(&self, feature: &Feature) -> String {
        self.code_attributes
            .iter()
            .find_map(|name| property_str(feature, name))
            .map(str::to_uppercase)
            .unwrap_or_default()
    }

    pub fn resolve_display_name(&self, feature: &Feature) -> String {
        property_str(feature, &self.name_attribute)
            .unwrap_or_default()
            .to_string()
    }
}

pub fn resolve_sales(code: &str, sales: &SalesByCode) -> f64 {
    sales.get(code).copied().unwrap_or(0.0)
}

fn property_str<'a>(feature: &'a Feature, name: &str) -> Option<&'a str> {
    match feature.properties.as_ref()?.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(props: Value) -> Feature {
        Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: props.as_object().cloned(),
            foreign_members: None,
        }
    }

    #[test]
    fn primary_attribute_wins_over_fallback() {
        let resolver = CountryResolver::default();
        let f = feature(json!({"adm0_a3_ar": "ukr", "ISO_A3": "RUS"}));
        assert_eq!(resolver.resolve_code(&f), "UKR");
    }

    #[test]
    fn falls_back_when_primary_missing_or_empty() {
        let resolver = CountryResolver::default();
        assert_eq!(resolver.resolve_code(&feature(json!({"ISO_A3": "fra"}))), "FRA");
        assert_eq!(
            resolver.resolve_code(&feature(json!({"adm0_a3_ar": "", "ISO_A3": "DEU"}))),
            "DEU"
        );
        assert_eq!(
            resolver.resolve_code(&feature(json!({"adm0_a3_ar": null, "ISO_A3": "ITA"}))),
            "ITA"
        );
    }

    #[test]
    fn unresolvable_feature_has_empty_code() {
        let resolver = CountryResolver::default();
        assert_eq!(resolver.resolve_code(&feature(json!({"name": "Atlantis"}))), "");
        assert_eq!(resolver.resolve_code(&feature(json!({"ISO_A3": 840}))), "");

        let bare = Feature {
            properties: None,
            ..feature(json!({}))
        };
        assert_eq!(resolver.resolve_code(&bare), "");
        assert_eq!(resolver.resolve_display_name(&bare), "");
    }

    #[test]
    fn custom_attribute_order() {
        let resolver = CountryResolver::new(vec!["iso".into(), "ISO_A3".into()], "NAME");
        let f = feature(json!({"iso": "nor", "ISO_A3": "SWE", "NAME": "Norway"}));
        assert_eq!(resolver.resolve_code(&f), "NOR");
        assert_eq!(resolver.resolve_display_name(&f), "Norway");
    }

    #[test]
    fn unknown_code_has_zero_sales() {
        let empty = SalesByCode::new();
        assert_eq!(resolve_sales("USA", &empty), 0.0);
        assert_eq!(resolve_sales("", &empty), 0.0);

        let sales = SalesByCode::from([("USA".to_string(), 42.0)]);
        assert_eq!(resolve_sales("USA", &sales), 42.0);
    }
}
