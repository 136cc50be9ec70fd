//! Geographic metadata attached to each input row.

use std::fmt;

use crate::mmdb::Value;

/// Continent and country annotation for an address range.
///
/// All four fields are always present; empty strings are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MetadataRecord {
    pub continent_code: String,
    pub continent_name: String,
    pub country_code: String,
    pub country_name: String,
}

impl MetadataRecord {
    /// Create a new record.
    pub fn new(
        continent_code: impl Into<String>,
        continent_name: impl Into<String>,
        country_code: impl Into<String>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            continent_code: continent_code.into(),
            continent_name: continent_name.into(),
            country_code: country_code.into(),
            country_name: country_name.into(),
        }
    }

    /// Encode as a GeoIP2-Country style map with names under `language`.
    pub fn to_value(&self, language: &str) -> Value {
        Value::Map(vec![
            (
                "continent".to_string(),
                Value::Map(vec![
                    ("code".to_string(), Value::from(self.continent_code.as_str())),
                    (
                        "names".to_string(),
                        Value::Map(vec![(
                            language.to_string(),
                            Value::from(self.continent_name.as_str()),
                        )]),
                    ),
                ]),
            ),
            (
                "country".to_string(),
                Value::Map(vec![
                    ("iso_code".to_string(), Value::from(self.country_code.as_str())),
                    (
                        "names".to_string(),
                        Value::Map(vec![(
                            language.to_string(),
                            Value::from(self.country_name.as_str()),
                        )]),
                    ),
                ]),
            ),
        ])
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "country={} ({}), continent={} ({})",
            self.country_code, self.country_name, self.continent_code, self.continent_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let record = MetadataRecord::new("EU", "Europe", "DE", "Germany");
        assert_eq!(
            record.to_string(),
            "country=DE (Germany), continent=EU (Europe)"
        );
    }

    #[test]
    fn test_to_value_layout() {
        let record = MetadataRecord::new("AS", "Asia", "JP", "Japan");
        let Value::Map(top) = record.to_value("en") else {
            panic!("expected map");
        };
        let keys: Vec<&str> = top.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["continent", "country"]);

        let Value::Map(country) = &top[1].1 else {
            panic!("expected country map");
        };
        assert_eq!(country[0], ("iso_code".to_string(), Value::from("JP")));
        assert_eq!(
            country[1].1,
            Value::Map(vec![("en".to_string(), Value::from("Japan"))])
        );
    }

    #[test]
    fn test_empty_fields_are_kept() {
        let record = MetadataRecord::default();
        let Value::Map(top) = record.to_value("en") else {
            panic!("expected map");
        };
        assert_eq!(top.len(), 2);
    }
}
