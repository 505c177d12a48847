use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog entry as returned by the catalog API.
///
/// Only `id` and `name` are interpreted; every other field is kept verbatim in
/// `attributes` so a later fetch replaces the entry wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beer {
    pub id: u64,
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Beer {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Key used for this beer in the comments map
    pub fn comment_key(&self) -> String {
        self.id.to_string()
    }

    /// Parse a JSON array of beers from a response body
    pub fn list_from_json(body: &str) -> Result<Vec<Beer>, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_unknown_fields() {
        let json = r#"[{"id": 3, "name": "Pilsen Lager", "abv": 4.4, "tagline": "Unleash the Yeast"}]"#;
        let beers = Beer::list_from_json(json).unwrap();
        assert_eq!(beers.len(), 1);
        assert_eq!(beers[0].id, 3);
        assert_eq!(beers[0].name, "Pilsen Lager");
        assert_eq!(beers[0].attribute("abv"), Some(&Value::from(4.4)));

        let back = serde_json::to_value(&beers[0]).unwrap();
        assert_eq!(back["tagline"], "Unleash the Yeast");
        assert_eq!(back["id"], 3);
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(Beer::list_from_json(r#"{"id": 1, "name": "x"}"#).is_err());
        assert!(Beer::list_from_json(r#"[{"name": "no id"}]"#).is_err());
    }
}
