use serde_json::Value;

/// A single geometric record with named properties. Property order is the
/// source file's field order and is preserved for display.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<geo::Geometry>,
    pub properties: Vec<(String, Value)>,
}

impl Feature {
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(property_name, _)| property_name == name)
            .map(|(_, value)| value)
    }
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: Some(value),
            properties: Vec::new(),
        }
    }
}
