use serde::Serialize;
use serde_json::Value;

/// The user's structured CV data. Free-form nested JSON; the controller only
/// checks that it parses and forwards it untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProfileDocument(Value);

impl ProfileDocument {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(ProfileDocument)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
