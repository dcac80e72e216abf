use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The one-time profile setup form submitted after the first login.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterestForm {
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    /// Height in centimetres
    pub height: u32,
    /// Weight in kilograms
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}
