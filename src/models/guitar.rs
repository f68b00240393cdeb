use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A guitar as held by the catalog. This service only ever reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guitar {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub guitar_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_wood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_wood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neck_wood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fretboard_wood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickups: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electronics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuners: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_frets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nut_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neck_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_gauge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_of_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_diagram: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_markers: Option<Vec<Value>>,
    #[serde(default)]
    pub images: Vec<GuitarImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_info: Option<PrivateInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuitarImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_value: Option<f64>,
}

impl Guitar {
    pub fn image(&self, image_id: &str) -> Option<&GuitarImage> {
        self.images.iter().find(|image| image.id == image_id)
    }

    pub fn image_ids(&self) -> Vec<String> {
        self.images.iter().map(|image| image.id.clone()).collect()
    }

    /// Primary image if one is flagged, otherwise the first.
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|image| image.is_primary)
            .or_else(|| self.images.first())
            .map(|image| image.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuitarSummary {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub thumbnail: Option<String>,
}

impl From<&Guitar> for GuitarSummary {
    fn from(guitar: &Guitar) -> Self {
        Self {
            brand: guitar.brand.clone(),
            model: guitar.model.clone(),
            year: guitar.year,
            thumbnail: guitar.thumbnail_url().map(str::to_string),
        }
    }
}
