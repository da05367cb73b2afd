//! Brand settings singleton.

use serde::{Deserialize, Serialize};

/// Storefront copy and contact details. Exactly one instance exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandSettings {
    pub brand_name: String,
    #[serde(default)]
    pub logo: Option<String>,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub hero_image: String,
    pub address: String,
    pub contact_phone: String,
    pub contact_email: String,
}

impl Default for BrandSettings {
    fn default() -> Self {
        crate::seed::default_settings()
    }
}
