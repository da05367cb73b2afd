//! Default catalog and brand settings.
//!
//! Used to bootstrap an empty backend and as the fallback when the backend
//! cannot be reached.

use crate::models::{BrandSettings, Product, ProductSpecifications};
use crate::types::{Price, ProductId};

const IMG: &str = "https://images.unsplash.com/photo-";
const IMG_PARAMS: &str = "?auto=format&fit=crop&q=80&w=800";

const TURMERIC: &str = "1615485290382-441e4d049cb5";
const CHILLI: &str = "1599488615731-7e5c2823ff28";
const CUMIN: &str = "1509358271058-acd22cc93898";
const SPICE_BOWLS: &str = "1596040033229-a0b8b5b6f197";
const GARAM: &str = "1532336414038-cf1905044314";
const CASHEW: &str = "1558961363-fa8fdf82db35";
const PICKLE: &str = "1589135398309-0d44f5927613";

struct SeedProduct {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    description: &'static str,
    rupees: i64,
    moq: u32,
    images: &'static [&'static str],
    origin: &'static str,
    spec_origin: &'static str,
    grade: &'static str,
    shelf_life: &'static str,
    packaging: &'static str,
    certification: &'static str,
    features: [&'static str; 6],
}

const CATALOG: [SeedProduct; 7] = [
    SeedProduct {
        id: "1",
        name: "Turmeric Powder (Haldi)",
        category: "Ground Spices",
        description: "Highly potent curcumin content, sourced from the finest farms of Sangli.",
        rupees: 180,
        moq: 50,
        images: &[TURMERIC, CHILLI, CUMIN],
        origin: "Sangli, Maharashtra",
        spec_origin: "Sangli, Maharashtra",
        grade: "Premium A-Grade",
        shelf_life: "12 months from packaging",
        packaging: "Food-grade poly bags in corrugated boxes",
        certification: "FSSAI Certified, ISO 22000",
        features: [
            "High curcumin content (3-5%)",
            "Natural golden-yellow color",
            "No artificial additives",
            "Direct farm sourcing",
            "Lab tested for purity",
            "Authentic aroma and flavor",
        ],
    },
    SeedProduct {
        id: "2",
        name: "Red Chilli Powder (Lal Mirch)",
        category: "Ground Spices",
        description: "Extra hot and vibrant red, perfect for authentic Indian curries.",
        rupees: 320,
        moq: 25,
        images: &[CHILLI, TURMERIC, SPICE_BOWLS],
        origin: "Guntur, Andhra Pradesh",
        spec_origin: "Guntur, Andhra Pradesh",
        grade: "Super Hot Premium",
        shelf_life: "18 months from packaging",
        packaging: "Triple-layer moisture-proof bags",
        certification: "Export Quality, Spice Board Certified",
        features: [
            "Intense heat level",
            "Vibrant natural red color",
            "Rich capsaicin content",
            "Stone-ground for fine texture",
            "No color additives",
            "Perfect for commercial use",
        ],
    },
    SeedProduct {
        id: "3",
        name: "Cumin Seeds (Jeera)",
        category: "Whole Spices",
        description: "Aromatic and earthy seeds from the heart of Unjha, Gujarat.",
        rupees: 450,
        moq: 10,
        images: &[CUMIN, CHILLI, SPICE_BOWLS],
        origin: "Unjha, Gujarat",
        spec_origin: "Unjha, Gujarat (Asia's largest cumin market)",
        grade: "Singapore Quality",
        shelf_life: "24 months in proper storage",
        packaging: "Jute bags lined with food-grade poly",
        certification: "Agmark Certified, Export Quality",
        features: [
            "Bold, uniform seeds",
            "Strong aromatic profile",
            "Low moisture content",
            "Machine cleaned & sorted",
            "99% purity level",
            "Ideal for tempering & grinding",
        ],
    },
    SeedProduct {
        id: "4",
        name: "Garam Masala",
        category: "Blended Spices",
        description: "Our secret blend of 12 premium spices for the ultimate flavor profile.",
        rupees: 600,
        moq: 5,
        images: &[GARAM, TURMERIC, CHILLI],
        origin: "Proprietary Blend",
        spec_origin: "Multi-origin premium ingredients",
        grade: "Restaurant Quality Blend",
        shelf_life: "9 months from blending",
        packaging: "Nitrogen-flushed aluminum pouches",
        certification: "FSSAI Licensed, Quality Assured",
        features: [
            "Proprietary 12-spice blend",
            "Freshly roasted & ground",
            "Balanced heat & aroma",
            "No salt or fillers",
            "Restaurant preferred",
            "Consistent flavor profile",
        ],
    },
    SeedProduct {
        id: "5",
        name: "Green Cardamom (Elaichi)",
        category: "Whole Spices",
        description: "Premium bold 8mm pods from the Idukki hills of Kerala.",
        rupees: 2400,
        moq: 2,
        images: &[CHILLI, CUMIN, TURMERIC],
        origin: "Idukki, Kerala",
        spec_origin: "Idukki Hills, Kerala (Premium growing region)",
        grade: "8mm Bold Premium",
        shelf_life: "18 months in airtight conditions",
        packaging: "Vacuum-sealed poly bags",
        certification: "GI Tagged, Organic Certified",
        features: [
            "Bold 8mm+ pod size",
            "Intense natural aroma",
            "Green color retention",
            "High essential oil content",
            "Handpicked selection",
            "Premium export quality",
        ],
    },
    SeedProduct {
        id: "6",
        name: "Premium Cashews (Kaju)",
        category: "Nuts",
        description: "W240 grade jumbo cashews, perfectly roasted and crunchy.",
        rupees: 950,
        moq: 5,
        images: &[CASHEW],
        origin: "Konkan, Maharashtra",
        spec_origin: "Konkan, Maharashtra",
        grade: "W240 Jumbo",
        shelf_life: "6 months from packaging",
        packaging: "Vacuum-sealed pouches",
        certification: "FSSAI Certified",
        features: [
            "Jumbo size (W240)",
            "Uniform white color",
            "Crunchy texture",
            "Rich in healthy fats",
            "No preservatives",
            "Perfect for snacking or cooking",
        ],
    },
    SeedProduct {
        id: "7",
        name: "Spicy Mango Pickle",
        category: "Indian Pickles",
        description: "Traditional home-style mango pickle made with cold-pressed mustard oil.",
        rupees: 280,
        moq: 2,
        images: &[PICKLE],
        origin: "Varanasi, Uttar Pradesh",
        spec_origin: "Varanasi, Uttar Pradesh",
        grade: "Premium Traditional",
        shelf_life: "18 months from packaging",
        packaging: "Glass jars / Food-grade plastic jars",
        certification: "FSSAI Licensed",
        features: [
            "Traditional recipe",
            "Cold-pressed mustard oil",
            "Hand-cut mango pieces",
            "Sun-dried spices",
            "No artificial colors",
            "Authentic Banarasi flavor",
        ],
    },
];

fn image_url(photo: &str) -> String {
    format!("{IMG}{photo}{IMG_PARAMS}")
}

impl From<&SeedProduct> for Product {
    fn from(seed: &SeedProduct) -> Self {
        let images: Vec<String> = seed.images.iter().map(|p| image_url(p)).collect();
        Self {
            id: ProductId::new(seed.id),
            name: seed.name.to_owned(),
            category: seed.category.to_owned(),
            description: seed.description.to_owned(),
            price: Price::from_rupees(seed.rupees),
            image: images.first().cloned().unwrap_or_default(),
            images,
            unit: "kg".to_owned(),
            moq: seed.moq,
            is_active: true,
            specifications: Some(ProductSpecifications {
                origin: Some(seed.spec_origin.to_owned()),
                grade: Some(seed.grade.to_owned()),
                shelf_life: Some(seed.shelf_life.to_owned()),
                packaging: Some(seed.packaging.to_owned()),
                certification: Some(seed.certification.to_owned()),
            }),
            features: seed.features.iter().map(|f| (*f).to_owned()).collect(),
            origin: Some(seed.origin.to_owned()),
        }
    }
}

/// The built-in starter catalog, in display order.
#[must_use]
pub fn default_catalog() -> Vec<Product> {
    CATALOG.iter().map(Product::from).collect()
}

/// Brand settings used until an admin saves their own.
#[must_use]
pub fn default_settings() -> BrandSettings {
    BrandSettings {
        brand_name: "DDH Masale".to_owned(),
        logo: None,
        hero_title: "The Soul of Indian Cuisine".to_owned(),
        hero_subtitle: "DDH Masale delivers high-curcumin turmeric, premium whole spices, and \
                        authentic blends to wholesalers and food creators worldwide."
            .to_owned(),
        hero_image: "https://images.unsplash.com/photo-1596040033229-a9821ebd058d\
                     ?auto=format&fit=crop&q=80&w=2000"
            .to_owned(),
        address: "Sangli, Maharashtra, India".to_owned(),
        contact_phone: "+91 98765 43210".to_owned(),
        contact_email: "sales@ddhmasale.com".to_owned(),
    }
}
