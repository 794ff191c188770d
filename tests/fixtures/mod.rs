//! Scraped price rows as the extraction service emits them, with the nightly
//! rate each should be stored as.

use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct PriceRowFixture {
    pub price: fn() -> Value,
    pub nights: i32,
    /// Nightly rate in BRL, two decimals.
    pub expected_nightly: &'static str,
    pub description: &'static str,
}

pub const PRICE_FIXTURES: &[PriceRowFixture] = &[
    PriceRowFixture {
        price: || json!(350),
        nights: 1,
        expected_nightly: "350.00",
        description: "plain integer",
    },
    PriceRowFixture {
        price: || json!("R$ 1.234,56"),
        nights: 1,
        expected_nightly: "1234.56",
        description: "Brazilian formatted total",
    },
    PriceRowFixture {
        price: || json!("R$ 2.100"),
        nights: 1,
        expected_nightly: "2100.00",
        description: "dot as thousands separator",
    },
    PriceRowFixture {
        price: || json!(899.9),
        nights: 1,
        expected_nightly: "899.90",
        description: "float with one decimal",
    },
    PriceRowFixture {
        price: || json!("R$ 1.500,00"),
        nights: 3,
        expected_nightly: "500.00",
        description: "three-night bundle total",
    },
];

/// Rows that must be rejected without failing the batch.
pub const REJECTED_PRICES: &[&str] = &["Indisponível", "", "R$ 0,00", "-120"];
