use std::collections::BTreeMap;
use std::env;
use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Share of map-pack clicks that turn into leads.
pub const CLICK_TO_LEAD_RATE: f64 = 0.10;
/// Share of leads that turn into paying customers.
pub const LEAD_TO_CUSTOMER_RATE: f64 = 0.16;

const DISCLAIMER: &str = "These are conservative estimates. Actual numbers vary based on \
     specific search terms, seasonality, and your business's conversion effectiveness.";

/// Monthly search demand profile for one business category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub search_volume: u32,
    pub avg_ctr_top3: f64,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CalculationUnavailable(pub String);

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculationInputs {
    pub search_volume: u32,
    pub avg_ctr_top3: f64,
    pub click_to_lead_rate: f64,
    pub lead_to_customer_rate: f64,
    pub avg_dollar_amount: f64,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculationDerived {
    pub potential_clicks: u64,
    pub potential_leads: u64,
    pub potential_customers: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CalculationDetails {
    pub inputs: CalculationInputs,
    pub derived: CalculationDerived,
    pub disclaimer: String,
}

#[derive(Debug, Clone)]
pub struct Estimate {
    pub monthly_revenue: f64,
    pub details: CalculationDetails,
}

/// Potential monthly revenue for ranking in the map pack:
/// volume × CTR × click-to-lead × lead-to-customer × average sale.
/// Deterministic and side-effect free; refuses to produce a number from
/// invalid inputs.
pub fn estimate(
    category: &str,
    stats: CategoryStats,
    avg_dollar_amount: f64,
) -> Result<Estimate, CalculationUnavailable> {
    if !stats.avg_ctr_top3.is_finite() || !(0.0..=1.0).contains(&stats.avg_ctr_top3) {
        return Err(CalculationUnavailable(format!(
            "Could not calculate revenue: invalid category data for \"{category}\"."
        )));
    }
    if !avg_dollar_amount.is_finite() || avg_dollar_amount <= 0.0 {
        return Err(CalculationUnavailable(
            "Could not calculate revenue: average dollar amount must be a positive number."
                .to_string(),
        ));
    }

    let potential_clicks = f64::from(stats.search_volume) * stats.avg_ctr_top3;
    let potential_leads = potential_clicks * CLICK_TO_LEAD_RATE;
    let potential_customers = potential_leads * LEAD_TO_CUSTOMER_RATE;
    let monthly_revenue = potential_customers * avg_dollar_amount;

    Ok(Estimate {
        monthly_revenue: round2(monthly_revenue),
        details: CalculationDetails {
            inputs: CalculationInputs {
                search_volume: stats.search_volume,
                avg_ctr_top3: stats.avg_ctr_top3,
                click_to_lead_rate: CLICK_TO_LEAD_RATE,
                lead_to_customer_rate: LEAD_TO_CUSTOMER_RATE,
                avg_dollar_amount,
                category: category.to_string(),
            },
            derived: CalculationDerived {
                potential_clicks: potential_clicks.round() as u64,
                potential_leads: potential_leads.round() as u64,
                potential_customers: round1(potential_customers),
            },
            disclaimer: DISCLAIMER.to_string(),
        },
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// (category, monthly search volume, average top-3 CTR)
const DEFAULT_CATEGORY_STATS: &[(&str, u32, f64)] = &[
    ("Restaurant", 15000, 0.35),
    ("Plumber", 2500, 0.48),
    ("HVAC", 1000, 0.47),
    ("Electrician", 600, 0.47),
    ("Roofer", 500, 0.48),
    ("Dentist", 2200, 0.42),
    ("Lawyer (General/PI)", 300, 0.40),
    ("Real Estate Agent", 1400, 0.38),
    ("Mechanic / Auto Repair", 500, 0.45),
    ("Hotel", 6000, 0.36),
    ("Landscaper / Lawn Care", 500, 0.45),
    ("Handyman", 400, 0.46),
    ("Pest Control", 400, 0.47),
    ("Gym / Fitness Center", 1000, 0.40),
    ("Hair Salon", 1400, 0.42),
    ("Pizza", 3500, 0.38),
    ("Car Wash", 700, 0.43),
    ("Veterinarian", 1100, 0.44),
    ("Chiropractor", 300, 0.43),
    ("Painter", 300, 0.45),
    ("Insurance Agent", 500, 0.40),
    ("Florist", 500, 0.42),
    ("Locksmith", 900, 0.50),
    ("Cleaning Service", 300, 0.44),
    ("Tire Shop", 850, 0.45),
    ("Pharmacy", 900, 0.40),
    ("Daycare / Childcare", 1500, 0.41),
    ("Waste Management", 1300, 0.46),
    ("Junk Removal", 400, 0.47),
];

pub fn default_category_table() -> BTreeMap<String, CategoryStats> {
    DEFAULT_CATEGORY_STATS
        .iter()
        .map(|&(name, search_volume, avg_ctr_top3)| {
            (
                name.to_string(),
                CategoryStats {
                    search_volume,
                    avg_ctr_top3,
                },
            )
        })
        .collect()
}

/// Loads the category table once at startup. `CATEGORY_DATA_PATH` may point
/// at a JSON file with the same shape as the built-in table; a missing or
/// unreadable file falls back to the defaults rather than failing startup.
pub fn load_category_table() -> BTreeMap<String, CategoryStats> {
    let Ok(path) = env::var("CATEGORY_DATA_PATH") else {
        return default_category_table();
    };

    match fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| Ok(serde_json::from_str::<BTreeMap<String, CategoryStats>>(&raw)?))
    {
        Ok(table) if !table.is_empty() => {
            info!(path, categories = table.len(), "loaded category table override");
            table
        }
        Ok(_) => {
            warn!(path, "category table override is empty, using built-in table");
            default_category_table()
        }
        Err(error) => {
            warn!(path, %error, "failed to load category table override, using built-in table");
            default_category_table()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plumber() -> CategoryStats {
        CategoryStats {
            search_volume: 2500,
            avg_ctr_top3: 0.48,
        }
    }

    #[test]
    fn plumber_at_150_yields_2880() {
        let estimate = estimate("Plumber", plumber(), 150.0).unwrap();
        assert!((estimate.monthly_revenue - 2880.0).abs() < 1e-9);
        assert_eq!(estimate.details.derived.potential_clicks, 1200);
        assert_eq!(estimate.details.derived.potential_leads, 120);
        assert!((estimate.details.derived.potential_customers - 19.2).abs() < 1e-9);
    }

    #[test]
    fn estimate_is_deterministic() {
        let a = estimate("Plumber", plumber(), 150.0).unwrap();
        let b = estimate("Plumber", plumber(), 150.0).unwrap();
        assert_eq!(a.monthly_revenue, b.monthly_revenue);
    }

    #[test]
    fn revenue_is_monotonic_in_dollar_amount() {
        let low = estimate("Plumber", plumber(), 150.0).unwrap();
        let high = estimate("Plumber", plumber(), 151.0).unwrap();
        assert!(high.monthly_revenue > low.monthly_revenue);
    }

    #[test]
    fn zero_dollar_amount_is_unavailable() {
        assert!(estimate("Plumber", plumber(), 0.0).is_err());
    }

    #[test]
    fn non_finite_dollar_amount_is_unavailable() {
        assert!(estimate("Plumber", plumber(), f64::NAN).is_err());
        assert!(estimate("Plumber", plumber(), f64::INFINITY).is_err());
    }

    #[test]
    fn out_of_range_ctr_is_unavailable() {
        let bad = CategoryStats {
            search_volume: 2500,
            avg_ctr_top3: 1.7,
        };
        let error = estimate("Plumber", bad, 150.0).unwrap_err();
        assert!(error.0.contains("Plumber"));
    }

    #[test]
    fn default_table_matches_shipped_categories() {
        let table = default_category_table();
        assert_eq!(table.len(), 29);
        let plumber = table.get("Plumber").unwrap();
        assert_eq!(plumber.search_volume, 2500);
        assert!((plumber.avg_ctr_top3 - 0.48).abs() < f64::EPSILON);
        // BTreeMap keeps the dropdown ordering sorted for the UI.
        let mut names: Vec<_> = table.keys().cloned().collect();
        names.sort();
        assert_eq!(names, table.keys().cloned().collect::<Vec<_>>());
    }
}
