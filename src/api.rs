use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::crawler;
use crate::error::AuditError;
use crate::extract::{self, Listing};
use crate::position::{self, Position};
use crate::revenue::{self, CalculationDetails, CategoryStats};

/// Category table is loaded once at startup and shared read-only; requests
/// carry no other state.
pub struct AppState {
    pub categories: BTreeMap<String, CategoryStats>,
}

#[derive(Deserialize, ToSchema)]
pub struct ScrapeRequest {
    pub query: String,
}

/// All fields optional at the serde layer so missing ones surface as a
/// structured validation error instead of a deserialization rejection.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    pub search_query: Option<String>,
    pub target_business_name: Option<String>,
    pub category: Option<String>,
    pub avg_dollar_amount: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuditResponse {
    pub success: bool,
    pub data: AuditReport,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub search_query: String,
    pub target_business: String,
    pub category: String,
    pub avg_dollar_amount: f64,
    /// 1-based rank, `"Not Found"`, or `"N/A (No target specified)"`.
    #[schema(value_type = Object)]
    pub position: Position,
    pub total_listings_scraped: usize,
    pub potential_monthly_revenue: Option<f64>,
    pub calculation_details: CalculationOutcome,
    pub listings_found: Vec<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(untagged)]
pub enum CalculationOutcome {
    Ready(CalculationDetails),
    Unavailable { error: String },
}

#[derive(Debug)]
struct AuditInputs {
    search_query: String,
    target_business_name: String,
    category: String,
    stats: CategoryStats,
    avg_dollar_amount: f64,
}

/// Extracts every listing for a free-text query.
#[utoipa::path(
    post,
    path = "/scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 200, description = "Listings in ranking order", body = [Listing]),
        (status = 422, description = "Validation failed", body = ApiError),
        (status = 502, description = "Scrape failed", body = ApiError),
        (status = 504, description = "Navigation timed out", body = ApiError),
    ),
    tag = "maps"
)]
pub async fn scrape_listings(
    Json(payload): Json<ScrapeRequest>,
) -> Result<Json<Vec<Listing>>, (StatusCode, Json<ApiError>)> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(error_response(AuditError::Validation(
            "A search query is required.".to_string(),
        )));
    }

    let html = crawler::render_listings_page(query)
        .await
        .map_err(error_response)?;
    let listings = extract::extract_listings(&html);
    Ok(Json(listings))
}

/// Runs the full audit: scrape, locate the target's rank, estimate revenue.
#[utoipa::path(
    post,
    path = "/audit",
    request_body = AuditRequest,
    responses(
        (status = 200, description = "Audit completed", body = AuditResponse),
        (status = 422, description = "Validation failed", body = ApiError),
        (status = 502, description = "Scrape failed", body = ApiError),
        (status = 504, description = "Navigation timed out", body = ApiError),
    ),
    tag = "maps"
)]
pub async fn run_audit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AuditRequest>,
) -> Result<Json<AuditResponse>, (StatusCode, Json<ApiError>)> {
    let inputs = validate_audit(&payload, &state.categories).map_err(error_response)?;
    info!(
        query = %inputs.search_query,
        target = %inputs.target_business_name,
        category = %inputs.category,
        "starting audit"
    );

    let html = crawler::render_listings_page(&inputs.search_query)
        .await
        .map_err(error_response)?;
    let listings = extract::extract_listings(&html);

    let target_position = position::find_position(&listings, &inputs.target_business_name);
    let (potential_monthly_revenue, calculation_details) =
        match revenue::estimate(&inputs.category, inputs.stats, inputs.avg_dollar_amount) {
            Ok(estimate) => (
                Some(estimate.monthly_revenue),
                CalculationOutcome::Ready(estimate.details),
            ),
            Err(reason) => {
                warn!(%reason, "revenue calculation unavailable");
                (
                    None,
                    CalculationOutcome::Unavailable {
                        error: reason.to_string(),
                    },
                )
            }
        };
    let listings_found: Vec<String> = listings
        .iter()
        .take(5)
        .map(|listing| listing.business_name.clone())
        .collect();

    info!(
        total = listings.len(),
        position = ?target_position,
        "audit complete"
    );

    Ok(Json(AuditResponse {
        success: true,
        data: AuditReport {
            search_query: inputs.search_query,
            target_business: inputs.target_business_name,
            category: inputs.category,
            avg_dollar_amount: inputs.avg_dollar_amount,
            position: target_position,
            total_listings_scraped: listings.len(),
            potential_monthly_revenue,
            calculation_details,
            listings_found,
        },
    }))
}

/// Category names the revenue table knows about, sorted.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Known categories", body = [String])),
    tag = "maps"
)]
pub async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.categories.keys().cloned().collect())
}

/// Everything here runs before any browser session is created; a rejected
/// request never costs a Chrome process.
fn validate_audit(
    request: &AuditRequest,
    categories: &BTreeMap<String, CategoryStats>,
) -> Result<AuditInputs, AuditError> {
    let search_query = request.search_query.as_deref().unwrap_or("").trim();
    let category = request.category.as_deref().unwrap_or("").trim();
    let Some(avg_dollar_amount) = request.avg_dollar_amount else {
        return Err(AuditError::Validation("All fields are required.".to_string()));
    };
    if search_query.is_empty() || category.is_empty() {
        return Err(AuditError::Validation("All fields are required.".to_string()));
    }
    if !avg_dollar_amount.is_finite() || avg_dollar_amount < 0.0 {
        return Err(AuditError::Validation(
            "Invalid Average Dollar Amount.".to_string(),
        ));
    }
    let Some(stats) = categories.get(category) else {
        return Err(AuditError::Validation(format!(
            "Category \"{category}\" not found."
        )));
    };

    Ok(AuditInputs {
        search_query: search_query.to_string(),
        // Blank target is allowed; the locator reports it as "no target
        // specified" instead of failing the request.
        target_business_name: request.target_business_name.clone().unwrap_or_default(),
        category: category.to_string(),
        stats: *stats,
        avg_dollar_amount,
    })
}

fn error_response(error: AuditError) -> (StatusCode, Json<ApiError>) {
    let status = match &error {
        AuditError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuditError::NavigationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AuditError::Unexpected(_) => StatusCode::BAD_GATEWAY,
    };
    match &error {
        AuditError::Validation(_) => warn!(%error, "request rejected"),
        _ => error!(%error, "request failed"),
    }
    (
        status,
        Json(ApiError {
            success: false,
            error: error.user_message(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        query: Option<&str>,
        target: Option<&str>,
        category: Option<&str>,
        amount: Option<f64>,
    ) -> AuditRequest {
        AuditRequest {
            search_query: query.map(str::to_string),
            target_business_name: target.map(str::to_string),
            category: category.map(str::to_string),
            avg_dollar_amount: amount,
        }
    }

    fn table() -> BTreeMap<String, CategoryStats> {
        revenue::default_category_table()
    }

    #[test]
    fn unknown_category_is_rejected_before_any_browser_work() {
        let req = request(
            Some("plumbers austin"),
            Some("Ace Plumbing"),
            Some("Spaceport"),
            Some(100.0),
        );
        let err = validate_audit(&req, &table()).unwrap_err();
        assert!(err.user_message().to_lowercase().contains("not found"));
    }

    #[test]
    fn negative_dollar_amount_is_rejected() {
        let req = request(
            Some("plumbers austin"),
            Some("Ace Plumbing"),
            Some("Plumber"),
            Some(-5.0),
        );
        let err = validate_audit(&req, &table()).unwrap_err();
        assert_eq!(err.user_message(), "Invalid Average Dollar Amount.");
    }

    #[test]
    fn non_finite_dollar_amount_is_rejected() {
        let req = request(Some("q"), None, Some("Plumber"), Some(f64::NAN));
        assert!(validate_audit(&req, &table()).is_err());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let req = request(None, Some("Ace"), Some("Plumber"), Some(100.0));
        let err = validate_audit(&req, &table()).unwrap_err();
        assert_eq!(err.user_message(), "All fields are required.");

        let req = request(Some("plumbers"), Some("Ace"), Some("Plumber"), None);
        assert!(validate_audit(&req, &table()).is_err());
    }

    #[test]
    fn blank_target_passes_validation() {
        let req = request(Some("plumbers austin"), None, Some("Plumber"), Some(100.0));
        let inputs = validate_audit(&req, &table()).unwrap();
        assert!(inputs.target_business_name.is_empty());

        let req = request(Some("plumbers austin"), Some("   "), Some("Plumber"), Some(100.0));
        assert!(validate_audit(&req, &table()).is_ok());
    }

    #[test]
    fn zero_dollar_amount_passes_validation() {
        let req = request(Some("plumbers"), Some("Ace"), Some("Plumber"), Some(0.0));
        assert!(validate_audit(&req, &table()).is_ok());
    }

    #[test]
    fn audit_report_serializes_with_wire_field_names() {
        let report = AuditReport {
            search_query: "plumbers austin".to_string(),
            target_business: "Ace Plumbing".to_string(),
            category: "Plumber".to_string(),
            avg_dollar_amount: 150.0,
            position: Position::NotFound,
            total_listings_scraped: 0,
            potential_monthly_revenue: Some(2880.0),
            calculation_details: CalculationOutcome::Unavailable {
                error: "nope".to_string(),
            },
            listings_found: vec![],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["searchQuery"], "plumbers austin");
        assert_eq!(value["targetBusiness"], "Ace Plumbing");
        assert_eq!(value["position"], "Not Found");
        assert_eq!(value["totalListingsScraped"], 0);
        assert_eq!(value["potentialMonthlyRevenue"], 2880.0);
        assert_eq!(value["calculationDetails"]["error"], "nope");
    }
}
