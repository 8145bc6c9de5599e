mod api;
mod crawler;
mod error;
mod extract;
mod position;
mod revenue;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use dotenv::dotenv;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(api::scrape_listings, api::run_audit, api::list_categories),
    components(schemas(
        api::ScrapeRequest,
        api::AuditRequest,
        api::ApiError,
        api::AuditResponse,
        api::AuditReport,
        api::CalculationOutcome,
        extract::Listing,
        revenue::CalculationDetails,
        revenue::CalculationInputs,
        revenue::CalculationDerived,
        revenue::CategoryStats,
    )),
    tags(
        (name = "maps", description = "Google Maps listing extraction and audit API")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let categories = revenue::load_category_table();
    info!(categories = categories.len(), "category table ready");
    let state = Arc::new(api::AppState { categories });

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/scrape", post(api::scrape_listings))
        .route("/audit", post(api::run_audit))
        .route("/categories", get(api::list_categories))
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
