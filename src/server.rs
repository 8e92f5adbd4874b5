use crate::config::AppConfig;
use crate::data;
use crate::render;
use crate::types::{
    Basemap, Category, DisplayOptions, FeatureCollection, HEATMAP_RADIUS_MAX, HEATMAP_RADIUS_MIN,
};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: AppConfig,
}

/// Query string produced by the sidebar form.
///
/// Browsers omit unchecked checkboxes entirely, so once the form has been
/// submitted (`applied` present) a missing checkbox means "off". Before that,
/// missing values fall back to the configured defaults. Out-of-range or
/// unparseable `radius` and `basemap` values never reject the request.
#[derive(Debug, Default, Deserialize)]
pub struct DisplayQuery {
    deaths: Option<String>,
    pumps: Option<String>,
    cluster: Option<String>,
    heatmap: Option<String>,
    radius: Option<String>,
    basemap: Option<String>,
    applied: Option<String>,
}

impl DisplayQuery {
    pub fn resolve(&self, defaults: &DisplayOptions) -> DisplayOptions {
        let applied = self.applied.is_some();
        let flag = |value: &Option<String>, default: bool| match value.as_deref() {
            Some(v) => !matches!(v, "0" | "false" | "off" | "no"),
            None if applied => false,
            None => default,
        };

        DisplayOptions {
            show_deaths: flag(&self.deaths, defaults.show_deaths),
            show_pumps: flag(&self.pumps, defaults.show_pumps),
            cluster: flag(&self.cluster, defaults.cluster),
            show_heatmap: flag(&self.heatmap, defaults.show_heatmap),
            heatmap_radius: self.radius().unwrap_or(defaults.heatmap_radius),
            basemap: self.basemap().unwrap_or(defaults.basemap),
        }
    }

    fn radius(&self) -> Option<u32> {
        let raw = self.radius.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => {
                let (min, max) = (f64::from(HEATMAP_RADIUS_MIN), f64::from(HEATMAP_RADIUS_MAX));
                Some(n.round().clamp(min, max) as u32)
            }
            _ => {
                tracing::debug!(radius = raw, "ignoring unparseable heatmap radius");
                None
            }
        }
    }

    fn basemap(&self) -> Option<Basemap> {
        let raw = self.basemap.as_deref()?;
        raw.parse()
            .map_err(|e: String| tracing::debug!(error = %e, "ignoring basemap"))
            .ok()
    }
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/features/:category", get(features_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState { config });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Serving cholera map on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Every request re-reads both datasets and re-renders the whole page.
async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DisplayQuery>,
) -> Response {
    let options = query.resolve(&state.config.display);
    tracing::debug!(?options, "render cycle");

    match render::render_cycle(&state.config, &options, true) {
        Ok(page) => Html(page).into_response(),
        Err(err) => {
            tracing::error!("render failed: {:#}", err);
            let body = format!(
                "<!DOCTYPE html><html><body><h1>Failed to render map</h1><pre>{}</pre></body></html>",
                render::escape_html(&format!("{:#}", err))
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
        }
    }
}

async fn features_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<geojson::FeatureCollection>, (StatusCode, Json<ApiError>)> {
    let category: Category = category
        .parse()
        .map_err(|error| (StatusCode::NOT_FOUND, Json(ApiError { error })))?;

    let path = match category {
        Category::Death => &state.config.input.deaths,
        Category::Pump => &state.config.input.pumps,
    };

    let collection = data::load_collection(path, category).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: e.to_string(),
            }),
        )
    })?;

    Ok(Json(to_geojson(&collection)))
}

fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|feature| {
            let mut properties = serde_json::Map::new();
            for (name, value) in &feature.attributes {
                properties.insert(name.clone(), serde_json::Value::String(value.clone()));
            }
            properties.insert(
                "category".to_string(),
                serde_json::Value::String(feature.category.slug().to_string()),
            );

            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                    feature.lon(),
                    feature.lat(),
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
