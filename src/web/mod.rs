// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web gallery for reviewing matched photos

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use minijinja::{context, Environment};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::db::{Database, DbStats, MatchedPhoto};
use crate::FinderError;

const GALLERY_TEMPLATE: &str = include_str!("gallery.html");

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    templates: Environment<'static>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> crate::Result<Self> {
        let mut templates = Environment::new();
        templates
            .add_template("gallery.html", GALLERY_TEMPLATE)
            .map_err(|e| FinderError::Config(format!("Invalid gallery template: {}", e)))?;
        Ok(Self { db, config, templates })
    }
}

impl IntoResponse for FinderError {
    fn into_response(self) -> Response {
        let status = match self {
            FinderError::PhotoNotFound(_) => StatusCode::NOT_FOUND,
            FinderError::DuplicateId(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, FinderError>;

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(gallery_page))
        .route("/api/photos", get(api_get_photos))
        .route("/api/photos/clear", post(api_clear_photos))
        .route("/api/photos/:id", delete(api_delete_photo))
        .route("/api/photos/:id/image", get(api_get_image))
        .route("/api/stats", get(api_get_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn gallery_page(State(state): State<Arc<AppState>>) -> ApiResult<Html<String>> {
    let photos = state.db.list_photos()?;
    let stats = state.db.stats()?;
    let html = state
        .templates
        .get_template("gallery.html")
        .and_then(|t| {
            t.render(context! {
                photos => photos,
                stats => stats,
                threshold => state.config.matching.threshold,
            })
        })
        .map_err(|e| FinderError::Config(format!("Template error: {}", e)))?;
    Ok(Html(html))
}

async fn api_get_photos(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MatchedPhoto>>> {
    Ok(Json(state.db.list_photos()?))
}

async fn api_get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let photo = state
        .db
        .get_photo(&id)?
        .ok_or(FinderError::PhotoNotFound(id))?;

    let mime = image::guess_format(&photo.blob)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, mime)], photo.blob).into_response())
}

async fn api_delete_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db.delete_photo(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(FinderError::PhotoNotFound(id))
    }
}

#[derive(Serialize)]
struct ClearResponse {
    removed: usize,
}

async fn api_clear_photos(State(state): State<Arc<AppState>>) -> ApiResult<Json<ClearResponse>> {
    let removed = state.db.clear()?;
    info!("Gallery cleared ({} photos)", removed);
    Ok(Json(ClearResponse { removed }))
}

async fn api_get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<DbStats>> {
    Ok(Json(state.db.stats()?))
}

/// Start the web server with config and database
pub async fn start_server(config: AppConfig, db: Database) -> crate::Result<()> {
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let state = Arc::new(AppState::new(db, config)?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gallery available at http://{}", addr);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::Descriptor;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use image::{Rgb, RgbImage};
    use tower::ServiceExt;

    fn png_bytes() -> Vec<u8> {
        let mut buffer = Vec::new();
        RgbImage::from_pixel(2, 2, Rgb([200, 10, 10]))
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn setup() -> (Router, Database, String) {
        let db = Database::in_memory().unwrap();
        let photo = db
            .add_photo("stage.png", "/event/stage.png", png_bytes(), Descriptor::new(vec![0.2, 0.1]), 81.25)
            .unwrap();
        let state = Arc::new(AppState::new(db.clone(), AppConfig::default()).unwrap());
        (create_router(state), db, photo.id)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_gallery_page_lists_photos() {
        let (app, _db, id) = setup();
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("stage.png"));
        assert!(html.contains(&format!("/api/photos/{}/image", id)));
    }

    #[tokio::test]
    async fn test_photo_list_omits_blobs() {
        let (app, _db, id) = setup();
        let response = app
            .oneshot(Request::get("/api/photos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json[0]["id"], id);
        assert_eq!(json[0]["filename"], "stage.png");
        assert!(json[0].get("blob").is_none());
    }

    #[tokio::test]
    async fn test_image_is_served_with_content_type() {
        let (app, _db, id) = setup();
        let response = app
            .oneshot(Request::get(format!("/api/photos/{}/image", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_unknown_photo_is_404() {
        let (app, _db, _id) = setup();
        let response = app
            .oneshot(Request::get("/api/photos/nope/image").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (app, db, id) = setup();
        db.add_photo("other.png", "/event/other.png", png_bytes(), Descriptor::new(vec![0.0, 0.0]), 66.0)
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::delete(format!("/api/photos/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(db.count().unwrap(), 1);

        let response = app
            .oneshot(Request::post("/api/photos/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"removed\":1"));
        assert_eq!(db.count().unwrap(), 0);
    }
}
