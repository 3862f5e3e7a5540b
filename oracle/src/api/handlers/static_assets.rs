//! HTTP handlers for static asset serving.

use axum::{
    body::Body,
    extract::Path,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::static_assets;

/// Serve an embedded asset under `/styles`.
///
/// Lookups go through the embedded asset table, never the filesystem, so a
/// path carrying `..` components simply fails to match and returns 404.
#[instrument]
pub async fn serve_style(Path(path): Path<String>) -> impl IntoResponse {
    let key = path.trim_start_matches('/');

    if let Some(content) = static_assets::Assets::get(key) {
        let mime = mime_guess::from_path(key).first_or_octet_stream();

        return Response::builder()
            .header(axum::http::header::CONTENT_TYPE, mime.as_ref())
            .header(axum::http::header::CACHE_CONTROL, "public, max-age=3600")
            .body(Body::from(content.data.into_owned()))
            .unwrap();
    }

    debug!("No embedded asset for {}", key);
    Response::builder().status(StatusCode::NOT_FOUND).body(Body::empty()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use axum_test::TestServer;

    fn create_test_router() -> Router {
        Router::new().route("/styles/{*path}", get(serve_style))
    }

    #[tokio::test]
    async fn serves_the_stylesheet_with_css_content_type() {
        let server = TestServer::new(create_test_router()).unwrap();

        let response = server.get("/styles/output.css").await;

        response.assert_status_ok();
        assert!(
            response
                .headers()
                .get("content-type")
                .map(|v| v.to_str().unwrap())
                .unwrap()
                .contains("css")
        );
        assert!(response.text().contains("--bg"));
    }

    #[tokio::test]
    async fn serves_theme_icons_as_svg() {
        let server = TestServer::new(create_test_router()).unwrap();

        for icon in ["moon.svg", "sun.svg"] {
            let response = server.get(&format!("/styles/{icon}")).await;
            response.assert_status_ok();
            assert_eq!(
                response.headers().get("content-type").map(|v| v.to_str().unwrap()),
                Some("image/svg+xml")
            );
        }
    }

    #[tokio::test]
    async fn missing_asset_is_404() {
        let server = TestServer::new(create_test_router()).unwrap();

        let response = server.get("/styles/nope.css").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_shaped_paths_are_404() {
        let server = TestServer::new(create_test_router()).unwrap();

        // Encoded dot-dot segments decode to "../..", which matches nothing
        // in the embedded table.
        let response = server.get("/styles/..%2F..%2FCargo.toml").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
