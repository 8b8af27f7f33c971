//! HTTP service exposing the aggregate listing.
//!
//! `GET /api/kino/:city` returns every cinema as JSON. The `city` segment is
//! logged but does not filter the result. Older clients ask for `text/html`;
//! they get the same JSON body labelled as HTML.

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use kino_core::{Config, Error, Orchestrator};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "30";

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Execute the serve command
pub async fn execute(config: &Config, bind: SocketAddr) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(config)?);
    let app = router(orchestrator);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("kino listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Routes of the listing service.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/kino/:city", get(cinemas_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { orchestrator })
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn cinemas_handler(
    State(state): State<AppState>,
    Path(city): Path<String>,
    headers: HeaderMap,
) -> Response {
    info!(city = %city, "listing requested");

    let listing = match state.orchestrator.get_all_cinemas().await {
        Ok(listing) => listing,
        Err(err) => return ApiError(err).into_response(),
    };

    match serde_json::to_vec(&*listing) {
        Ok(body) => {
            let content_type = if prefers_html(&headers) {
                HTML_CONTENT_TYPE
            } else {
                JSON_CONTENT_TYPE
            };
            (
                [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
                body,
            )
                .into_response()
        },
        Err(err) => ApiError(Error::from(err)).into_response(),
    }
}

/// True when the client names `text/html` and not `application/json`.
fn prefers_html(headers: &HeaderMap) -> bool {
    let accept = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
        .to_ascii_lowercase();

    accept.contains("text/html") && !accept.contains("application/json")
}

struct ApiError(Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Network(_) if self.0.is_recoverable() => StatusCode::SERVICE_UNAVAILABLE,
            Error::Network(_)
            | Error::NotFound(_)
            | Error::InvalidUrl(_)
            | Error::Structure { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(category = self.0.category(), "listing failed: {}", self.0);

        let body = json!({
            "error": self.0.to_string(),
            "category": self.0.category(),
        });
        let mut response = (status, Json(body)).into_response();
        if self.0.is_recoverable() {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(RETRY_AFTER_SECS),
            );
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use kino_core::{PageSource, Region};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    const LISTING: &str = r#"<div class="cinema"><div><h2>Kino Aero</h2></div><div><table>
        <tr><th><a href="/film/1-vlny/">Vlny</a><span>(2024)</span></th>
        <td class="flags"><span>OV</span></td><td>18:30</td></tr>
        </table></div></div>"#;

    struct Pages {
        pages: HashMap<&'static str, &'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl PageSource for Pages {
        async fn fetch_text(&self, url: &str) -> kino_core::Result<String> {
            tokio::time::sleep(self.delay).await;
            self.pages
                .get(url)
                .map(|body| (*body).to_string())
                .ok_or_else(|| Error::NotFound(url.to_string()))
        }
    }

    fn app_with(pages: HashMap<&'static str, &'static str>, delay: Duration) -> Router {
        let mut config = Config::default();
        config.site.regions = vec![Region::new("cz", "http://list/cz")];
        config.pipeline.deadline_secs = 1;

        let source = Arc::new(Pages { pages, delay });
        router(Arc::new(Orchestrator::new(&config, source).unwrap()))
    }

    fn app() -> Router {
        app_with(
            HashMap::from([
                ("http://list/cz", LISTING),
                ("http://csfd.cz/film/1-vlny/", r#"<h2 class="average">85%</h2>"#),
            ]),
            Duration::ZERO,
        )
    }

    async fn get(app: Router, uri: &str, accept: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn content_type(response: &Response) -> &str {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = get(app(), "/health", None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_listing_is_served_as_json() {
        let response = get(app(), "/api/kino/praha", Some("application/json")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), JSON_CONTENT_TYPE);
        assert_eq!(
            json_body(response).await,
            json!([{
                "CinemaName": "Kino Aero",
                "Movies": [{
                    "MovieName": "Vlny (2024)",
                    "Times": ["18:30"],
                    "Url": "http://csfd.cz/film/1-vlny/",
                    "Rating": 85,
                    "Flags": ["OV"],
                }],
            }])
        );
    }

    #[tokio::test]
    async fn test_city_does_not_filter() {
        let brno = json_body(get(app(), "/api/kino/brno", None).await).await;
        let praha = json_body(get(app(), "/api/kino/praha", None).await).await;

        assert_eq!(brno, praha);
    }

    #[tokio::test]
    async fn test_html_clients_get_json_labelled_as_html() {
        let response = get(
            app(),
            "/api/kino/praha",
            Some("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), HTML_CONTENT_TYPE);
        assert_eq!(json_body(response).await[0]["CinemaName"], "Kino Aero");
    }

    #[test]
    fn test_prefers_html() {
        let mut headers = HeaderMap::new();
        assert!(!prefers_html(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        assert!(prefers_html(&headers));

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html, application/json"),
        );
        assert!(!prefers_html(&headers));
    }

    #[tokio::test]
    async fn test_structure_failure_is_bad_gateway() {
        let app = app_with(
            HashMap::from([(
                "http://list/cz",
                r#"<div class="cinema"><div><p>no heading</p></div></div>"#,
            )]),
            Duration::ZERO,
        );

        let response = get(app, "/api/kino/praha", None).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        assert_eq!(json_body(response).await["category"], "structure");
    }

    #[tokio::test]
    async fn test_deadline_is_gateway_timeout() {
        let app = app_with(HashMap::new(), Duration::from_millis(1500));

        let response = get(app, "/api/kino/praha", None).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);
        let body = json_body(response).await;
        assert_eq!(body["category"], "timeout");
        assert!(body["error"].as_str().unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn test_unreachable_site_is_service_unavailable() {
        let mut config = Config::default();
        config.site.regions = vec![Region::new("cz", "http://127.0.0.1:1/kino/")];
        let app = router(Arc::new(Orchestrator::from_config(&config).unwrap()));

        let response = get(app, "/api/kino/praha", None).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);
        assert_eq!(json_body(response).await["category"], "network");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(Error::Config("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(Error::NotFound("gone".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
