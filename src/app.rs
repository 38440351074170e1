use std::net::SocketAddr;

use axum::{http::HeaderValue, routing::get, Json, Router};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::registration;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);
    let assets = ServeDir::new(&state.config.static_dir);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(registration::router())
                .route("/", get(index))
                .route("/health", get(health)),
        )
        .fallback_service(assets)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Registration API Server",
        "endpoints": {
            "health": "/api/health",
            "registration": "/api/registration",
            "users": "/api/registration",
            "user": "/api/registration/:id",
            "stats": "/api/registration/stats",
            "excel": "/api/registration/excel"
        }
    }))
}

async fn health() -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "status": "OK",
        "message": "Server is running",
        "timestamp": timestamp
    }))
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res: Response = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn ada() -> Value {
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": "secret1",
            "dateOfBirth": "1815-12-10",
            "termsAccepted": true
        })
    }

    async fn counts(app: &Router) -> (i64, i64) {
        let (_, body) = send(app, get("/api/registration/stats")).await;
        (
            body["stats"]["mongoDB"]["totalRegistrations"].as_i64().unwrap(),
            body["stats"]["excelFile"]["totalRegistrations"].as_i64().unwrap(),
        )
    }

    fn test_app(dir: &tempfile::TempDir) -> Router {
        build_app(AppState::fake(dir.path().join("registrations.xlsx")))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(&test_app(&dir), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn stats_on_empty_system_are_zero() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(&test_app(&dir), get("/api/registration/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["stats"]["mongoDB"]["totalRegistrations"], 0);
        assert_eq!(body["stats"]["excelFile"]["totalRegistrations"], 0);
        assert_eq!(body["stats"]["excelFile"]["fileSize"], 0);
        assert!(body["stats"]["excelFile"]["lastModified"].is_null());
    }

    #[tokio::test]
    async fn register_creates_one_record_in_each_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(&app, post_json("/api/registration", &ada())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["user"]["fullName"], "Ada Lovelace");
        assert_eq!(body["user"]["gender"], "prefer-not-to-say");
        assert!(body["user"].get("password").is_none());
        assert!(body["user"].get("passwordHash").is_none());
        assert!(body["excelFile"].as_str().unwrap().ends_with("registrations.xlsx"));

        assert_eq!(counts(&app).await, (1, 1));

        let (_, sheet) = send(&app, get("/api/registration/excel")).await;
        assert_eq!(sheet["count"], 1);
        let row = &sheet["registrations"][0];
        assert_eq!(row["First Name"], "Ada");
        assert_eq!(row["Email"], "ada@example.com");
        assert_eq!(row["Date of Birth"], "1815-12-10");
        assert_eq!(row["Country"], "United States");
        assert_eq!(row["Newsletter"], "No");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_client_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);
        send(&app, post_json("/api/registration", &ada())).await;

        let mut again = ada();
        again["email"] = json!("Ada@Example.com");
        let (status, body) = send(&app, post_json("/api/registration", &again)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "User with this email already exists");
        assert_eq!(counts(&app).await, (1, 1));
    }

    #[tokio::test]
    async fn missing_fields_are_listed_and_nothing_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        let mut req = ada();
        req["termsAccepted"] = json!(false);
        req.as_object_mut().unwrap().remove("lastName");
        let (status, body) = send(&app, post_json("/api/registration", &req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide all required fields");
        assert_eq!(
            body["errors"],
            json!(["Last name is required", "You must accept the terms and conditions"])
        );
        assert_eq!(counts(&app).await, (0, 0));
    }

    #[tokio::test]
    async fn invalid_fields_report_every_violation() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        let mut req = ada();
        req["email"] = json!("nope");
        req["phone"] = json!("12-34");
        let (status, body) = send(&app, post_json("/api/registration", &req)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_json_uses_the_error_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::post("/api/registration")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&test_app(&dir), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn list_is_newest_first_without_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);
        send(&app, post_json("/api/registration", &ada())).await;
        let mut grace = ada();
        grace["firstName"] = json!("Grace");
        grace["email"] = json!("grace@example.com");
        send(&app, post_json("/api/registration", &grace)).await;

        let (status, body) = send(&app, get("/api/registration")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["users"][0]["firstName"], "Grace");
        assert_eq!(body["users"][1]["firstName"], "Ada");
        assert!(!body.to_string().contains("argon2"));
    }

    #[tokio::test]
    async fn fetch_by_id_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);
        let (_, created) = send(&app, post_json("/api/registration", &ada())).await;
        let id = created["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, get(&format!("/api/registration/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id.as_str());
        assert!(body["user"].get("passwordHash").is_none());

        let missing = uuid::Uuid::new_v4();
        let (status, body) = send(&app, get(&format!("/api/registration/{missing}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, _) = send(&app, get("/api/registration/not-a-uuid")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn spreadsheet_failure_still_reports_created() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        let app = build_app(AppState::fake(blocker.join("registrations.xlsx")));

        let (status, body) = send(&app, post_json("/api/registration", &ada())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["excelFile"].is_null());
        assert_eq!(counts(&app).await, (1, 0));
    }
}
