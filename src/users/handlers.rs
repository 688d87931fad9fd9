use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Router,
};
use tracing::{instrument, warn};

use super::dto::{RegisterFiles, RegisterForm};
use super::repo_types::PublicUser;
use super::services::register_user;
use crate::{error::ApiError, response::ApiResponse, state::AppState, uploads::StagedUpload};

pub fn user_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// POST /users/register (multipart)
/// Text: fullName, email, username, password. Files: avatar (required), coverImage.
#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let mp = mp.map_err(|e| {
        warn!(error = %e, "not a multipart body");
        ApiError::InvalidInput("Request body must be multipart/form-data".into())
    })?;
    let mut upload = StagedUpload::from_multipart(&state.config.uploads.dir, mp).await?;
    let form = RegisterForm::from_upload(&mut upload);

    let result = register_user(&state, form, RegisterFiles::from_upload(&upload)).await;
    upload.discard().await;

    let user = result?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::state::fakes::{FakeStorage, MemoryUsers};
    use crate::state::AppState;

    const BOUNDARY: &str = "X-VIDTUBE-BOUNDARY";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn request(parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/users/register")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart(parts)))
            .unwrap()
    }

    async fn send(state: AppState, req: Request<Body>) -> (u16, serde_json::Value) {
        let res = build_app(state).oneshot(req).await.unwrap();
        let status = res.status().as_u16();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn text_fields<'a>(username: &'a str) -> Vec<Part<'a>> {
        vec![
            Part::Text("fullName", "Jane Doe"),
            Part::Text("email", "jane@example.com"),
            Part::Text("username", username),
            Part::Text("password", "hunter22"),
        ]
    }

    #[tokio::test]
    async fn register_returns_created_envelope() {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::with_fakes(Arc::new(MemoryUsers::default()), storage.clone());

        let mut parts = text_fields("JaneDoe");
        parts.push(Part::File("avatar", "me.png", b"png-bytes"));
        parts.push(Part::File("coverImage", "banner.jpg", b"jpg-bytes"));

        let (status, json) = send(state, request(&parts)).await;
        assert_eq!(status, 201);
        assert_eq!(json["status"], 201);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "User registered successfully");

        let data = &json["data"];
        assert_eq!(data["username"], "janedoe");
        assert_eq!(data["fullName"], "Jane Doe");
        assert_eq!(data["email"], "jane@example.com");
        assert!(data["avatar"].as_str().unwrap().ends_with(".png"));
        assert!(data["coverImage"].as_str().unwrap().ends_with(".jpg"));
        assert!(data.get("password").is_none());
        assert!(data.get("refreshToken").is_none());
        assert_eq!(storage.keys().len(), 2);
    }

    #[tokio::test]
    async fn register_without_avatar_is_bad_request() {
        let (status, json) = send(AppState::fake(), request(&text_fields("jane"))).await;
        assert_eq!(status, 400);
        assert_eq!(json["message"], "Avatar file is required");
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn register_with_blank_field_names_it() {
        let parts = [
            Part::Text("fullName", "Jane Doe"),
            Part::Text("email", "   "),
            Part::Text("username", "jane"),
            Part::Text("password", "hunter22"),
            Part::File("avatar", "me.png", b"png"),
        ];
        let (status, json) = send(AppState::fake(), request(&parts)).await;
        assert_eq!(status, 400);
        assert_eq!(json["message"], "email is required");
    }

    #[tokio::test]
    async fn register_duplicate_is_rejected() {
        let users = Arc::new(MemoryUsers::default());
        users.seed("jane", "someone@example.com");
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::with_fakes(users, storage.clone());

        let mut parts = text_fields("JANE");
        parts.push(Part::File("avatar", "me.png", b"png"));
        let (status, json) = send(state, request(&parts)).await;
        assert_eq!(status, 400);
        assert_eq!(json["message"], "User already exists.");
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn register_missing_read_back_is_server_error() {
        let state = AppState::with_fakes(
            Arc::new(MemoryUsers::hiding_reads()),
            Arc::new(FakeStorage::default()),
        );
        let mut parts = text_fields("jane");
        parts.push(Part::File("avatar", "me.png", b"png"));
        let (status, json) = send(state, request(&parts)).await;
        assert_eq!(status, 500);
        assert_eq!(
            json["message"],
            "Something went wrong while registering the user"
        );
    }

    async fn leftover_files(state: &AppState) -> usize {
        let mut dir = match tokio::fs::read_dir(&state.config.uploads.dir).await {
            Ok(d) => d,
            Err(_) => return 0,
        };
        let mut n = 0;
        while dir.next_entry().await.unwrap().is_some() {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn register_removes_staged_files_on_success() {
        let state = AppState::fake();
        let mut parts = text_fields("jane");
        parts.push(Part::File("avatar", "me.png", b"png"));
        parts.push(Part::File("coverImage", "banner.jpg", b"jpg"));

        let (status, _) = send(state.clone(), request(&parts)).await;
        assert_eq!(status, 201);
        assert!(state.config.uploads.dir.exists());
        assert_eq!(leftover_files(&state).await, 0);
    }

    #[tokio::test]
    async fn register_removes_staged_files_on_conflict() {
        let users = Arc::new(MemoryUsers::default());
        users.seed("jane", "jane@example.com");
        let state = AppState::with_fakes(users, Arc::new(FakeStorage::default()));
        let mut parts = text_fields("jane");
        parts.push(Part::File("avatar", "me.png", b"png"));

        let (status, _) = send(state.clone(), request(&parts)).await;
        assert_eq!(status, 400);
        assert!(state.config.uploads.dir.exists());
        assert_eq!(leftover_files(&state).await, 0);
    }

    #[tokio::test]
    async fn register_rejects_non_multipart_body_as_json() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/users/register")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"fullName":"Jane Doe"}"#))
            .unwrap();
        let (status, json) = send(AppState::fake(), req).await;
        assert_eq!(status, 400);
        assert_eq!(json["status"], 400);
        assert_eq!(json["message"], "Request body must be multipart/form-data");
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn register_oversized_avatar_is_payload_too_large() {
        let state = AppState::fake();
        let big = vec![0u8; 2 * state.config.uploads.max_bytes];
        let mut parts = text_fields("jane");
        parts.push(Part::File("avatar", "huge.png", &big));

        let (status, json) = send(state.clone(), request(&parts)).await;
        assert_eq!(status, 413);
        assert_eq!(json["status"], 413);
        assert_eq!(json["message"], "Request body is too large");
        assert_eq!(leftover_files(&state).await, 0);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let req = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), 200);
    }
}
