//! API handlers module

pub mod accounts;
pub mod authors;
pub mod books;
pub mod groups;
pub mod health;
pub mod library;

use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::FromRequest;
use axum::Json;
use libris_common::{
    errors::{AppError, Result},
    metrics::record_validation_failure,
    validation::Upload,
};
use serde::Serialize;

/// Successful write: the user-facing notification plus the affected record
#[derive(Debug, Serialize)]
pub struct Notice<T> {
    pub message: String,
    pub data: T,
}

pub fn notice<T: Serialize>(message: impl Into<String>, data: T) -> Json<Notice<T>> {
    Json(Notice {
        message: message.into(),
        data,
    })
}

/// JSON form body; values that do not fit the form come back as field errors
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct FormJson<T>(pub T);

/// Count rejected submissions of `form`
pub(crate) fn rejected(form: &'static str, err: &AppError) {
    if err.form_errors().is_some() {
        record_validation_failure(form);
    }
}

/// Read the file part called `name` from a multipart body
pub(crate) async fn read_upload(multipart: &mut Multipart, name: &str) -> Result<Upload> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(name) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload::new(file_name, bytes.to_vec()));
    }

    Err(AppError::field(name, "No file was submitted."))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::InvalidFormat {
        message: err.body_text(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{create_router, AppState};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, Response},
        Router,
    };
    use libris_common::{config::DatabaseConfig, forms::RegisterForm, AppConfig};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        _media: TempDir,
    }

    impl TestApp {
        pub async fn new() -> Self {
            let media = TempDir::new().unwrap();
            let mut config = AppConfig::default();
            config.database = DatabaseConfig::in_memory();
            config.media.root = media.path().to_path_buf();
            config.rate_limit.enabled = false;

            let state = AppState::from_config(config, None).await.unwrap();
            Self {
                router: create_router(state.clone()),
                state,
                _media: media,
            }
        }

        /// Register `username` and return a bearer token for them
        pub async fn token(&self, username: &str) -> String {
            let view = self
                .state
                .repo
                .register_user(RegisterForm {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    first_name: String::new(),
                    last_name: String::new(),
                })
                .await
                .unwrap();
            self.state
                .jwt
                .generate_token(view.user.id, &view.user.username)
                .unwrap()
        }

        pub async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }

        pub async fn get(&self, uri: &str, token: &str) -> Response<Body> {
            self.send(
                Request::get(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
        }

        pub async fn post(&self, uri: &str, token: &str, body: Value) -> Response<Body> {
            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        /// POST a single file part called `field`
        pub async fn upload(
            &self,
            uri: &str,
            token: &str,
            field: &str,
            file_name: &str,
            bytes: &[u8],
        ) -> Response<Body> {
            let boundary = "libris-test-boundary";
            let mut body = format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(bytes);
            body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

            self.send(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
        }
    }

    pub async fn json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// A small encoded JPEG
    pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 40, 60]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }
}
