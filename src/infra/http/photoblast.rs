use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::{StatusCode, Url};

use crate::domain::{UploadError, UploadReceipt, UploadRequest};
use crate::infra::env::{read_env_var, read_timeout_from_env};

use super::UploadTransport;
use super::response_parsing::{parse_receipt, rejection_message, truncate_message};

pub const IDEMPOTENCY_KEY_HEADER: &str = "X-Idempotency-Key";
pub const UPLOAD_FILE_FIELD: &str = "file";
const UPLOAD_PATH: &str = "/api/photos/upload";
const HEALTH_PATH: &str = "/api/photos/health";
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const ENV_BASE_URL: &str = "PHOTOBLAST_API_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "PHOTOBLAST_UPLOAD_TIMEOUT_SECS";

/// Blocking HTTP client for the PhotoBlast upload endpoint.
pub struct PhotoBlastClient {
    api_base_url: String,
    timeout: Duration,
    client: Client,
}

impl PhotoBlastClient {
    pub fn from_base_url(api_base_url: impl Into<String>) -> Result<Self, UploadError> {
        Self::with_config(api_base_url, DEFAULT_UPLOAD_TIMEOUT)
    }

    pub fn from_env() -> Result<Self, UploadError> {
        let api_base_url = read_env_var(ENV_BASE_URL)?.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let timeout = read_timeout_from_env(ENV_TIMEOUT_SECS)?.unwrap_or(DEFAULT_UPLOAD_TIMEOUT);
        Self::with_config(api_base_url, timeout)
    }

    pub fn with_config(
        api_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let api_base_url = api_base_url.into().trim().to_string();
        if api_base_url.is_empty() {
            return Err(UploadError::validation(
                "PhotoBlast API base URL must not be empty",
            ));
        }
        Url::parse(&api_base_url).map_err(|err| {
            UploadError::validation(format!(
                "PhotoBlast API base URL '{api_base_url}' is invalid: {err}"
            ))
        })?;

        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            UploadError::internal(format!("failed to create PhotoBlast HTTP client: {err}"))
        })?;

        Ok(Self {
            api_base_url,
            timeout,
            client,
        })
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Task ids are plain ASCII identifiers, so the comma separator is kept
    /// unencoded and identical task sets always yield identical URLs.
    fn upload_url(&self, request: &UploadRequest) -> String {
        format!(
            "{}{UPLOAD_PATH}?tasks={}",
            self.api_base_url.trim_end_matches('/'),
            request.tasks.to_query_value()
        )
    }

    fn health_url(&self) -> String {
        format!("{}{HEALTH_PATH}", self.api_base_url.trim_end_matches('/'))
    }

    fn build_form(request: &UploadRequest) -> Result<Form, UploadError> {
        let part = Part::bytes(request.file.bytes().to_vec())
            .file_name(request.file.name().to_string())
            .mime_str(request.file.content_type())
            .map_err(|err| {
                UploadError::validation(format!(
                    "file content type '{}' is not a valid MIME type: {err}",
                    request.file.content_type()
                ))
            })?;
        Ok(Form::new().part(UPLOAD_FILE_FIELD, part))
    }
}

impl UploadTransport for PhotoBlastClient {
    fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, UploadError> {
        let form = Self::build_form(request)?;
        let started = Instant::now();

        let response = self
            .client
            .post(self.upload_url(request))
            .header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key.as_str())
            .multipart(form)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().map_err(map_transport_error)?;
        tracing::debug!(
            status = status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "upload endpoint responded"
        );

        if !status.is_success() {
            return Err(map_http_error(status, &body));
        }
        parse_receipt(&body)
    }

    fn health_check(&self) -> Result<(), UploadError> {
        let response = self
            .client
            .get(self.health_url())
            .send()
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.text().map_err(map_transport_error)?;
        if status.is_success() && body.trim() == "OK" {
            return Ok(());
        }
        Err(UploadError::transport(format!(
            "health check returned HTTP {status}: {}",
            truncate_message(&body)
        )))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> UploadError {
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return UploadError::Timeout;
    }
    UploadError::Rejected {
        status: status.as_u16(),
        message: rejection_message(body),
    }
}

fn map_transport_error(error: reqwest::Error) -> UploadError {
    if error.is_timeout() {
        return UploadError::Timeout;
    }
    UploadError::transport(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::{PhotoBlastClient, map_http_error};
    use crate::domain::{IdempotencyKey, ImageFile, TaskSelection, UploadError, UploadRequest};

    fn request(tasks: &str) -> UploadRequest {
        UploadRequest {
            file: ImageFile::new("photo.jpg", "image/jpeg", b"jpeg-bytes".to_vec()),
            tasks: tasks.parse::<TaskSelection>().expect("tasks should parse"),
            idempotency_key: IdempotencyKey::new("1700000000000-abc123xyz")
                .expect("key should build"),
        }
    }

    #[test]
    fn with_config_rejects_blank_or_invalid_base_url() {
        assert!(matches!(
            PhotoBlastClient::with_config("  ", Duration::from_secs(1)),
            Err(UploadError::Validation { .. })
        ));
        assert!(matches!(
            PhotoBlastClient::with_config("not a url", Duration::from_secs(1)),
            Err(UploadError::Validation { .. })
        ));
    }

    #[test]
    fn upload_url_uses_catalog_ordered_unencoded_task_list() {
        let client = PhotoBlastClient::with_config("http://localhost:8080/", Duration::from_secs(1))
            .expect("client should build");
        assert_eq!(
            client.upload_url(&request("WATERMARK,RESIZE")),
            "http://localhost:8080/api/photos/upload?tasks=RESIZE,WATERMARK"
        );
    }

    #[test]
    fn map_http_error_keeps_status_and_server_message() {
        let error = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"message":"File is empty"}"#,
        );
        assert_eq!(
            error,
            UploadError::Rejected {
                status: 400,
                message: Some("File is empty".to_string()),
            }
        );

        let error = map_http_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(
            error,
            UploadError::Rejected {
                status: 502,
                message: None,
            }
        );

        assert_eq!(
            map_http_error(StatusCode::GATEWAY_TIMEOUT, ""),
            UploadError::Timeout
        );
    }
}
