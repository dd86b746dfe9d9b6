//! REST client for the RBAC service.
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | list | `GET {api}/roles/{role}/permissions?page=&size=` |
//! | create | `POST {api}/roles/{role}/permissions` with `{"object", "action"}` |
//! | delete | `DELETE {api}/permissions/{id}` |
//!
//! The list endpoint may answer with a bare array or with a paging envelope
//! (`{items, page, size, total, pages}`); envelopes are followed to the last
//! page. Error responses carry a `detail` field that is either a string or
//! a list of validation errors with `msg`.
//!
//! No call is retried.

use super::PermissionService;
use crate::config::ConsoleConfig;
use crate::models::{CanonicalPermission, PermissionId, PermissionKey, RoleId};
use crate::{Error, Result};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::instrument;

/// A permission as the service serializes it.
///
/// The service calls the resource `object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// Remote identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Resource name.
    #[serde(rename = "object")]
    pub resource: String,
    /// Action name.
    pub action: String,
    /// Creation timestamp, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl PermissionRecord {
    /// Converts the record into a validated canonical permission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the resource or action cannot form
    /// a [`PermissionKey`].
    pub fn into_canonical(self) -> Result<CanonicalPermission> {
        let key = PermissionKey::new(self.resource, self.action)?;
        Ok(CanonicalPermission::new(PermissionId::new(self.id), key))
    }
}

#[derive(Debug, Serialize)]
struct NewPermissionBody<'a> {
    object: &'a str,
    action: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Items(Vec<PermissionRecord>),
    Page(PermissionPage),
}

#[derive(Debug, Deserialize)]
struct PermissionPage {
    items: Vec<PermissionRecord>,
    #[serde(default)]
    pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// [`PermissionService`] over the REST API.
pub struct HttpPermissionService {
    base_url: Url,
    token: SecretString,
    page_size: u32,
    client: Client,
}

impl HttpPermissionService {
    /// Default number of permissions requested per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            token,
            page_size: Self::DEFAULT_PAGE_SIZE,
            client: build_http_client(30_000, 3_000),
        })
    }

    /// Creates a client from validated console configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let api_url = config
            .api_url
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("api_url is required".to_string()))?;
        let token = config
            .token
            .clone()
            .ok_or_else(|| Error::InvalidInput("token is required".to_string()))?;

        Ok(Self {
            base_url: parse_base_url(api_url)?,
            token,
            page_size: Self::DEFAULT_PAGE_SIZE,
            client: build_http_client(config.timeout_ms, config.connect_timeout_ms),
        }
        .with_page_size(config.page_size))
    }

    /// Sets the page size for list requests.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidInput(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn role_permissions_url(&self, role: &RoleId) -> Result<Url> {
        self.url(&["roles", role.as_str(), "permissions"])
    }

    fn permission_url(&self, id: &PermissionId) -> Result<Url> {
        self.url(&["permissions", id.as_str()])
    }

    /// Sends a request with the bearer token and maps error statuses.
    ///
    /// Bodies set their own `Content-Type` through [`RequestBuilder::json`].
    fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .send()
            .map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().unwrap_or_default();
            return Err(service_error(
                operation,
                status.as_u16(),
                status.canonical_reason(),
                &body,
            ));
        }
        Ok(response)
    }
}

impl PermissionService for HttpPermissionService {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self), fields(operation = "permissions.list"))]
    fn list_permissions(&self, role: &RoleId) -> Result<Vec<CanonicalPermission>> {
        let url = self.role_permissions_url(role)?;
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self
                .client
                .get(url.clone())
                .query(&[("page", page), ("size", self.page_size)]);
            let response: ListResponse = self
                .send("list_permissions", request)?
                .json()
                .map_err(|e| decode_error("list_permissions", &e))?;

            match response {
                ListResponse::Items(items) => {
                    records.extend(items);
                    break;
                },
                ListResponse::Page(body) => {
                    let received = body.items.len();
                    records.extend(body.items);
                    let pages = body.pages.unwrap_or(page);
                    if received == 0 || page >= pages {
                        break;
                    }
                    page += 1;
                },
            }
        }

        tracing::debug!(role = %role, count = records.len(), pages = page, "Fetched permission records");

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                record
                    .into_canonical()
                    .map_err(|e| {
                        tracing::warn!(role = %role, remote_id = %id, error = %e, "Skipping unrepresentable permission");
                    })
                    .ok()
            })
            .collect())
    }

    #[instrument(skip(self), fields(operation = "permissions.create"))]
    fn create_permission(
        &self,
        role: &RoleId,
        key: &PermissionKey,
    ) -> Result<CanonicalPermission> {
        let body = NewPermissionBody {
            object: key.resource(),
            action: key.action(),
        };
        let request = self
            .client
            .post(self.role_permissions_url(role)?)
            .json(&body);

        let record: PermissionRecord = self
            .send("create_permission", request)?
            .json()
            .map_err(|e| decode_error("create_permission", &e))?;

        record
            .into_canonical()
            .map_err(|e| Error::OperationFailed {
                operation: "create_permission".to_string(),
                cause: format!("service returned an unusable permission: {e}"),
            })
    }

    #[instrument(skip(self), fields(operation = "permissions.delete"))]
    fn delete_permission(&self, id: &PermissionId) -> Result<()> {
        let request = self.client.delete(self.permission_url(id)?);
        self.send("delete_permission", request)?;
        Ok(())
    }
}

/// Builds a blocking HTTP client with the given timeouts (0 disables).
fn build_http_client(timeout_ms: u64, connect_timeout_ms: u64) -> Client {
    let mut builder =
        Client::builder().user_agent(format!("rolegrid/{}", env!("CARGO_PKG_VERSION")));
    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    if connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build permission HTTP client: {err}");
        Client::new()
    })
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim())
        .map_err(|e| Error::InvalidInput(format!("invalid api_url '{base_url}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidInput(format!(
            "api_url must use http or https, got '{other}'"
        ))),
    }
}

fn decode_error(operation: &str, e: &reqwest::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("invalid response body: {e}"),
    }
}

/// Maps an error response to [`Error::Service`].
///
/// Prefers the body's `detail` (a string, or the first `msg` of a list),
/// then the HTTP reason phrase.
fn service_error(operation: &str, status: u16, reason: Option<&str>, body: &str) -> Error {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|detail| match detail {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

    Error::Service {
        operation: operation.to_string(),
        status,
        message: detail.unwrap_or_else(|| reason.unwrap_or("request failed").to_string()),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn service(base: &str) -> HttpPermissionService {
        HttpPermissionService::new(base, SecretString::from("token".to_string())).unwrap()
    }

    #[test_case("https://rbac.example.com", "https://rbac.example.com/roles/r1/permissions" ; "bare host")]
    #[test_case("https://rbac.example.com/", "https://rbac.example.com/roles/r1/permissions" ; "trailing slash")]
    #[test_case("http://localhost:8080/api/v1", "http://localhost:8080/api/v1/roles/r1/permissions" ; "path prefix")]
    fn test_role_permissions_url(base: &str, expected: &str) {
        let url = service(base)
            .role_permissions_url(&RoleId::new("r1"))
            .unwrap();
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let url = service("https://rbac.example.com")
            .permission_url(&PermissionId::new("a/b c"))
            .unwrap();
        assert_eq!(url.as_str(), "https://rbac.example.com/permissions/a%2Fb%20c");
    }

    #[test_case("ftp://rbac.example.com" ; "wrong scheme")]
    #[test_case("not a url" ; "garbage")]
    fn test_rejects_bad_base_url(base: &str) {
        let result = HttpPermissionService::new(base, SecretString::from("t".to_string()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decode_bare_list() {
        let body = r#"[{"id": "p1", "object": "user", "action": "read"}]"#;
        let parsed: ListResponse = serde_json::from_str(body).unwrap();
        let ListResponse::Items(items) = parsed else {
            panic!("expected bare list");
        };
        assert_eq!(items[0].resource, "user");
    }

    #[test]
    fn test_decode_page_envelope() {
        let body = r#"{
            "items": [{"id": 7, "object": "report", "action": "read",
                       "created_at": "2024-01-01T00:00:00", "updated_at": null}],
            "page": 1, "size": 25, "total": 30, "pages": 2
        }"#;
        let parsed: ListResponse = serde_json::from_str(body).unwrap();
        let ListResponse::Page(page) = parsed else {
            panic!("expected page envelope");
        };
        assert_eq!(page.pages, Some(2));
        assert_eq!(page.items[0].id, "7");
        assert_eq!(
            page.items[0].created_at.as_deref(),
            Some("2024-01-01T00:00:00")
        );
    }

    #[test]
    fn test_record_into_canonical() {
        let record = PermissionRecord {
            id: "p1".to_string(),
            resource: "user".to_string(),
            action: "read".to_string(),
            created_at: None,
            updated_at: None,
        };
        let permission = record.into_canonical().unwrap();
        assert_eq!(permission.remote_id.as_str(), "p1");
        assert_eq!(permission.key.to_string(), "user:read");
    }

    #[test]
    fn test_record_with_separator_is_rejected() {
        let record = PermissionRecord {
            id: "p1".to_string(),
            resource: "user:admin".to_string(),
            action: "read".to_string(),
            created_at: None,
            updated_at: None,
        };
        assert!(record.into_canonical().is_err());
    }

    #[test]
    fn test_new_permission_body_uses_object() {
        let body = NewPermissionBody {
            object: "user",
            action: "read",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"object": "user", "action": "read"}));
    }

    #[test_case(r#"{"detail": "Role not found"}"#, "Role not found" ; "string detail")]
    #[test_case(r#"{"detail": [{"msg": "field required", "loc": ["body"]}]}"#, "field required" ; "validation list")]
    #[test_case(r#"{"error": "other"}"#, "Not Found" ; "no detail")]
    #[test_case("<html>", "Not Found" ; "not json")]
    fn test_service_error_message(body: &str, expected: &str) {
        let err = service_error("list_permissions", 404, Some("Not Found"), body);
        match err {
            Error::Service {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, expected);
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
