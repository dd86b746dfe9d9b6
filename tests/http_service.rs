//! `HttpPermissionService` tests against a local fake RBAC server.
//!
//! Each test serves canned responses from a `TcpListener` and inspects the
//! raw requests the client sent:
//! - Paging envelopes are followed with `page` and `size` query parameters
//! - Bare arrays end the listing after one request
//! - Records whose names contain the separator are skipped
//! - The bearer token and a single `Content-Type` header are sent
//! - Error bodies with `detail` map to `Error::Service`

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use rolegrid::{
    ConsoleConfig, Error, HttpPermissionService, PermissionId, PermissionKey, PermissionService,
    RoleId,
};
use secrecy::SecretString;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

const TOKEN: &str = "secret-token";

/// Serves one canned response per connection, in order.
struct FakeServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    fn start(responses: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);
        let responses: Vec<(u16, String)> = responses
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();

        thread::spawn(move || {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let request = read_request(&mut stream);
                captured.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    reason(status),
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://{addr}/api"),
            requests,
        }
    }

    fn service(&self) -> HttpPermissionService {
        HttpPermissionService::new(&self.base_url, SecretString::from(TOKEN.to_string())).unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Reads the request head and a `Content-Length` body.
fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0_u8; 1024];
    let head_end = loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            return String::from_utf8_lossy(&data).into_owned();
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let body_len = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while data.len() < head_end + body_len {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        _ => "Internal Server Error",
    }
}

fn header_values<'a>(request: &'a str, name: &str) -> Vec<&'a str> {
    request
        .split("\r\n\r\n")
        .next()
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
        .collect()
}

fn body_of(request: &str) -> &str {
    request.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}

fn rendered(permissions: &[rolegrid::CanonicalPermission]) -> Vec<String> {
    permissions.iter().map(|p| p.key.to_string()).collect()
}

#[test]
fn test_list_follows_page_envelope() {
    let server = FakeServer::start(vec![
        (
            200,
            r#"{"items": [{"id": 1, "object": "report", "action": "read"},
                          {"id": 2, "object": "user", "action": "read"}],
                "page": 1, "size": 2, "total": 4, "pages": 2}"#,
        ),
        (
            200,
            r#"{"items": [{"id": 3, "object": "user", "action": "update"},
                          {"id": 4, "object": "user:admin", "action": "read"}],
                "page": 2, "size": 2, "total": 4, "pages": 2}"#,
        ),
    ]);
    let config = ConsoleConfig {
        api_url: Some(server.base_url.clone()),
        token: Some(SecretString::from(TOKEN.to_string())),
        page_size: 2,
        ..ConsoleConfig::default()
    };
    let service = HttpPermissionService::from_config(&config).unwrap();

    let permissions = service.list_permissions(&RoleId::new("r1")).unwrap();

    assert_eq!(rendered(&permissions), vec!["report:read", "user:read", "user:update"]);
    assert_eq!(permissions[2].remote_id, PermissionId::new("3"));

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /api/roles/r1/permissions?page=1&size=2 HTTP/1.1"));
    assert!(requests[1].starts_with("GET /api/roles/r1/permissions?page=2&size=2 HTTP/1.1"));
    for request in &requests {
        assert_eq!(header_values(request, "authorization"), vec![format!("Bearer {TOKEN}")]);
    }
}

#[test]
fn test_list_accepts_bare_array() {
    let server = FakeServer::start(vec![(
        200,
        r#"[{"id": "p1", "object": "user", "action": "read"},
            {"id": "p2", "object": "audit", "action": "ex:port"}]"#,
    )]);

    let permissions = server
        .service()
        .list_permissions(&RoleId::new("r1"))
        .unwrap();

    assert_eq!(rendered(&permissions), vec!["user:read"]);
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_create_sends_one_content_type() {
    let server = FakeServer::start(vec![(
        201,
        r#"{"id": "p9", "object": "user", "action": "read",
            "created_at": "2024-01-01T00:00:00", "updated_at": "2024-01-01T00:00:00"}"#,
    )]);
    let key = PermissionKey::new("user", "read").unwrap();

    let created = server
        .service()
        .create_permission(&RoleId::new("r1"), &key)
        .unwrap();

    assert_eq!(created.remote_id, PermissionId::new("p9"));
    assert_eq!(created.key, key);

    let requests = server.requests();
    let request = &requests[0];
    assert!(request.starts_with("POST /api/roles/r1/permissions HTTP/1.1"));
    assert_eq!(header_values(request, "content-type"), vec!["application/json"]);
    assert_eq!(header_values(request, "authorization"), vec![format!("Bearer {TOKEN}")]);
    let body: serde_json::Value = serde_json::from_str(body_of(request)).unwrap();
    assert_eq!(body, serde_json::json!({"object": "user", "action": "read"}));
}

#[test]
fn test_delete_targets_permission_path() {
    let server = FakeServer::start(vec![(204, "")]);

    server
        .service()
        .delete_permission(&PermissionId::new("p9"))
        .unwrap();

    let requests = server.requests();
    assert!(requests[0].starts_with("DELETE /api/permissions/p9 HTTP/1.1"));
    assert!(header_values(&requests[0], "content-type").is_empty());
}

#[test]
fn test_error_detail_maps_to_service_error() {
    let server = FakeServer::start(vec![(404, r#"{"detail": "Role not found"}"#)]);

    let err = server
        .service()
        .list_permissions(&RoleId::new("missing"))
        .unwrap_err();

    match err {
        Error::Service {
            operation,
            status,
            message,
        } => {
            assert_eq!(operation, "list_permissions");
            assert_eq!(status, 404);
            assert_eq!(message, "Role not found");
        },
        other => panic!("expected Service error, got {other:?}"),
    }
}

#[test]
fn test_validation_error_on_create() {
    let server = FakeServer::start(vec![(
        422,
        r#"{"detail": [{"loc": ["body", "action"], "msg": "permission already exists"}]}"#,
    )]);
    let key = PermissionKey::new("user", "read").unwrap();

    let err = server
        .service()
        .create_permission(&RoleId::new("r1"), &key)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Service { status: 422, ref message, .. } if message == "permission already exists"
    ));
}
