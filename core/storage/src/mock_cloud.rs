//! Local HTTP server speaking enough of the S3, Cloud Storage and Azure Blob
//! REST dialects to drive the real adapters in tests.
//!
//! Authentication is not checked. Every request is recorded as
//! `"<METHOD> <container>/<name>"` (or `"LIST <container>"`) so tests can
//! assert which calls an adapter made.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

const OBJECT_ETAG: &str = "\"0123456789abcdef\"";
const OBJECT_LAST_MODIFIED: &str = "Mon, 01 Jan 2024 00:00:00 GMT";
const LISTED_LAST_MODIFIED: &str = "2024-01-01T00:00:00.000Z";

/// Which service the server imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    /// DELETE of a missing key answers 204.
    S3,
    /// DELETE of a missing key answers 404.
    Gcs,
    /// Container-scoped Blob REST API under `/<account>/<container>`.
    Azure,
}

struct StoredObject {
    data: Bytes,
    visibility: Option<String>,
}

struct Inner {
    objects: BTreeMap<(String, String), StoredObject>,
    containers: BTreeSet<String>,
    requests: Vec<String>,
    reject: bool,
    page_size: usize,
}

#[derive(Clone)]
pub(crate) struct MockCloud {
    dialect: Dialect,
    url: String,
    inner: Arc<Mutex<Inner>>,
}

impl MockCloud {
    pub async fn start(dialect: Dialect) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let cloud = Self {
            dialect,
            url: format!("http://{}", addr),
            inner: Arc::new(Mutex::new(Inner {
                objects: BTreeMap::new(),
                containers: BTreeSet::new(),
                requests: Vec::new(),
                reject: false,
                page_size: 1000,
            })),
        };

        let router = match dialect {
            Dialect::S3 | Dialect::Gcs => Router::new()
                .route("/{bucket}", get(list_bucket))
                .route("/{bucket}/{*key}", any(bucket_object)),
            Dialect::Azure => Router::new()
                .route("/{account}/{container}", any(azure_container))
                .route("/{account}/{container}/{*name}", any(azure_blob)),
        }
        .with_state(cloud.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        cloud
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Answer every further request with 403.
    pub fn reject_all(&self) {
        self.lock().reject = true;
    }

    /// Entries per listing page.
    pub fn set_page_size(&self, size: usize) {
        self.lock().page_size = size;
    }

    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    pub fn create_container(&self, container: &str) {
        self.lock().containers.insert(container.to_string());
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.lock().containers.contains(container)
    }

    pub fn insert(&self, container: &str, name: &str, data: &'static [u8]) {
        self.lock().objects.insert(
            (container.to_string(), name.to_string()),
            StoredObject {
                data: Bytes::from_static(data),
                visibility: None,
            },
        );
    }

    pub fn contains(&self, container: &str, name: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&(container.to_string(), name.to_string()))
    }

    /// Visibility metadata sent with the upload of an object.
    pub fn visibility(&self, container: &str, name: &str) -> Option<String> {
        self.lock()
            .objects
            .get(&(container.to_string(), name.to_string()))
            .and_then(|object| object.visibility.clone())
    }

    /// Record a request; `Some` carries the rejection to send instead.
    fn record(&self, request: String) -> Option<Response> {
        let mut inner = self.lock();
        inner.requests.push(request);
        if inner.reject {
            Some(error_response(StatusCode::FORBIDDEN, "AccessDenied"))
        } else {
            None
        }
    }

    /// One listing page starting at offset `start`, plus the next offset.
    fn page(&self, container: &str, start: usize) -> (Vec<(String, usize)>, Option<usize>) {
        let inner = self.lock();
        let names: Vec<(String, usize)> = inner
            .objects
            .iter()
            .filter(|((c, _), _)| c == container)
            .map(|((_, name), object)| (name.clone(), object.data.len()))
            .collect();

        let end = (start + inner.page_size).min(names.len());
        let next = (end < names.len()).then_some(end);
        (names[start.min(end)..end].to_vec(), next)
    }
}

fn error_response(status: StatusCode, code: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code><Message>mock</Message></Error>",
        code
    );
    (status, body).into_response()
}

fn visibility_header(headers: &HeaderMap) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.as_str().ends_with("-meta-visibility"))
        .and_then(|(_, value)| value.to_str().ok())
        .map(str::to_string)
}

fn object_headers(len: usize) -> [(axum::http::HeaderName, String); 3] {
    [
        (ETAG, OBJECT_ETAG.to_string()),
        (LAST_MODIFIED, OBJECT_LAST_MODIFIED.to_string()),
        (CONTENT_LENGTH, len.to_string()),
    ]
}

fn offset(token: Option<&String>) -> usize {
    token.and_then(|t| t.parse().ok()).unwrap_or(0)
}

async fn list_bucket(
    State(cloud): State<MockCloud>,
    Path(bucket): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = cloud.record(format!("LIST {}", bucket)) {
        return rejection;
    }

    let (entries, next) = cloud.page(&bucket, offset(query.get("continuation-token")));
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
    );
    body.push_str(&format!("<Name>{}</Name><KeyCount>{}</KeyCount>", bucket, entries.len()));
    for (key, size) in &entries {
        body.push_str(&format!(
            "<Contents><Key>{}</Key><LastModified>{}</LastModified><ETag>&quot;0123456789abcdef&quot;</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
            key, LISTED_LAST_MODIFIED, size
        ));
    }
    match next {
        Some(next) => body.push_str(&format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
            next
        )),
        None => body.push_str("<IsTruncated>false</IsTruncated>"),
    }
    body.push_str("</ListBucketResult>");

    ([(axum::http::header::CONTENT_TYPE, "application/xml")], body).into_response()
}

async fn bucket_object(
    State(cloud): State<MockCloud>,
    method: Method,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = cloud.record(format!("{} {}/{}", method, bucket, key)) {
        return rejection;
    }
    let id = (bucket, key);

    match method {
        Method::PUT => {
            cloud.lock().objects.insert(
                id,
                StoredObject {
                    data: body,
                    visibility: visibility_header(&headers),
                },
            );
            (StatusCode::OK, [(ETAG, OBJECT_ETAG)]).into_response()
        }
        Method::GET => match cloud.lock().objects.get(&id) {
            Some(object) => (object_headers(object.data.len()), object.data.clone()).into_response(),
            None => error_response(StatusCode::NOT_FOUND, "NoSuchKey"),
        },
        Method::HEAD => match cloud.lock().objects.get(&id) {
            Some(object) => (StatusCode::OK, object_headers(object.data.len())).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::DELETE => {
            let existed = cloud.lock().objects.remove(&id).is_some();
            if existed || cloud.dialect == Dialect::S3 {
                StatusCode::NO_CONTENT.into_response()
            } else {
                error_response(StatusCode::NOT_FOUND, "NoSuchKey")
            }
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn azure_container(
    State(cloud): State<MockCloud>,
    method: Method,
    Path((_account, container)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let listing = query.get("comp").map(String::as_str) == Some("list");
    let request = if listing {
        format!("LIST {}", container)
    } else {
        format!("{} {}", method, container)
    };
    if let Some(rejection) = cloud.record(request) {
        return rejection;
    }

    if listing {
        let (entries, next) = cloud.page(&container, offset(query.get("marker")));
        let mut body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><EnumerationResults ContainerName=\"{}\"><Blobs>",
            container
        );
        for (name, size) in &entries {
            body.push_str(&format!(
                "<Blob><Name>{}</Name><Properties><Content-Length>{}</Content-Length></Properties></Blob>",
                name, size
            ));
        }
        body.push_str("</Blobs>");
        match next {
            Some(next) => body.push_str(&format!("<NextMarker>{}</NextMarker>", next)),
            None => body.push_str("<NextMarker/>"),
        }
        body.push_str("</EnumerationResults>");
        return body.into_response();
    }

    match method {
        Method::HEAD if cloud.has_container(&container) => StatusCode::OK.into_response(),
        Method::HEAD => StatusCode::NOT_FOUND.into_response(),
        Method::PUT if cloud.has_container(&container) => {
            error_response(StatusCode::CONFLICT, "ContainerAlreadyExists")
        }
        Method::PUT => {
            cloud.create_container(&container);
            StatusCode::CREATED.into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn azure_blob(
    State(cloud): State<MockCloud>,
    method: Method,
    Path((_account, container, name)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = cloud.record(format!("{} {}/{}", method, container, name)) {
        return rejection;
    }
    let id = (container, name);

    match method {
        Method::PUT => {
            cloud.lock().objects.insert(
                id,
                StoredObject {
                    data: body,
                    visibility: visibility_header(&headers),
                },
            );
            StatusCode::CREATED.into_response()
        }
        Method::GET => match cloud.lock().objects.get(&id) {
            Some(object) => (object_headers(object.data.len()), object.data.clone()).into_response(),
            None => error_response(StatusCode::NOT_FOUND, "BlobNotFound"),
        },
        Method::HEAD => match cloud.lock().objects.get(&id) {
            Some(object) => (StatusCode::OK, object_headers(object.data.len())).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::DELETE => {
            if cloud.lock().objects.remove(&id).is_some() {
                StatusCode::ACCEPTED.into_response()
            } else {
                error_response(StatusCode::NOT_FOUND, "BlobNotFound")
            }
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}
