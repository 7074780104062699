//! HTTP client for the hosted document store's REST API.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST v1/{collection}:query` with a single `eq` or `in` filter
//! - `GET v1/{collection}/{id}`
//! - `POST v1/{collection}` to create
//! - `PATCH v1/{collection}/{id}` to merge a partial document
//! - `DELETE v1/{collection}/{id}`

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use url::Url;

use crate::document::{Document, Fields};
use crate::error::{Result, StoreError};
use crate::metrics_defs::{STORE_ERRORS, STORE_REQUEST_DURATION, STORE_REQUESTS};
use crate::{Collection, DocumentStore, check_in_list};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    In,
}

/// Body of a `:query` request.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
}

#[derive(Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &Url, api_key: Option<String>) -> Self {
        RestStore {
            client: reqwest::Client::new(),
            base_url: base_url.clone(),
            api_key,
        }
    }

    /// Appends `v1` and `segments` to the base URL. Each segment is
    /// percent-encoded, so a `/` or `?` inside one stays inside it.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn collection_url(&self, collection: Collection) -> Result<Url> {
        self.endpoint(&[collection.as_str()])
    }

    fn document_url(&self, collection: Collection, id: &str) -> Result<Url> {
        // Dot segments are dropped when pushed and would address the collection
        if id.is_empty() || id == "." || id == ".." {
            return Err(StoreError::InvalidDocument {
                id: id.to_string(),
                reason: "not a valid document id".into(),
            });
        }
        self.endpoint(&[collection.as_str(), id])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Sends a request and records request metrics. Non-success statuses are
    /// returned to the caller, which decides what a 404 means.
    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> Result<Response> {
        let started = Instant::now();
        metrics::counter!(STORE_REQUESTS.name, "operation" => operation).increment(1);

        let result = builder.send().await;
        metrics::histogram!(STORE_REQUEST_DURATION.name, "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(response) => Ok(response),
            Err(e) => {
                metrics::counter!(STORE_ERRORS.name, "operation" => operation).increment(1);
                tracing::error!(operation, error = %e, "Document store request failed");
                Err(e.into())
            }
        }
    }

    fn status_error(operation: &'static str, response: &Response) -> StoreError {
        metrics::counter!(STORE_ERRORS.name, "operation" => operation).increment(1);
        let status = response.status().as_u16();
        tracing::warn!(operation, status, "Document store returned an error status");
        StoreError::Status { operation, status }
    }

    async fn query(&self, collection: Collection, filter: QueryRequest) -> Result<Vec<Document>> {
        let url = self.endpoint(&[&format!("{collection}:query")])?;
        let response = self
            .send("query", self.request(Method::POST, url).json(&filter))
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error("query", &response));
        }

        Ok(response.json::<QueryResponse>().await?.documents)
    }

    fn not_found(collection: Collection, id: &str) -> StoreError {
        StoreError::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn get_by_equality(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        self.query(
            collection,
            QueryRequest {
                field: field.to_string(),
                op: FilterOp::Eq,
                value: value.clone(),
            },
        )
        .await
    }

    async fn get_by_id_list(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<Vec<Document>> {
        self.get_by_field_in(collection, crate::document::ID_FIELD, ids)
            .await
    }

    async fn get_by_field_in(
        &self,
        collection: Collection,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>> {
        check_in_list(values.len())?;
        if values.is_empty() {
            return Ok(Vec::new());
        }

        self.query(
            collection,
            QueryRequest {
                field: field.to_string(),
                op: FilterOp::In,
                value: Value::from(values.to_vec()),
            },
        )
        .await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let response = self
            .send(
                "get",
                self.request(Method::GET, self.document_url(collection, id)?),
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Document>().await?)),
            _ => Err(Self::status_error("get", &response)),
        }
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<String> {
        let response = self
            .send(
                "create",
                self.request(Method::POST, self.collection_url(collection)?)
                    .json(&fields),
            )
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error("create", &response));
        }

        let created = response.json::<CreateResponse>().await?;
        tracing::debug!(%collection, id = %created.id, "Created document");
        Ok(created.id)
    }

    async fn update(&self, collection: Collection, id: &str, partial: Fields) -> Result<()> {
        let response = self
            .send(
                "update",
                self.request(Method::PATCH, self.document_url(collection, id)?)
                    .json(&partial),
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Self::not_found(collection, id)),
            status if status.is_success() => Ok(()),
            _ => Err(Self::status_error("update", &response)),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let response = self
            .send(
                "delete",
                self.request(Method::DELETE, self.document_url(collection, id)?),
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Self::not_found(collection, id)),
            status if status.is_success() => Ok(()),
            _ => Err(Self::status_error("delete", &response)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use http_body_util::{BodyExt, Full};
    use hyper::body::{Bytes, Incoming};
    use hyper::service::service_fn;
    use hyper::{Request, Response as HttpResponse};
    use hyper_util::rt::TokioExecutor;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Recorded {
        authorization: Vec<Option<String>>,
        paths: Vec<String>,
        queries: usize,
    }

    fn json_response(status: StatusCode, body: Value) -> HttpResponse<Full<Bytes>> {
        let mut response = HttpResponse::new(Full::new(Bytes::from(body.to_string())));
        *response.status_mut() = status;
        response
    }

    fn collection_named(name: &str) -> Collection {
        Collection::ALL
            .into_iter()
            .find(|collection| collection.as_str() == name)
            .unwrap()
    }

    /// Serves the REST API on top of a `MemoryStore`.
    async fn handle(
        store: MemoryStore,
        recorded: Arc<Mutex<Recorded>>,
        req: Request<Incoming>,
    ) -> HttpResponse<Full<Bytes>> {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().trim_start_matches("/v1/").to_string();
        let authorization = req
            .headers()
            .get(hyper::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        {
            let mut recorded = recorded.lock().unwrap();
            recorded.authorization.push(authorization);
            recorded.paths.push(req.uri().path().to_string());
        }

        let body = req.into_body().collect().await.unwrap().to_bytes();
        let segments: Vec<&str> = path.split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("POST", [target]) if target.ends_with(":query") => {
                recorded.lock().unwrap().queries += 1;
                let collection = collection_named(target.trim_end_matches(":query"));
                let query: QueryRequest = serde_json::from_slice(&body).unwrap();
                let documents = match query.op {
                    FilterOp::Eq => store
                        .get_by_equality(collection, &query.field, &query.value)
                        .await
                        .unwrap(),
                    FilterOp::In => {
                        let values: Vec<String> = serde_json::from_value(query.value).unwrap();
                        match store.get_by_field_in(collection, &query.field, &values).await {
                            Ok(documents) => documents,
                            Err(_) => return json_response(StatusCode::BAD_REQUEST, json!({})),
                        }
                    }
                };
                json_response(StatusCode::OK, json!(QueryResponse { documents }))
            }
            ("POST", [collection]) => {
                let collection = collection_named(collection);
                let fields: Fields = serde_json::from_slice(&body).unwrap();
                let id = store.create(collection, fields).await.unwrap();
                json_response(StatusCode::OK, json!(CreateResponse { id }))
            }
            ("GET", [collection, id]) => {
                let collection = collection_named(collection);
                match store.get(collection, id).await.unwrap() {
                    Some(doc) => json_response(StatusCode::OK, json!(doc)),
                    None => json_response(StatusCode::NOT_FOUND, json!({})),
                }
            }
            ("PATCH", [collection, id]) => {
                let collection = collection_named(collection);
                let partial: Fields = serde_json::from_slice(&body).unwrap();
                match store.update(collection, id, partial).await {
                    Ok(()) => json_response(StatusCode::OK, json!({})),
                    Err(_) => json_response(StatusCode::NOT_FOUND, json!({})),
                }
            }
            ("DELETE", [collection, id]) => {
                let collection = collection_named(collection);
                match store.delete(collection, id).await {
                    Ok(()) => json_response(StatusCode::OK, json!({})),
                    Err(_) => json_response(StatusCode::NOT_FOUND, json!({})),
                }
            }
            _ => json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({})),
        }
    }

    /// Start a mock document store server backed by `store`
    async fn start_mock_server(store: MemoryStore) -> (u16, Arc<Mutex<Recorded>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let recorded_clone = recorded.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);
                let store = store.clone();
                let recorded = recorded_clone.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let store = store.clone();
                        let recorded = recorded.clone();
                        async move { Ok::<_, Infallible>(handle(store, recorded, req).await) }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        (port, recorded)
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn rest_store(port: u16, api_key: Option<&str>) -> RestStore {
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        RestStore::new(&url, api_key.map(String::from))
    }

    #[tokio::test]
    async fn test_queries() {
        let memory = MemoryStore::new();
        memory.insert(Collection::Teachers, "t1", fields(json!({"subject": "math"})));
        memory.insert(Collection::Teachers, "t2", fields(json!({"subject": "art"})));
        let (port, recorded) = start_mock_server(memory).await;
        let store = rest_store(port, Some("secret"));

        let math = store
            .get_by_equality(Collection::Teachers, "subject", &json!("math"))
            .await
            .unwrap();
        assert_eq!(math.len(), 1);
        assert_eq!(math[0].id, "t1");

        let listed = store
            .get_by_id_list(Collection::Teachers, &["t1".into(), "t2".into(), "t3".into()])
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.queries, 2);
        assert!(
            recorded
                .authorization
                .iter()
                .all(|auth| auth.as_deref() == Some("Bearer secret"))
        );
    }

    #[tokio::test]
    async fn test_in_list_limit_checked_before_sending() {
        let (port, recorded) = start_mock_server(MemoryStore::new()).await;
        let store = rest_store(port, None);
        let ids: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();

        let err = store
            .get_by_id_list(Collection::Teachers, &ids)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InListTooLarge { len: 11, .. }));

        let empty = store.get_by_id_list(Collection::Teachers, &[]).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(recorded.lock().unwrap().queries, 0);
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let memory = MemoryStore::new();
        let (port, _) = start_mock_server(memory.clone()).await;
        let store = rest_store(port, None);

        let id = store
            .create(Collection::Questions, fields(json!({"question": "Why?"})))
            .await
            .unwrap();
        assert_eq!(memory.len(Collection::Questions), 1);

        store
            .update(Collection::Questions, &id, fields(json!({"status": "answered"})))
            .await
            .unwrap();
        let doc = store.get(Collection::Questions, &id).await.unwrap().unwrap();
        assert_eq!(doc.str_field("question"), Some("Why?"));
        assert_eq!(doc.str_field("status"), Some("answered"));

        store.delete(Collection::Questions, &id).await.unwrap();
        assert!(store.get(Collection::Questions, &id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(Collection::Questions, &id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let (port, _) = start_mock_server(MemoryStore::new()).await;
        // Unknown route on the mock server answers 500
        let url = Url::parse(&format!("http://127.0.0.1:{port}/broken/")).unwrap();
        let store = RestStore::new(&url, None);

        let err = store
            .get_by_equality(Collection::Students, "name", &json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Status {
                operation: "query",
                status: 500
            }
        ));
    }

    #[tokio::test]
    async fn test_ids_stay_in_one_path_segment() {
        let memory = MemoryStore::new();
        memory.insert(Collection::Students, "s1", fields(json!({"name": "Ada"})));
        let (port, recorded) = start_mock_server(memory.clone()).await;
        let store = rest_store(port, None);

        let escaping = "../students/s1?x#y";
        assert!(store.get(Collection::Teachers, escaping).await.unwrap().is_none());
        assert!(matches!(
            store.delete(Collection::Notices, escaping).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert_eq!(memory.len(Collection::Students), 1);

        let paths = recorded.lock().unwrap().paths.clone();
        assert_eq!(
            paths,
            vec![
                "/v1/teachers/..%2Fstudents%2Fs1%3Fx%23y",
                "/v1/notices/..%2Fstudents%2Fs1%3Fx%23y",
            ]
        );
    }

    #[tokio::test]
    async fn test_dot_ids_rejected_before_sending() {
        let (port, recorded) = start_mock_server(MemoryStore::new()).await;
        let store = rest_store(port, None);

        for id in ["", ".", ".."] {
            assert!(matches!(
                store.get(Collection::Students, id).await.unwrap_err(),
                StoreError::InvalidDocument { .. }
            ));
            assert!(matches!(
                store.delete(Collection::Students, id).await.unwrap_err(),
                StoreError::InvalidDocument { .. }
            ));
        }
        assert!(recorded.lock().unwrap().paths.is_empty());
    }

    #[tokio::test]
    async fn test_base_url_path_is_kept() {
        let memory = MemoryStore::new();
        memory.insert(Collection::Students, "s1", fields(json!({})));
        let (port, recorded) = start_mock_server(memory).await;
        let url = Url::parse(&format!("http://127.0.0.1:{port}/api")).unwrap();
        let store = RestStore::new(&url, None);

        // The mock only serves /v1/..., so this resolves to a 500
        assert!(store.get(Collection::Students, "s1").await.is_err());
        assert_eq!(recorded.lock().unwrap().paths, vec!["/api/v1/students/s1"]);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let store = rest_store(1, None);
        assert!(matches!(
            store.get(Collection::Students, "s1").await.unwrap_err(),
            StoreError::Http(_)
        ));
    }
}
