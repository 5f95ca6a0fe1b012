//! Table API accessor: list, get, create, update and delete on one table

use reqwest::Method;
use serde_json::{Map, Value};

use super::client::ServiceNowClient;
use super::query::QueryEncoder;
use super::response::Outcome;
use crate::error::Result;

/// One table on the stored instance, plus the query being built for it.
///
/// Predicates and sort keys accumulate for the lifetime of the accessor;
/// use a fresh one per query.
#[derive(Clone)]
pub struct Table {
    client: ServiceNowClient,
    name: String,
    query: QueryEncoder,
}

impl Table {
    pub(crate) fn new(client: ServiceNowClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            query: QueryEncoder::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_query(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.add_predicate(field, value);
        self
    }

    pub fn add_query_with_operator(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.query.add_predicate_with_operator(field, operator, value);
        self
    }

    pub fn order_by(&mut self, field: impl Into<String>) -> &mut Self {
        self.query.add_sort(field);
        self
    }

    pub fn encoded_query(&self) -> String {
        self.query.encode()
    }

    /// List records matching the accumulated query
    pub async fn query(&self) -> Result<Outcome> {
        let url = self.client.table_url(&self.name, None)?;
        let encoded = self.encoded_query();
        let params: Vec<(&str, &str)> = if encoded.is_empty() {
            Vec::new()
        } else {
            vec![("sysparm_query", encoded.as_str())]
        };
        self.client.dispatch(Method::GET, &url, &params, None).await
    }

    /// Fetch one record, optionally restricted to `fields`
    pub async fn get(&self, sys_id: &str, fields: &[&str]) -> Result<Outcome> {
        let url = self.client.table_url(&self.name, Some(sys_id))?;
        let joined = fields.join(",");
        let params: Vec<(&str, &str)> = if fields.is_empty() {
            Vec::new()
        } else {
            vec![("sysparm_fields", joined.as_str())]
        };
        self.client.dispatch(Method::GET, &url, &params, None).await
    }

    /// Update a single field on one record
    pub async fn set(
        &self,
        sys_id: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Outcome> {
        let url = self.client.table_url(&self.name, Some(sys_id))?;
        let mut body = Map::new();
        body.insert(field.to_string(), value.into());
        self.client
            .dispatch(Method::PATCH, &url, &[], Some(&Value::Object(body)))
            .await
    }

    /// Create an empty record with server defaults
    pub async fn create(&self) -> Result<Outcome> {
        let url = self.client.table_url(&self.name, None)?;
        self.client.dispatch(Method::POST, &url, &[], None).await
    }

    pub async fn create_with(&self, fields: Map<String, Value>) -> Result<Outcome> {
        let url = self.client.table_url(&self.name, None)?;
        self.client
            .dispatch(Method::POST, &url, &[], Some(&Value::Object(fields)))
            .await
    }

    pub async fn delete(&self, sys_id: &str) -> Result<Outcome> {
        let url = self.client.table_url(&self.name, Some(sys_id))?;
        self.client.dispatch(Method::DELETE, &url, &[], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::ManualClock;
    use crate::auth::{TokenManager, TokenRecord};
    use crate::config::Config;
    use crate::error::Error;
    use crate::store::{KeyValueStore, MemoryStore, INSTANCE_KEY, TOKEN_KEY};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: u64 = 1_700_000_000;

    fn client(server: &MockServer) -> ServiceNowClient {
        let store = Arc::new(MemoryStore::new());
        let record = TokenRecord::new("tok-1".into(), "ref-1".into(), 1_800, NOW);
        store.set(INSTANCE_KEY, "dev1234").unwrap();
        store
            .set(TOKEN_KEY, &serde_json::to_string(&record).unwrap())
            .unwrap();

        let config = Config::new("app-id", "app-secret").with_base_url(server.uri());
        let tokens = TokenManager::new(config.clone(), store)
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(NOW)));
        ServiceNowClient::with_token_manager(config, Arc::new(tokens)).unwrap()
    }

    #[tokio::test]
    async fn test_query_sends_encoded_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(query_param(
                "sysparm_query",
                "^active=true^priority<=2^ORDERBYnumber",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": [{ "number": "INC0010001" }] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut incidents = client(&server).table("incident");
        incidents
            .add_query("active", "true")
            .add_query_with_operator("priority", "<=", "2")
            .order_by("number");

        let outcome = incidents.query().await.unwrap();
        assert_eq!(outcome.result(), Some(&json!([{ "number": "INC0010001" }])));
    }

    #[tokio::test]
    async fn test_query_without_filters_omits_parameter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(query_param_is_missing("sysparm_query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).table("incident").query().await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_get_joins_fields() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident/abc123"))
            .and(query_param("sysparm_fields", "number,short_description"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "number": "INC0010001", "short_description": "Disk full" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .table("incident")
            .get("abc123", &["number", "short_description"])
            .await
            .unwrap();
        assert_eq!(outcome.result().unwrap()["number"], "INC0010001");
    }

    #[tokio::test]
    async fn test_get_without_fields_omits_parameter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident/abc123"))
            .and(query_param_is_missing("sysparm_fields"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .table("incident")
            .get("abc123", &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_patches_single_field() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/incident/abc123"))
            .and(body_json(json!({ "state": "6" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "state": "6" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .table("incident")
            .set("abc123", "state", "6")
            .await
            .unwrap();
        assert_eq!(outcome.result(), Some(&json!({ "state": "6" })));
    }

    #[tokio::test]
    async fn test_create_and_create_with() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/now/table/incident"))
            .and(body_json(json!({ "short_description": "VPN down" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "result": { "sys_id": "n2" } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/now/table/incident"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "result": { "sys_id": "n1" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let table = client(&server).table("incident");

        let mut fields = Map::new();
        fields.insert("short_description".into(), json!("VPN down"));
        let created = table.create_with(fields).await.unwrap();
        assert_eq!(created.result().unwrap()["sys_id"], "n2");

        let created = table.create().await.unwrap();
        assert_eq!(created.result().unwrap()["sys_id"], "n1");
    }

    #[tokio::test]
    async fn test_delete_returns_success_sentinel() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/now/table/incident/abc123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .table("incident")
            .delete("abc123")
            .await
            .unwrap();
        assert_eq!(outcome.to_legacy(), json!({ "result": "success" }));
    }

    #[tokio::test]
    async fn test_missing_instance_fails_before_request() {
        let server = MockServer::start().await;
        let config = Config::new("app-id", "app-secret").with_base_url(server.uri());
        let client = ServiceNowClient::new(config, Arc::new(MemoryStore::new())).unwrap();

        let err = client.table("incident").query().await.unwrap_err();
        assert!(matches!(err, Error::InstanceMissing));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
