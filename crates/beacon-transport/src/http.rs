//! HTTP implementation of the registry transport
//!
//! Speaks the Eureka v2 REST dialect: upper-cased application path segments,
//! `{"instance": ...}` registration envelopes, and the nested
//! `{"applications": {"application": [...]}}` bulk listing.

use crate::error::{TransportError, TransportResult};
use crate::RegistryTransport;
use async_trait::async_trait;
use beacon_types::{Application, Instance, InstanceStatus};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Fixed timeout applied to every registry call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for a Eureka-compatible registry.
pub struct HttpRegistryTransport {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct RegisterEnvelope<'a> {
    instance: &'a Instance,
}

#[derive(Deserialize)]
struct ApplicationsEnvelope {
    #[serde(default)]
    applications: ApplicationsBody,
}

#[derive(Deserialize, Default)]
struct ApplicationsBody {
    #[serde(rename = "application", default)]
    applications: Vec<Application>,
}

#[derive(Deserialize)]
struct ApplicationEnvelope {
    application: Application,
}

#[derive(Deserialize)]
struct InstanceEnvelope {
    instance: Instance,
}

impl HttpRegistryTransport {
    /// Create a transport against a registry base URL, e.g.
    /// `http://registry:8761/eureka`.
    pub fn new(base_url: &str) -> TransportResult<Self> {
        if base_url.trim().is_empty() {
            return Err(TransportError::Endpoint("base URL is empty".to_string()));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The configured registry base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn expect_success(&self, response: reqwest::Response) -> TransportResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(TransportError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> TransportResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(self.expect_success(response).await?.json().await?)
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistryTransport {
    async fn register(&self, app_id: &str, instance: &Instance) -> TransportResult<()> {
        let path = format!("/apps/{}", app_id.to_uppercase());
        debug!(app_id = %app_id, instance_id = %instance.instance_id, "Registering instance");

        let response = self
            .client
            .post(self.url(&path))
            .json(&RegisterEnvelope { instance })
            .send()
            .await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn deregister(&self, app_id: &str, instance_id: &str) -> TransportResult<()> {
        let path = format!("/apps/{}/{}", app_id.to_uppercase(), instance_id);
        debug!(app_id = %app_id, instance_id = %instance_id, "De-registering instance");

        let response = self.client.delete(self.url(&path)).send().await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn heartbeat(&self, app_id: &str, instance_id: &str) -> TransportResult<()> {
        let path = format!("/apps/{}/{}", app_id.to_uppercase(), instance_id);

        let response = self
            .client
            .put(self.url(&path))
            .query(&[("status", InstanceStatus::Up.as_str())])
            .send()
            .await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        app_id: &str,
        instance_id: &str,
        status: InstanceStatus,
    ) -> TransportResult<()> {
        let path = format!("/apps/{}/{}/status", app_id.to_uppercase(), instance_id);
        debug!(app_id = %app_id, instance_id = %instance_id, status = %status, "Updating status");

        let response = self
            .client
            .put(self.url(&path))
            .query(&[("value", status.as_str())])
            .send()
            .await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn query_all(&self) -> TransportResult<Vec<Application>> {
        let envelope: ApplicationsEnvelope = self.get_json("/apps").await?;
        Ok(envelope.applications.applications)
    }

    async fn query_by_app_id(&self, app_id: &str) -> TransportResult<Application> {
        let path = format!("/apps/{}", app_id.to_uppercase());
        let envelope: ApplicationEnvelope = self.get_json(&path).await?;
        Ok(envelope.application)
    }

    async fn query_instance(&self, instance_id: &str) -> TransportResult<Instance> {
        let path = format!("/instances/{}", instance_id);
        let envelope: InstanceEnvelope = self.get_json(&path).await?;
        Ok(envelope.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::PortInfo;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_instance() -> Instance {
        Instance {
            instance_id: "10.0.0.5:8080".to_string(),
            host_name: "10.0.0.5".to_string(),
            app: "orders".to_string(),
            ip_addr: "10.0.0.5".to_string(),
            status: InstanceStatus::Starting,
            vip_address: "orders".to_string(),
            secure_vip_address: "orders".to_string(),
            port: PortInfo::new(8080, true),
            secure_port: PortInfo::new(8443, false),
            home_page_url: String::new(),
            status_page_url: "http://10.0.0.5:8080/actuator/info".to_string(),
            health_check_url: "http://10.0.0.5:8080/actuator/health".to_string(),
            data_center_info: Default::default(),
            lease_info: Some(beacon_types::LeaseInfo::new(30, 90)),
            metadata: Default::default(),
            country_id: 0,
        }
    }

    #[tokio::test]
    async fn test_register_posts_envelope_to_uppercased_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/eureka/apps/ORDERS"))
            .and(body_partial_json(json!({"instance": {"app": "orders"}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            HttpRegistryTransport::new(&format!("{}/eureka/", server.uri())).unwrap();
        transport.register("orders", &test_instance()).await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_renews_with_up_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/eureka/apps/ORDERS/10.0.0.5:8080"))
            .and(query_param("status", "UP"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpRegistryTransport::new(&format!("{}/eureka", server.uri())).unwrap();
        transport.heartbeat("orders", "10.0.0.5:8080").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_status_targets_status_resource() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/eureka/apps/ORDERS/10.0.0.5:8080/status"))
            .and(query_param("value", "UP"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpRegistryTransport::new(&format!("{}/eureka", server.uri())).unwrap();
        transport
            .update_status("orders", "10.0.0.5:8080", InstanceStatus::Up)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_all_unwraps_nested_envelope() {
        let server = MockServer::start().await;
        let body = json!({
            "applications": {
                "application": [
                    {"name": "ORDERS", "instance": [serde_json::to_value(test_instance()).unwrap()]}
                ]
            }
        });
        Mock::given(method("GET"))
            .and(path("/eureka/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let transport = HttpRegistryTransport::new(&format!("{}/eureka", server.uri())).unwrap();
        let apps = transport.query_all().await.unwrap();

        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "ORDERS");
        assert_eq!(apps[0].instances[0].ip_addr, "10.0.0.5");
    }

    #[tokio::test]
    async fn test_query_instance_unwraps_envelope() {
        let server = MockServer::start().await;
        let body = json!({"instance": serde_json::to_value(test_instance()).unwrap()});
        Mock::given(method("GET"))
            .and(path("/eureka/instances/10.0.0.5:8080"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let transport = HttpRegistryTransport::new(&format!("{}/eureka", server.uri())).unwrap();
        let instance = transport.query_instance("10.0.0.5:8080").await.unwrap();
        assert_eq!(instance.instance_id, "10.0.0.5:8080");
    }

    #[tokio::test]
    async fn test_non_success_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eureka/apps/BILLING"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such app"))
            .mount(&server)
            .await;

        let transport = HttpRegistryTransport::new(&format!("{}/eureka", server.uri())).unwrap();
        let err = transport.query_by_app_id("billing").await.unwrap_err();

        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "no such app");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(matches!(
            HttpRegistryTransport::new("  "),
            Err(TransportError::Endpoint(_))
        ));
    }
}
