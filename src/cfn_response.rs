//! CloudFormation custom resource request and acknowledgment.
//!
//! The stack waits on the pre-signed `ResponseURL` until it receives exactly
//! one SUCCESS or FAILED document.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::ResponseError;

pub const PHYSICAL_RESOURCE_ID: &str = "CustomResourcePhysicalID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceRequest {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

impl ResponseStatus {
    pub fn from_outcome(succeeded: bool) -> Self {
        if succeeded {
            ResponseStatus::Success
        } else {
            ResponseStatus::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: Map<String, Value>,
}

impl CustomResourceResponse {
    pub fn new(request: &CustomResourceRequest, status: ResponseStatus, log_stream: &str) -> Self {
        Self {
            status,
            reason: format!("See the details in CloudWatch Log Stream: {}", log_stream),
            physical_resource_id: String::from(PHYSICAL_RESOURCE_ID),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            no_echo: false,
            data: Map::new(),
        }
    }
}

#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(
        &self,
        response_url: &str,
        response: &CustomResourceResponse,
    ) -> Result<(), ResponseError>;
}

/// Uploads the response document with an HTTP PUT.
#[derive(Debug, Clone, Default)]
pub struct HttpResponseSender {
    client: reqwest::Client,
}

impl HttpResponseSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn send(
        &self,
        response_url: &str,
        response: &CustomResourceResponse,
    ) -> Result<(), ResponseError> {
        let body = serde_json::to_string(response)?;
        info!("Response body: {}", body);

        // the pre-signed URL is signed without a content type
        let result = self
            .client
            .put(response_url)
            .header(CONTENT_TYPE, "")
            .body(body)
            .send()
            .await
            .and_then(|reply| reply.error_for_status())
            .map_err(|e| ResponseError::Delivery(e.to_string()))?;

        info!("Status code: {}", result.status());
        Ok(())
    }
}
