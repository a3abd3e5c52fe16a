//! Azure Resource Manager REST backend.
//!
//! Implements [`ResourceManager`] over `reqwest`:
//! - Requests are sent to `{endpoint}{resource id}?api-version=...` with a bearer token
//! - Submissions read the `Azure-AsyncOperation` and `Location` headers to decide how
//!   the outcome is polled
//! - Without either header the resource's `provisioningState` is polled

use super::credential::MANAGEMENT_SCOPE;
use super::ResourceManager;
use crate::config::ResourceIdentity;
use crate::error::{decode_str, Error, Result};
use crate::models::{
    LongRunningOperation, OperationAction, OperationState, PollTarget, ResourceKind,
};
use async_trait::async_trait;
use colored::Colorize;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Public-cloud management endpoint.
pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Upper bound on one HTTP request to the management endpoint.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

const HEADER_ASYNC_OPERATION: &str = "azure-asyncoperation";
const HEADER_LOCATION: &str = "location";
const HEADER_REQUEST_ID: &str = "x-ms-request-id";

/// `{"error": {"code": ..., "message": ...}}` body returned on failures.
#[derive(Debug, Default, Deserialize)]
struct CloudError {
    #[serde(default)]
    error: CloudErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct CloudErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl CloudErrorBody {
    fn describe(&self, status: &str) -> String {
        match (self.code.is_empty(), self.message.is_empty()) {
            (true, true) => status.to_string(),
            (false, true) => self.code.clone(),
            (true, false) => self.message.clone(),
            (false, false) => format!("{}: {}", self.code, self.message),
        }
    }
}

/// Document served by an `Azure-AsyncOperation` URL.
#[derive(Debug, Deserialize)]
struct AsyncOperationStatus {
    status: String,
    #[serde(default)]
    error: Option<CloudErrorBody>,
}

/// Client for the ARM REST API.
pub struct ArmClient {
    identity: ResourceIdentity,
    endpoint: String,
    http: Client,
}

impl ArmClient {
    pub fn new(identity: ResourceIdentity) -> Self {
        Self::with_endpoint(identity, MANAGEMENT_ENDPOINT)
    }

    /// Point the client at another endpoint (sovereign clouds, mock servers).
    pub fn with_endpoint(identity: ResourceIdentity, endpoint: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("falling back to a default HTTP client: {e}");
                Client::new()
            });
        ArmClient {
            identity,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn resource_path(&self, kind: ResourceKind, name: &str) -> Result<String> {
        kind.resource_path(
            self.identity.subscription_id(),
            self.identity.resource_group_name(),
            self.identity.storage_account(),
            name,
        )
    }

    fn resource_url(&self, kind: ResourceKind, name: &str) -> Result<String> {
        Ok(format!(
            "{}{}?api-version={}",
            self.endpoint,
            self.resource_path(kind, name)?,
            kind.api_version()
        ))
    }

    fn action_url(&self, kind: ResourceKind, name: &str, action: &str) -> Result<String> {
        Ok(format!(
            "{}{}/{action}?api-version={}",
            self.endpoint,
            self.resource_path(kind, name)?,
            kind.api_version()
        ))
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let token = self
            .identity
            .authorizer()
            .bearer_token(MANAGEMENT_SCOPE)
            .await?;
        log::debug!("{} {}", method.as_str().on_blue(), url);
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Turn an accepted submission into an operation handle.
    async fn accept(
        &self,
        kind: ResourceKind,
        name: &str,
        action: OperationAction,
        response: Response,
    ) -> Result<LongRunningOperation> {
        let status = response.status();
        let request_id = header(&response, HEADER_REQUEST_ID).unwrap_or_default();

        if !status.is_success() {
            if action == OperationAction::Delete && status == StatusCode::NOT_FOUND {
                return Ok(LongRunningOperation::finished(
                    kind,
                    name,
                    action,
                    &request_id,
                    OperationState::Succeeded,
                ));
            }
            let message = error_message(status, &response.text().await.unwrap_or_default());
            return Err(Error::submission(kind, name, message));
        }

        if let Some(url) = header(&response, HEADER_ASYNC_OPERATION) {
            return Ok(LongRunningOperation::pending(
                kind,
                name,
                action,
                &request_id,
                PollTarget::AsyncOperation(url),
            ));
        }
        if status == StatusCode::ACCEPTED {
            let poll = match header(&response, HEADER_LOCATION) {
                Some(url) => PollTarget::Location(url),
                None => PollTarget::ProvisioningState,
            };
            return Ok(LongRunningOperation::pending(
                kind,
                name,
                action,
                &request_id,
                poll,
            ));
        }
        if status == StatusCode::NO_CONTENT || action != OperationAction::CreateOrUpdate {
            return Ok(LongRunningOperation::finished(
                kind,
                name,
                action,
                &request_id,
                OperationState::Succeeded,
            ));
        }

        // 200/201 on a PUT: the body tells whether provisioning is already done.
        let text = response.text().await?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            decode_str(&text)?
        };
        match provisioning_state(&body) {
            Some(state) if state.is_terminal() => Ok(LongRunningOperation::finished(
                kind,
                name,
                action,
                &request_id,
                state,
            )),
            _ => Ok(LongRunningOperation::pending(
                kind,
                name,
                action,
                &request_id,
                PollTarget::ProvisioningState,
            )),
        }
    }

    async fn poll_async_operation(
        &self,
        operation: &LongRunningOperation,
        url: &str,
    ) -> Result<OperationState> {
        let response = self.send(Method::GET, url, None).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::operation_failed(
                operation.kind,
                &operation.resource_name,
                error_message(status, &text),
            ));
        }
        let document: AsyncOperationStatus = decode_str(&text)?;
        Ok(match document.status.as_str() {
            "Succeeded" => OperationState::Succeeded,
            "Failed" | "Canceled" => OperationState::Failed(
                document
                    .error
                    .map(|e| e.describe(&document.status))
                    .unwrap_or(document.status),
            ),
            _ => OperationState::Pending,
        })
    }

    async fn poll_location(
        &self,
        operation: &LongRunningOperation,
        url: &str,
    ) -> Result<OperationState> {
        let response = self.send(Method::GET, url, None).await?;
        let status = response.status();
        match status {
            StatusCode::ACCEPTED => Ok(OperationState::Pending),
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                Ok(OperationState::Succeeded)
            }
            StatusCode::NOT_FOUND if operation.action == OperationAction::Delete => {
                Ok(OperationState::Succeeded)
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Ok(OperationState::Failed(error_message(status, &text)))
            }
        }
    }

    async fn poll_provisioning_state(
        &self,
        operation: &LongRunningOperation,
    ) -> Result<OperationState> {
        let resource = self.get(operation.kind, &operation.resource_name).await?;
        Ok(match (resource, &operation.action) {
            (None, OperationAction::Delete) => OperationState::Succeeded,
            (None, _) => OperationState::Failed("resource no longer exists".to_string()),
            (Some(_), OperationAction::Delete) => OperationState::Pending,
            (Some(body), _) => provisioning_state(&body).unwrap_or(OperationState::Succeeded),
        })
    }
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn error_message(status: StatusCode, text: &str) -> String {
    let parsed: CloudError = serde_json::from_str(text).unwrap_or_default();
    parsed.error.describe(&status.to_string())
}

/// Map `properties.provisioningState` to an operation state.
fn provisioning_state(body: &Value) -> Option<OperationState> {
    let state = body
        .pointer("/properties/provisioningState")
        .and_then(Value::as_str)?;
    Some(match state {
        "Succeeded" => OperationState::Succeeded,
        "Failed" | "Canceled" => OperationState::Failed(format!("provisioningState {state}")),
        _ => OperationState::Pending,
    })
}

#[async_trait]
impl ResourceManager for ArmClient {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Option<Value>> {
        let url = self.resource_url(kind, name)?;
        let response = self.send(Method::GET, &url, None).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::submission(kind, name, error_message(status, &text)));
        }
        Ok(Some(decode_str(&text)?))
    }

    async fn begin_create_or_update(
        &self,
        kind: ResourceKind,
        name: &str,
        body: Value,
    ) -> Result<LongRunningOperation> {
        let url = self.resource_url(kind, name)?;
        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        self.accept(kind, name, OperationAction::CreateOrUpdate, response)
            .await
    }

    async fn begin_delete(&self, kind: ResourceKind, name: &str) -> Result<LongRunningOperation> {
        let url = self.resource_url(kind, name)?;
        let response = self.send(Method::DELETE, &url, None).await?;
        self.accept(kind, name, OperationAction::Delete, response)
            .await
    }

    async fn begin_action(
        &self,
        kind: ResourceKind,
        name: &str,
        action: &str,
        body: Value,
    ) -> Result<LongRunningOperation> {
        let url = self.action_url(kind, name, action)?;
        let response = self.send(Method::POST, &url, Some(&body)).await?;
        self.accept(
            kind,
            name,
            OperationAction::Action(action.to_string()),
            response,
        )
        .await
    }

    async fn poll(&self, operation: &LongRunningOperation) -> Result<OperationState> {
        match &operation.poll {
            PollTarget::Completed => Ok(operation.state.clone()),
            PollTarget::AsyncOperation(url) => self.poll_async_operation(operation, url).await,
            PollTarget::Location(url) => self.poll_location(operation, url).await,
            PollTarget::ProvisioningState => self.poll_provisioning_state(operation).await,
        }
    }
}
