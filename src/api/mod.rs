//! Seams over the AWS control planes this crate drives.
//!
//! Each trait mirrors the raw service calls and speaks in crate-owned value
//! types, so handlers can be exercised against in-memory fakes. The SDK-backed
//! implementations live in [`sdk`].

use async_trait::async_trait;

use crate::error::ApiError;

pub mod sdk;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSetSummary {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSetParameter {
    pub key: String,
    pub value: String,
}

impl StackSetParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackSetDetails {
    pub template_body: Option<String>,
    pub parameters: Vec<StackSetParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Body(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSetDescriptor {
    pub name: String,
    pub description: String,
    pub template: Template,
    pub parameters: Vec<StackSetParameter>,
    pub administration_role_arn: String,
    pub execution_role_name: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPreferences {
    pub max_concurrent_percentage: i32,
    pub failure_tolerance_percentage: i32,
}

/// Accounts x regions to create or delete in one StackSet operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackInstanceTarget {
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
    pub preferences: OperationPreferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackInstanceSummary {
    pub account: String,
    pub region: String,
}

/// Identifier of an asynchronous StackSet operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Stopping,
    Stopped,
    Unknown(String),
}

#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    async fn list_stack_sets(&self) -> ApiResult<Vec<StackSetSummary>>;

    async fn describe_stack_set(&self, name: &str) -> ApiResult<StackSetDetails>;

    async fn create_stack_set(&self, descriptor: &StackSetDescriptor) -> ApiResult<()>;

    async fn create_stack_instances(
        &self,
        name: &str,
        target: &StackInstanceTarget,
    ) -> ApiResult<OperationHandle>;

    async fn delete_stack_instances(
        &self,
        name: &str,
        target: &StackInstanceTarget,
        retain_stacks: bool,
    ) -> ApiResult<OperationHandle>;

    async fn describe_stack_set_operation(
        &self,
        name: &str,
        operation: &OperationHandle,
    ) -> ApiResult<OperationStatus>;

    async fn list_stack_instances(&self, name: &str) -> ApiResult<Vec<StackInstanceSummary>>;

    async fn delete_stack_set(&self, name: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    async fn list_root_arns(&self) -> ApiResult<Vec<String>>;

    async fn organization_id(&self) -> ApiResult<String>;
}

#[async_trait]
pub trait ParameterStoreApi: Send + Sync {
    async fn list_parameter_names(&self) -> ApiResult<Vec<String>>;

    async fn get_parameter_value(&self, name: &str) -> ApiResult<String>;
}
