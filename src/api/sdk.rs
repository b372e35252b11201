use async_trait::async_trait;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{
    Capability, Parameter, StackSetOperationPreferences, StackSetOperationStatus,
};
use aws_smithy_runtime_api::client::result::SdkError;

use super::{
    ApiResult, CloudFormationApi, OperationHandle, OperationPreferences, OperationStatus,
    OrganizationsApi, ParameterStoreApi, StackInstanceSummary, StackInstanceTarget,
    StackSetDescriptor, StackSetDetails, StackSetParameter, StackSetSummary, Template,
};
use crate::error::ApiError;

/// Maps an SDK failure onto [`ApiError`] using the service error code.
fn classify<E, R>(context: &str, error: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = error
        .as_service_error()
        .and_then(|service_error| service_error.code())
        .map(String::from);
    let message = format!("{}: {}", context, DisplayErrorContext(&error));

    match code.as_deref() {
        Some("NameAlreadyExistsException") => ApiError::AlreadyExists(message),
        Some("StackSetNotFoundException")
        | Some("OperationNotFoundException")
        | Some("ParameterNotFound") => ApiError::NotFound(message),
        Some("OperationInProgressException")
        | Some("StaleRequestException")
        | Some("Throttling")
        | Some("ThrottlingException")
        | Some("TooManyRequestsException") => ApiError::Transient(message),
        Some(_) => ApiError::Fatal(message),
        // timeouts and dispatch failures never reached the service
        None if matches!(
            error,
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
        ) =>
        {
            ApiError::Transient(message)
        }
        None => ApiError::Fatal(message),
    }
}

fn to_sdk_preferences(preferences: &OperationPreferences) -> StackSetOperationPreferences {
    StackSetOperationPreferences::builder()
        .max_concurrent_percentage(preferences.max_concurrent_percentage)
        .failure_tolerance_percentage(preferences.failure_tolerance_percentage)
        .build()
}

#[derive(Debug, Clone)]
pub struct SdkCloudFormation {
    client: aws_sdk_cloudformation::Client,
}

impl SdkCloudFormation {
    pub fn new(client: aws_sdk_cloudformation::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CloudFormationApi for SdkCloudFormation {
    async fn list_stack_sets(&self) -> ApiResult<Vec<StackSetSummary>> {
        let summaries = self
            .client
            .list_stack_sets()
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListStackSets", e))?;

        Ok(summaries
            .iter()
            .filter_map(|summary| {
                Some(StackSetSummary {
                    name: summary.stack_set_name()?.to_owned(),
                    status: summary.status()?.as_str().to_owned(),
                })
            })
            .collect())
    }

    async fn describe_stack_set(&self, name: &str) -> ApiResult<StackSetDetails> {
        let output = self
            .client
            .describe_stack_set()
            .stack_set_name(name)
            .send()
            .await
            .map_err(|e| classify("DescribeStackSet", e))?;

        let stack_set = output
            .stack_set()
            .ok_or_else(|| ApiError::NotFound(format!("StackSet {} has no description", name)))?;

        Ok(StackSetDetails {
            template_body: stack_set.template_body().map(String::from),
            parameters: stack_set
                .parameters()
                .iter()
                .filter_map(|parameter| {
                    Some(StackSetParameter::new(
                        parameter.parameter_key()?,
                        parameter.parameter_value().unwrap_or_default(),
                    ))
                })
                .collect(),
        })
    }

    async fn create_stack_set(&self, descriptor: &StackSetDescriptor) -> ApiResult<()> {
        let (body, url) = match &descriptor.template {
            Template::Body(body) => (Some(body.clone()), None),
            Template::Url(url) => (None, Some(url.clone())),
        };
        let parameters = descriptor
            .parameters
            .iter()
            .map(|parameter| {
                Parameter::builder()
                    .parameter_key(&parameter.key)
                    .parameter_value(&parameter.value)
                    .build()
            })
            .collect();
        let capabilities = descriptor
            .capabilities
            .iter()
            .map(|capability| Capability::from(capability.as_str()))
            .collect();

        self.client
            .create_stack_set()
            .stack_set_name(&descriptor.name)
            .description(&descriptor.description)
            .set_template_body(body)
            .set_template_url(url)
            .set_parameters(Some(parameters))
            .administration_role_arn(&descriptor.administration_role_arn)
            .execution_role_name(&descriptor.execution_role_name)
            .set_capabilities(Some(capabilities))
            .send()
            .await
            .map_err(|e| classify("CreateStackSet", e))?;

        Ok(())
    }

    async fn create_stack_instances(
        &self,
        name: &str,
        target: &StackInstanceTarget,
    ) -> ApiResult<OperationHandle> {
        let output = self
            .client
            .create_stack_instances()
            .stack_set_name(name)
            .set_accounts(Some(target.accounts.clone()))
            .set_regions(Some(target.regions.clone()))
            .operation_preferences(to_sdk_preferences(&target.preferences))
            .send()
            .await
            .map_err(|e| classify("CreateStackInstances", e))?;

        output
            .operation_id()
            .map(|id| OperationHandle(id.to_owned()))
            .ok_or_else(|| ApiError::Fatal(String::from("CreateStackInstances: no operation id")))
    }

    async fn delete_stack_instances(
        &self,
        name: &str,
        target: &StackInstanceTarget,
        retain_stacks: bool,
    ) -> ApiResult<OperationHandle> {
        let output = self
            .client
            .delete_stack_instances()
            .stack_set_name(name)
            .set_accounts(Some(target.accounts.clone()))
            .set_regions(Some(target.regions.clone()))
            .retain_stacks(retain_stacks)
            .operation_preferences(to_sdk_preferences(&target.preferences))
            .send()
            .await
            .map_err(|e| classify("DeleteStackInstances", e))?;

        output
            .operation_id()
            .map(|id| OperationHandle(id.to_owned()))
            .ok_or_else(|| ApiError::Fatal(String::from("DeleteStackInstances: no operation id")))
    }

    async fn describe_stack_set_operation(
        &self,
        name: &str,
        operation: &OperationHandle,
    ) -> ApiResult<OperationStatus> {
        let output = self
            .client
            .describe_stack_set_operation()
            .stack_set_name(name)
            .operation_id(&operation.0)
            .send()
            .await
            .map_err(|e| classify("DescribeStackSetOperation", e))?;

        let status = output
            .stack_set_operation()
            .and_then(|operation| operation.status());

        Ok(match status {
            Some(StackSetOperationStatus::Queued) => OperationStatus::Queued,
            Some(StackSetOperationStatus::Running) => OperationStatus::Running,
            Some(StackSetOperationStatus::Succeeded) => OperationStatus::Succeeded,
            Some(StackSetOperationStatus::Failed) => OperationStatus::Failed,
            Some(StackSetOperationStatus::Stopping) => OperationStatus::Stopping,
            Some(StackSetOperationStatus::Stopped) => OperationStatus::Stopped,
            Some(other) => OperationStatus::Unknown(other.as_str().to_owned()),
            None => OperationStatus::Unknown(String::from("UNKNOWN")),
        })
    }

    async fn list_stack_instances(&self, name: &str) -> ApiResult<Vec<StackInstanceSummary>> {
        let summaries = self
            .client
            .list_stack_instances()
            .stack_set_name(name)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListStackInstances", e))?;

        Ok(summaries
            .iter()
            .filter_map(|summary| {
                Some(StackInstanceSummary {
                    account: summary.account()?.to_owned(),
                    region: summary.region()?.to_owned(),
                })
            })
            .collect())
    }

    async fn delete_stack_set(&self, name: &str) -> ApiResult<()> {
        self.client
            .delete_stack_set()
            .stack_set_name(name)
            .send()
            .await
            .map_err(|e| classify("DeleteStackSet", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SdkOrganizations {
    client: aws_sdk_organizations::Client,
}

impl SdkOrganizations {
    pub fn new(client: aws_sdk_organizations::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrganizationsApi for SdkOrganizations {
    async fn list_root_arns(&self) -> ApiResult<Vec<String>> {
        let output = self
            .client
            .list_roots()
            .send()
            .await
            .map_err(|e| classify("ListRoots", e))?;

        Ok(output
            .roots()
            .iter()
            .filter_map(|root| root.arn().map(String::from))
            .collect())
    }

    async fn organization_id(&self) -> ApiResult<String> {
        let output = self
            .client
            .describe_organization()
            .send()
            .await
            .map_err(|e| classify("DescribeOrganization", e))?;

        output
            .organization()
            .and_then(|organization| organization.id())
            .map(String::from)
            .ok_or_else(|| ApiError::NotFound(String::from("DescribeOrganization: no id")))
    }
}

#[derive(Debug, Clone)]
pub struct SdkParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SdkParameterStore {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStoreApi for SdkParameterStore {
    async fn list_parameter_names(&self) -> ApiResult<Vec<String>> {
        let pages = self
            .client
            .describe_parameters()
            .into_paginator()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("DescribeParameters", e))?;

        Ok(pages
            .iter()
            .flat_map(|page| page.parameters())
            .filter_map(|parameter| parameter.name().map(String::from))
            .collect())
    }

    async fn get_parameter_value(&self, name: &str) -> ApiResult<String> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| classify("GetParameter", e))?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(String::from)
            .ok_or_else(|| ApiError::NotFound(format!("Parameter {} has no value", name)))
    }
}
