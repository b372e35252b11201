//! Custom resource handler that provisions the extended-region StackSets.
//!
//! Create clones the Control Tower baseline Config StackSet into a new
//! StackSet and, optionally, deploys the conformance-pack bucket StackSet
//! into the log-archive account. Delete tears both down. Update is not
//! reconciled: changing the region list or any other setting on an existing
//! deployment leaves the StackSets as they are.

use tracing::{error, info, warn};

use crate::api::{
    CloudFormationApi, OrganizationsApi, StackSetDescriptor, StackSetParameter, Template,
};
use crate::cfn_response::{
    CustomResourceRequest, CustomResourceResponse, RequestType, ResponseSender, ResponseStatus,
};
use crate::config::{DeployScope, ProvisioningConfig};
use crate::error::{ConfigError, ResponseError};
use crate::organization;
use crate::stackset::StackSetClient;

pub const BASELINE_CONFIG_STACK_SET: &str = "AWSControlTowerBP-BASELINE-CONFIG";
pub const CONFORMANCE_PACK_TEMPLATE_URL: &str =
    "https://marketplace-sa-resources-ct-us-east-2.s3.us-east-2.amazonaws.com/ConformsBucket.yaml";

/// Runs the request and acknowledges it exactly once, whatever the outcome.
pub async fn handle_provisioning_event<C, O, S>(
    request: &CustomResourceRequest,
    config: Result<ProvisioningConfig, ConfigError>,
    stack_sets: &StackSetClient<C>,
    organizations: &O,
    sender: &S,
    log_stream: &str,
) -> Result<ResponseStatus, ResponseError>
where
    C: CloudFormationApi,
    O: OrganizationsApi,
    S: ResponseSender,
{
    let succeeded = match (request.request_type, config) {
        (RequestType::Update, _) => {
            warn!("Update requests are not reconciled, existing StackSets are left unchanged");
            true
        }
        (_, Err(e)) => {
            error!("Invalid configuration: {}", e);
            false
        }
        (RequestType::Create, Ok(config)) => create(&config, stack_sets, organizations).await,
        (RequestType::Delete, Ok(config)) => delete(&config, stack_sets).await,
    };

    let status = ResponseStatus::from_outcome(succeeded);
    let response = CustomResourceResponse::new(request, status, log_stream);
    sender.send(&request.response_url, &response).await?;
    Ok(status)
}

async fn create<C, O>(
    config: &ProvisioningConfig,
    stack_sets: &StackSetClient<C>,
    organizations: &O,
) -> bool
where
    C: CloudFormationApi,
    O: OrganizationsApi,
{
    let admin_role_arn = match organization::administration_role_arn(organizations).await {
        Ok(arn) => arn,
        Err(e) => {
            error!("Only run on the organization root: {}", e);
            return false;
        }
    };

    let config_deployed = deploy_config_stack_set(config, stack_sets, &admin_role_arn).await;
    info!("Config StackSet deployed: {}", config_deployed);

    let conformance_pack_deployed = if !config.conformance_pack_enabled {
        info!("Conformance pack deployment is disabled");
        true
    } else if !config_deployed {
        error!("Skipping conformance pack, Config StackSet deployment failed");
        false
    } else {
        deploy_conformance_pack_stack_set(config, stack_sets, organizations, &admin_role_arn).await
    };

    config_deployed && conformance_pack_deployed
}

async fn delete<C: CloudFormationApi>(
    config: &ProvisioningConfig,
    stack_sets: &StackSetClient<C>,
) -> bool {
    let config_deleted = stack_sets
        .delete_entire_stack_set(&config.stack_set_name)
        .await;
    let conformance_pack_deleted = stack_sets
        .delete_entire_stack_set(&config.conformance_pack_stack_set_name())
        .await;

    config_deleted && conformance_pack_deleted
}

/// Clones the baseline Config StackSet and fans it out to the accounts the
/// baseline already covers, unless only future accounts were requested.
pub async fn deploy_config_stack_set<C: CloudFormationApi>(
    config: &ProvisioningConfig,
    stack_sets: &StackSetClient<C>,
    admin_role_arn: &str,
) -> bool {
    if !stack_sets.stack_set_exists(BASELINE_CONFIG_STACK_SET).await {
        error!("Baseline StackSet {} not found", BASELINE_CONFIG_STACK_SET);
        return false;
    }

    let accounts = stack_sets
        .list_instance_accounts(BASELINE_CONFIG_STACK_SET)
        .await;
    info!("Accounts in the baseline: {:?}", accounts);

    let Some(body) = stack_sets.get_stack_set_body(BASELINE_CONFIG_STACK_SET).await else {
        return false;
    };
    let Some(parameters) = stack_sets
        .get_stack_set_parameters(BASELINE_CONFIG_STACK_SET)
        .await
    else {
        return false;
    };
    info!("Config parameters: {:?}", parameters);

    let descriptor = StackSetDescriptor::control_tower(
        config.stack_set_name.as_str(),
        Template::Body(body),
        parameters,
        admin_role_arn,
    );
    if !stack_sets.create_stack_set(&descriptor).await {
        return false;
    }

    match config.deploy_scope {
        DeployScope::FutureOnly => {
            info!("Skipping current accounts, deploying to future accounts only");
            true
        }
        DeployScope::ExistingAndFuture if accounts.is_empty() => {
            warn!("No existing accounts to deploy to");
            true
        }
        DeployScope::ExistingAndFuture => {
            match stack_sets
                .add_stack_instances(&config.stack_set_name, &accounts, &config.regions)
                .await
            {
                Some(operation) => {
                    info!("Operation ID: {}", operation);
                    stack_sets
                        .poll_operation(&config.stack_set_name, &operation)
                        .await
                }
                None => false,
            }
        }
    }
}

/// Creates the conformance-pack bucket StackSet and deploys it to the
/// log-archive account in this region.
pub async fn deploy_conformance_pack_stack_set<C, O>(
    config: &ProvisioningConfig,
    stack_sets: &StackSetClient<C>,
    organizations: &O,
    admin_role_arn: &str,
) -> bool
where
    C: CloudFormationApi,
    O: OrganizationsApi,
{
    let Some(organization_id) = organization::organization_id(organizations).await else {
        return false;
    };

    let name = config.conformance_pack_stack_set_name();
    let descriptor = StackSetDescriptor::control_tower(
        name.as_str(),
        Template::Url(String::from(CONFORMANCE_PACK_TEMPLATE_URL)),
        vec![
            StackSetParameter::new("OrgId", organization_id),
            StackSetParameter::new("SSEAlgorithm", config.sse_algorithm.as_str()),
            StackSetParameter::new("KMSMasterKeyID", config.kms_key_id.as_str()),
        ],
        admin_role_arn,
    );
    let created = stack_sets.create_stack_set(&descriptor).await;
    info!("Conformance pack StackSet created: {}", created);
    if !created {
        return false;
    }

    let accounts = [config.log_archive_account_id.clone()];
    let regions = [config.home_region.clone()];
    match stack_sets.add_stack_instances(&name, &accounts, &regions).await {
        Some(operation) => {
            info!("Operation ID: {}", operation);
            stack_sets.poll_operation(&name, &operation).await
        }
        None => false,
    }
}
