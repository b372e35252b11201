//! Control Tower lifecycle events delivered through SQS.
//!
//! A successful `CreateManagedAccount` adds the new account to the extended
//! Config StackSet in every region listed in Parameter Store. Everything else
//! is logged and dropped.

use aws_lambda_events::sqs::SqsEvent;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::api::{CloudFormationApi, ParameterStoreApi};
use crate::config::LifecycleConfig;
use crate::error::EventError;
use crate::parameters;
use crate::stackset::StackSetClient;

pub const CREATE_MANAGED_ACCOUNT: &str = "CreateManagedAccount";
pub const SUCCEEDED: &str = "SUCCEEDED";

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleMessage {
    pub detail: LifecycleDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleDetail {
    pub event_name: String,
    #[serde(default)]
    pub service_event_details: Option<ServiceEventDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEventDetails {
    #[serde(default)]
    pub create_managed_account_status: Option<CreateManagedAccountStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateManagedAccountStatus {
    pub state: String,
    #[serde(default)]
    pub account: Option<ManagedAccount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedAccount {
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    AddAccount(String),
    Ignore(String),
}

impl LifecycleMessage {
    pub fn parse(body: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn action(&self) -> LifecycleAction {
        if self.detail.event_name != CREATE_MANAGED_ACCOUNT {
            return LifecycleAction::Ignore(format!(
                "unexpected lifecycle event {}",
                self.detail.event_name
            ));
        }

        let status = self
            .detail
            .service_event_details
            .as_ref()
            .and_then(|details| details.create_managed_account_status.as_ref());
        match status {
            Some(status) if status.state == SUCCEEDED => match &status.account {
                Some(account) => LifecycleAction::AddAccount(account.account_id.clone()),
                None => LifecycleAction::Ignore(String::from("successful event without account")),
            },
            Some(status) => LifecycleAction::Ignore(format!("account creation {}", status.state)),
            None => LifecycleAction::Ignore(String::from("no account creation status")),
        }
    }
}

/// Body of the first queued message.
pub fn first_message_body(event: &SqsEvent) -> Result<Option<&str>, EventError> {
    match event.records.first() {
        Some(record) => record
            .body
            .as_deref()
            .map(Some)
            .ok_or(EventError::MissingBody),
        None => Ok(None),
    }
}

pub async fn handle_lifecycle_event<C, P>(
    event: &SqsEvent,
    config: &LifecycleConfig,
    stack_sets: &StackSetClient<C>,
    parameter_store: &P,
) -> Result<(), EventError>
where
    C: CloudFormationApi,
    P: ParameterStoreApi,
{
    let Some(body) = first_message_body(event)? else {
        warn!("No queued records in event");
        return Ok(());
    };
    handle_lifecycle_message(body, config, stack_sets, parameter_store).await
}

pub async fn handle_lifecycle_message<C, P>(
    body: &str,
    config: &LifecycleConfig,
    stack_sets: &StackSetClient<C>,
    parameter_store: &P,
) -> Result<(), EventError>
where
    C: CloudFormationApi,
    P: ParameterStoreApi,
{
    let message = LifecycleMessage::parse(body)?;

    let account_id = match message.action() {
        LifecycleAction::AddAccount(account_id) => account_id,
        LifecycleAction::Ignore(reason) => {
            info!("Skipping lifecycle event: {}", reason);
            return Ok(());
        }
    };
    info!("Successful account creation received: {}", account_id);

    let regions = parameters::region_list(parameter_store, &config.regions_parameter).await;
    if regions.is_empty() {
        error!(
            "No regions found in {}, account {} not added",
            config.regions_parameter, account_id
        );
        return Ok(());
    }

    let accounts = [account_id];
    match stack_sets
        .add_stack_instances(&config.stack_set_name, &accounts, &regions)
        .await
    {
        Some(operation) => {
            if stack_sets
                .poll_operation(&config.stack_set_name, &operation)
                .await
            {
                info!("Account {} added to {}", accounts[0], config.stack_set_name);
            } else {
                error!(
                    "Adding account {} to {} did not complete",
                    accounts[0], config.stack_set_name
                );
            }
        }
        None => error!(
            "Unable to add account {} to {}",
            accounts[0], config.stack_set_name
        ),
    }

    Ok(())
}
