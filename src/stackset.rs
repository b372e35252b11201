//! StackSet lifecycle operations shared by both handlers.
//!
//! Every operation logs its own failures and hands back a sentinel (`bool` or
//! `Option`), so a handler only decides whether the overall invocation
//! succeeded.

use std::collections::HashSet;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::{
    CloudFormationApi, OperationHandle, OperationPreferences, StackInstanceSummary,
    StackInstanceTarget, StackSetDescriptor, StackSetParameter, Template,
};
use crate::error::ApiError;
use crate::poll::{transition, PollSettings, PollState};

pub const ACTIVE: &str = "ACTIVE";
pub const EXECUTION_ROLE_NAME: &str = "AWSControlTowerExecution";
pub const STACK_SET_DESCRIPTION: &str = "Enable Config in additional regions";
pub const CAPABILITIES: [&str; 3] = [
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

pub const PROVISIONING_FAILURE_TOLERANCE: i32 = 50;
pub const LIFECYCLE_FAILURE_TOLERANCE: i32 = 20;
const DELETE_PREFERENCES: OperationPreferences = OperationPreferences {
    max_concurrent_percentage: 100,
    failure_tolerance_percentage: 50,
};

impl StackSetDescriptor {
    /// A StackSet administered by the Control Tower StackSet role and executed
    /// through `AWSControlTowerExecution` in each target account.
    pub fn control_tower(
        name: impl Into<String>,
        template: Template,
        parameters: Vec<StackSetParameter>,
        administration_role_arn: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::from(STACK_SET_DESCRIPTION),
            template,
            parameters,
            administration_role_arn: administration_role_arn.into(),
            execution_role_name: String::from(EXECUTION_ROLE_NAME),
            capabilities: CAPABILITIES.iter().map(|c| String::from(*c)).collect(),
        }
    }
}

pub struct StackSetClient<C> {
    api: C,
    failure_tolerance_percentage: i32,
    poll: PollSettings,
}

impl<C: CloudFormationApi> StackSetClient<C> {
    pub fn new(api: C) -> Self {
        Self {
            api,
            failure_tolerance_percentage: PROVISIONING_FAILURE_TOLERANCE,
            poll: PollSettings::default(),
        }
    }

    pub fn with_failure_tolerance(mut self, percentage: i32) -> Self {
        self.failure_tolerance_percentage = percentage;
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    /// Names of the StackSets in `status`. Listing failures yield an empty list.
    pub async fn list_stack_sets(&self, status: &str) -> Vec<String> {
        match self.api.list_stack_sets().await {
            Ok(summaries) => summaries
                .into_iter()
                .filter(|summary| summary.status == status)
                .map(|summary| summary.name)
                .collect(),
            Err(e) => {
                error!("Unable to list StackSets: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn stack_set_exists(&self, name: &str) -> bool {
        let exists = self
            .list_stack_sets(ACTIVE)
            .await
            .iter()
            .any(|active| active == name);
        if !exists {
            warn!("StackSet not found: {}", name);
        }
        exists
    }

    pub async fn get_stack_set_body(&self, name: &str) -> Option<String> {
        match self.api.describe_stack_set(name).await {
            Ok(details) => {
                if details.template_body.is_none() {
                    error!("StackSet {} has no template body", name);
                }
                details.template_body
            }
            Err(e) => {
                error!("Unable to get template body of {}: {}", name, e);
                None
            }
        }
    }

    pub async fn get_stack_set_parameters(&self, name: &str) -> Option<Vec<StackSetParameter>> {
        match self.api.describe_stack_set(name).await {
            Ok(details) => Some(details.parameters),
            Err(e) => {
                error!("Unable to get parameters of {}: {}", name, e);
                None
            }
        }
    }

    /// Creates the StackSet unless an active one of that name already exists.
    pub async fn create_stack_set(&self, descriptor: &StackSetDescriptor) -> bool {
        let active = self.list_stack_sets(ACTIVE).await;
        if active.iter().any(|name| *name == descriptor.name) {
            info!("StackSet {} already exists", descriptor.name);
            return true;
        }

        info!("Creating StackSet: {}", descriptor.name);
        match self.api.create_stack_set(descriptor).await {
            Ok(()) => true,
            Err(ApiError::AlreadyExists(message)) => {
                warn!("StackSet {} already exists: {}", descriptor.name, message);
                true
            }
            Err(e) => {
                error!("Unable to create StackSet {}: {}", descriptor.name, e);
                false
            }
        }
    }

    /// Starts creating instances across `accounts` x `regions`.
    pub async fn add_stack_instances(
        &self,
        name: &str,
        accounts: &[String],
        regions: &[String],
    ) -> Option<OperationHandle> {
        if accounts.is_empty() || regions.is_empty() {
            warn!(
                "Nothing to add to {}: accounts {:?}, regions {:?}",
                name, accounts, regions
            );
            return None;
        }
        if !self.stack_set_exists(name).await {
            error!("StackSet {} does not exist", name);
            return None;
        }

        let target = StackInstanceTarget {
            accounts: accounts.to_vec(),
            regions: regions.to_vec(),
            preferences: OperationPreferences {
                max_concurrent_percentage: 100,
                failure_tolerance_percentage: self.failure_tolerance_percentage,
            },
        };
        info!(
            "Adding stack instances to {}: regions {:?}, accounts {:?}",
            name, regions, accounts
        );
        match self.api.create_stack_instances(name, &target).await {
            Ok(handle) => Some(handle),
            Err(ApiError::Transient(message)) => {
                error!("StackSet {} is busy, instances not added: {}", name, message);
                None
            }
            Err(e) => {
                error!("Unable to add stack instances to {}: {}", name, e);
                None
            }
        }
    }

    /// Returns whether the deletion was accepted, not whether it finished.
    pub async fn delete_stack_instances(
        &self,
        name: &str,
        accounts: &[String],
        regions: &[String],
        retain_stacks: bool,
    ) -> bool {
        let target = StackInstanceTarget {
            accounts: accounts.to_vec(),
            regions: regions.to_vec(),
            preferences: DELETE_PREFERENCES,
        };
        match self
            .api
            .delete_stack_instances(name, &target, retain_stacks)
            .await
        {
            Ok(handle) => {
                info!("Deleting stack instances of {}: operation {}", name, handle);
                true
            }
            Err(e) => {
                error!("Unable to delete stack instances of {}: {}", name, e);
                false
            }
        }
    }

    /// Waits for `operation` to finish. True only if it succeeded within the
    /// attempt budget.
    pub async fn poll_operation(&self, name: &str, operation: &OperationHandle) -> bool {
        let mut remaining = self.poll.max_attempts;

        while remaining > 0 {
            remaining -= 1;
            let status = match self.api.describe_stack_set_operation(name, operation).await {
                Ok(status) => status,
                Err(e) => {
                    error!("StackSet operation check failed: {}", e);
                    return false;
                }
            };

            let step = transition(&status, remaining);
            match step.state {
                PollState::Succeeded => {
                    info!("StackSet operation {} completed", operation);
                    return true;
                }
                PollState::Failed => {
                    error!("StackSet operation {} ended with {:?}", operation, status);
                    return false;
                }
                PollState::TimedOut => {
                    error!("StackSet operation {} still {:?}, giving up", operation, status);
                    return false;
                }
                PollState::Running => {}
            }

            if step.should_sleep {
                info!(
                    "StackSet operation {:?}, waiting for {} sec",
                    status,
                    self.poll.interval.as_secs()
                );
                sleep(self.poll.interval).await;
            }
        }

        false
    }

    pub async fn list_all_stack_instances(&self, name: &str) -> Vec<StackInstanceSummary> {
        if !self.stack_set_exists(name).await {
            error!("StackSet {} not found, no instances to list", name);
            return Vec::new();
        }

        match self.api.list_stack_instances(name).await {
            Ok(instances) => instances,
            Err(e) => {
                error!("Unable to list stack instances of {}: {}", name, e);
                Vec::new()
            }
        }
    }

    /// Distinct accounts that hold an instance of `name`, in listing order.
    pub async fn list_instance_accounts(&self, name: &str) -> Vec<String> {
        let instances = self.list_all_stack_instances(name).await;
        unique(instances.into_iter().map(|instance| instance.account))
    }

    /// Removes every instance, waits for them to drain and deletes the StackSet.
    ///
    /// A StackSet that was never created settles as success on the final
    /// delete call, which reports it as not found.
    pub async fn delete_entire_stack_set(&self, name: &str) -> bool {
        let instances = self.list_all_stack_instances(name).await;
        let accounts = unique(instances.iter().map(|instance| instance.account.clone()));
        let regions = unique(instances.iter().map(|instance| instance.region.clone()));

        let accepted = if accounts.is_empty() || regions.is_empty() {
            warn!("No stack instances found in {}", name);
            true
        } else {
            self.delete_stack_instances(name, &accounts, &regions, false)
                .await
        };
        if !accepted || !self.wait_for_instances_drained(name).await {
            return false;
        }

        info!("Deleting the StackSet: {}", name);
        match self.api.delete_stack_set(name).await {
            Ok(()) => true,
            Err(ApiError::NotFound(message)) => {
                warn!("StackSet {} already deleted: {}", name, message);
                true
            }
            Err(e) => {
                error!("Unable to delete the StackSet {}: {}", name, e);
                false
            }
        }
    }

    async fn wait_for_instances_drained(&self, name: &str) -> bool {
        let mut remaining = self.poll.max_attempts;
        let mut count = self.list_all_stack_instances(name).await.len();

        while count > 0 {
            if remaining == 0 {
                error!("Failed to delete {} stack instances of {}, timing out", count, name);
                return false;
            }
            info!(
                "{} stack instances to be deleted, sleeping for {} sec",
                count,
                self.poll.interval.as_secs()
            );
            sleep(self.poll.interval).await;
            remaining -= 1;
            count = self.list_all_stack_instances(name).await.len();
        }

        true
    }
}

fn unique(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|value| seen.insert(value.clone())).collect()
}
