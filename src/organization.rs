use tracing::error;

use crate::api::OrganizationsApi;
use crate::error::ApiError;

pub const STACK_SET_ROLE: &str = "service-role/AWSControlTowerStackSetRole";

/// Account id embedded in an ARN (`arn:partition:service:region:account:resource`).
pub fn account_from_arn(arn: &str) -> Option<&str> {
    arn.split(':').nth(4).filter(|account| !account.is_empty())
}

/// Management account of the organization. Only callable from the
/// organization root.
pub async fn management_account_id(organizations: &impl OrganizationsApi) -> Result<String, ApiError> {
    let roots = organizations.list_root_arns().await?;
    roots
        .first()
        .and_then(|arn| account_from_arn(arn))
        .map(String::from)
        .ok_or_else(|| ApiError::NotFound(format!("No organization root in {:?}", roots)))
}

pub async fn administration_role_arn(
    organizations: &impl OrganizationsApi,
) -> Result<String, ApiError> {
    let account = management_account_id(organizations).await?;
    Ok(format!("arn:aws:iam::{}:role/{}", account, STACK_SET_ROLE))
}

pub async fn organization_id(organizations: &impl OrganizationsApi) -> Option<String> {
    match organizations.organization_id().await {
        Ok(id) => Some(id),
        Err(e) => {
            error!("Unable to get organization id: {}", e);
            None
        }
    }
}
