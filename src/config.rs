use crate::error::ConfigError;

/// Which accounts the new Config StackSet is deployed to at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployScope {
    /// Only accounts vended after creation, via lifecycle events.
    FutureOnly,
    /// Every account already enrolled in the baseline Config StackSet, plus future ones.
    ExistingAndFuture,
}

impl DeployScope {
    pub fn parse(value: &str) -> Self {
        if value == "Future Only" {
            DeployScope::FutureOnly
        } else {
            DeployScope::ExistingAndFuture
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub deploy_scope: DeployScope,
    pub regions: Vec<String>,
    pub sse_algorithm: String,
    pub kms_key_id: String,
    pub conformance_pack_enabled: bool,
    pub log_archive_account_id: String,
    pub stack_set_name: String,
    pub home_region: String,
}

impl ProvisioningConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let regions = split_regions(&required(&lookup, "RegionsToDeploy")?);
        if regions.is_empty() {
            return Err(ConfigError::Invalid(
                "RegionsToDeploy",
                String::from("no regions listed"),
            ));
        }

        Ok(Self {
            deploy_scope: DeployScope::parse(&required(&lookup, "DeployTo")?),
            regions,
            sse_algorithm: required(&lookup, "SSEAlgorithm")?,
            kms_key_id: lookup("KMSMasterKeyID").unwrap_or_default(),
            conformance_pack_enabled: required(&lookup, "SetupConformancePackEnv")?
                .trim()
                .eq_ignore_ascii_case("YES"),
            log_archive_account_id: required(&lookup, "LogArchiveAccountId")?,
            stack_set_name: required(&lookup, "NewStackSetName")?,
            home_region: required(&lookup, "AWS_REGION")?,
        })
    }

    /// Name of the StackSet that carries the log-archive conformance pack bucket.
    pub fn conformance_pack_stack_set_name(&self) -> String {
        format!("CNFPACK-LOGARCHIVE-{}", self.stack_set_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub stack_set_name: String,
    /// Parameter Store key holding the comma separated region list.
    pub regions_parameter: String,
}

impl LifecycleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            stack_set_name: required(&lookup, "NewStackSetName")?,
            regions_parameter: required(&lookup, "RegionsToDeploy")?,
        })
    }
}

/// Splits a comma separated region list, dropping blanks.
pub fn split_regions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(String::from)
        .collect()
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}
