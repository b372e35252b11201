use tracing::error;

use crate::api::ParameterStoreApi;
use crate::config::split_regions;

/// Region list stored as a comma separated value under `name`.
///
/// Returns an empty list when the parameter is missing or unreadable.
pub async fn region_list(store: &impl ParameterStoreApi, name: &str) -> Vec<String> {
    let names = match store.list_parameter_names().await {
        Ok(names) => names,
        Err(e) => {
            error!("Unable to list parameters: {}", e);
            return Vec::new();
        }
    };
    if !names.iter().any(|existing| existing == name) {
        error!("Unable to find the parameter: {}", name);
        return Vec::new();
    }

    match store.get_parameter_value(name).await {
        Ok(value) => split_regions(&value),
        Err(e) => {
            error!("Unable to get parameter value of {}: {}", name, e);
            Vec::new()
        }
    }
}
