use aws_config::BehaviorVersion;
use ct_extended_regions::api::sdk::{SdkCloudFormation, SdkOrganizations};
use ct_extended_regions::cfn_response::{CustomResourceRequest, HttpResponseSender};
use ct_extended_regions::config::ProvisioningConfig;
use ct_extended_regions::provision::handle_provisioning_event;
use ct_extended_regions::stackset::StackSetClient;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::info;

async fn provision(
    stack_sets: &StackSetClient<SdkCloudFormation>,
    organizations: &SdkOrganizations,
    sender: &HttpResponseSender,
    event: LambdaEvent<CustomResourceRequest>,
) -> Result<(), Error> {
    info!("Event received: {:?}", event.payload);

    let status = handle_provisioning_event(
        &event.payload,
        ProvisioningConfig::from_env(),
        stack_sets,
        organizations,
        sender,
        &event.context.env_config.log_stream,
    )
    .await?;

    info!("{:?} request acknowledged with {:?}", event.payload.request_type, status);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let stack_sets = StackSetClient::new(SdkCloudFormation::new(
        aws_sdk_cloudformation::Client::new(&config),
    ));
    let organizations = SdkOrganizations::new(aws_sdk_organizations::Client::new(&config));
    let sender = HttpResponseSender::default();

    lambda_runtime::run(service_fn(|event: LambdaEvent<CustomResourceRequest>| {
        provision(&stack_sets, &organizations, &sender, event)
    }))
    .await
}
