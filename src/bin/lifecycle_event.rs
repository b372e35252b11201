use aws_config::BehaviorVersion;
use aws_lambda_events::sqs::SqsEvent;
use ct_extended_regions::api::sdk::{SdkCloudFormation, SdkParameterStore};
use ct_extended_regions::config::LifecycleConfig;
use ct_extended_regions::lifecycle::handle_lifecycle_event;
use ct_extended_regions::stackset::{StackSetClient, LIFECYCLE_FAILURE_TOLERANCE};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::info;

async fn on_lifecycle_event(
    stack_sets: &StackSetClient<SdkCloudFormation>,
    parameter_store: &SdkParameterStore,
    event: LambdaEvent<SqsEvent>,
) -> Result<(), Error> {
    info!("Event received: {:?}", event.payload);

    let config = LifecycleConfig::from_env()?;
    handle_lifecycle_event(&event.payload, &config, stack_sets, parameter_store).await?;
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
    ))
    .with_failure_tolerance(LIFECYCLE_FAILURE_TOLERANCE);
    let parameter_store = SdkParameterStore::new(aws_sdk_ssm::Client::new(&config));

    lambda_runtime::run(service_fn(|event: LambdaEvent<SqsEvent>| {
        on_lifecycle_event(&stack_sets, &parameter_store, event)
    }))
    .await
}
