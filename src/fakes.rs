//! In-memory stand-ins for the service seams, used by unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::api::{
    ApiResult, CloudFormationApi, OperationHandle, OperationStatus, OrganizationsApi,
    ParameterStoreApi, StackInstanceSummary, StackInstanceTarget, StackSetDescriptor,
    StackSetDetails, StackSetParameter, StackSetSummary, Template,
};
use crate::cfn_response::{CustomResourceResponse, ResponseSender};
use crate::error::{ApiError, ResponseError};

pub fn instance(account: &str, region: &str) -> StackInstanceSummary {
    StackInstanceSummary {
        account: String::from(account),
        region: String::from(region),
    }
}

#[derive(Debug, Clone)]
pub struct FakeStackSet {
    pub status: String,
    pub details: StackSetDetails,
    pub instances: Vec<StackInstanceSummary>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub stack_sets: BTreeMap<String, FakeStackSet>,
    pub calls: Vec<String>,
    pub created: Vec<StackSetDescriptor>,
    pub instance_requests: Vec<(String, StackInstanceTarget)>,
    pub deleted_instance_targets: Vec<StackInstanceTarget>,
    pub statuses: VecDeque<OperationStatus>,
    pub fail_listing: bool,
    pub fail_describe_operation: bool,
    pub create_stack_set_error: Option<ApiError>,
    pub create_instances_error: Option<ApiError>,
    /// Deleted instances stay listed for this many more listings.
    pub drain_after_listings: Option<usize>,
    pending_drain: Option<(String, usize)>,
    next_operation: usize,
}

#[derive(Debug, Default)]
pub struct FakeCloudFormation {
    state: Mutex<FakeState>,
}

impl FakeCloudFormation {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("poisoned mutex")
    }

    pub fn add_stack_set(&self, name: &str, status: &str, instances: Vec<StackInstanceSummary>) {
        self.add_baseline(name, status, "Resources: {}", vec![], instances);
    }

    pub fn add_baseline(
        &self,
        name: &str,
        status: &str,
        body: &str,
        parameters: Vec<StackSetParameter>,
        instances: Vec<StackInstanceSummary>,
    ) {
        self.state().stack_sets.insert(
            String::from(name),
            FakeStackSet {
                status: String::from(status),
                details: StackSetDetails {
                    template_body: Some(String::from(body)),
                    parameters,
                },
                instances,
            },
        );
    }

    pub fn script_statuses(&self, statuses: Vec<OperationStatus>) {
        self.state().statuses = statuses.into();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn describe_operation_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("DescribeStackSetOperation"))
            .count()
    }
}

fn not_found(name: &str) -> ApiError {
    ApiError::NotFound(format!("StackSet {} not found", name))
}

#[async_trait]
impl CloudFormationApi for FakeCloudFormation {
    async fn list_stack_sets(&self) -> ApiResult<Vec<StackSetSummary>> {
        let mut state = self.state();
        state.calls.push(String::from("ListStackSets"));
        if state.fail_listing {
            return Err(ApiError::Fatal(String::from("access denied")));
        }
        Ok(state
            .stack_sets
            .iter()
            .map(|(name, stack_set)| StackSetSummary {
                name: name.clone(),
                status: stack_set.status.clone(),
            })
            .collect())
    }

    async fn describe_stack_set(&self, name: &str) -> ApiResult<StackSetDetails> {
        let mut state = self.state();
        state.calls.push(format!("DescribeStackSet {}", name));
        state
            .stack_sets
            .get(name)
            .map(|stack_set| stack_set.details.clone())
            .ok_or_else(|| not_found(name))
    }

    async fn create_stack_set(&self, descriptor: &StackSetDescriptor) -> ApiResult<()> {
        let mut state = self.state();
        state.calls.push(format!("CreateStackSet {}", descriptor.name));
        if let Some(error) = state.create_stack_set_error.clone() {
            return Err(error);
        }
        if state.stack_sets.contains_key(&descriptor.name) {
            return Err(ApiError::AlreadyExists(descriptor.name.clone()));
        }

        let body = match &descriptor.template {
            Template::Body(body) => Some(body.clone()),
            Template::Url(_) => None,
        };
        state.stack_sets.insert(
            descriptor.name.clone(),
            FakeStackSet {
                status: String::from("ACTIVE"),
                details: StackSetDetails {
                    template_body: body,
                    parameters: descriptor.parameters.clone(),
                },
                instances: Vec::new(),
            },
        );
        state.created.push(descriptor.clone());
        Ok(())
    }

    async fn create_stack_instances(
        &self,
        name: &str,
        target: &StackInstanceTarget,
    ) -> ApiResult<OperationHandle> {
        let mut state = self.state();
        state.calls.push(format!("CreateStackInstances {}", name));
        if let Some(error) = state.create_instances_error.clone() {
            return Err(error);
        }
        let stack_set = state.stack_sets.get_mut(name).ok_or_else(|| not_found(name))?;
        for account in &target.accounts {
            for region in &target.regions {
                let exists = stack_set
                    .instances
                    .iter()
                    .any(|i| i.account == *account && i.region == *region);
                if !exists {
                    stack_set.instances.push(instance(account, region));
                }
            }
        }

        state
            .instance_requests
            .push((String::from(name), target.clone()));
        state.next_operation += 1;
        Ok(OperationHandle(format!("op-{}", state.next_operation)))
    }

    async fn delete_stack_instances(
        &self,
        name: &str,
        target: &StackInstanceTarget,
        _retain_stacks: bool,
    ) -> ApiResult<OperationHandle> {
        let mut state = self.state();
        state.calls.push(format!("DeleteStackInstances {}", name));
        state.deleted_instance_targets.push(target.clone());
        let drain_after_listings = state.drain_after_listings;
        match drain_after_listings {
            Some(listings) => state.pending_drain = Some((String::from(name), listings)),
            None => {
                let stack_set = state.stack_sets.get_mut(name).ok_or_else(|| not_found(name))?;
                stack_set.instances.retain(|i| {
                    !(target.accounts.contains(&i.account) && target.regions.contains(&i.region))
                });
            }
        }
        state.next_operation += 1;
        Ok(OperationHandle(format!("op-{}", state.next_operation)))
    }

    async fn describe_stack_set_operation(
        &self,
        name: &str,
        operation: &OperationHandle,
    ) -> ApiResult<OperationStatus> {
        let mut state = self.state();
        state
            .calls
            .push(format!("DescribeStackSetOperation {} {}", name, operation));
        if state.fail_describe_operation {
            return Err(ApiError::NotFound(operation.0.clone()));
        }
        Ok(state
            .statuses
            .pop_front()
            .unwrap_or(OperationStatus::Succeeded))
    }

    async fn list_stack_instances(&self, name: &str) -> ApiResult<Vec<StackInstanceSummary>> {
        let mut state = self.state();
        state.calls.push(format!("ListStackInstances {}", name));

        if let Some((pending, remaining)) = state.pending_drain.clone() {
            if pending == name {
                if remaining == 0 {
                    state.pending_drain = None;
                    if let Some(stack_set) = state.stack_sets.get_mut(name) {
                        stack_set.instances.clear();
                    }
                } else {
                    state.pending_drain = Some((pending, remaining - 1));
                }
            }
        }

        state
            .stack_sets
            .get(name)
            .map(|stack_set| stack_set.instances.clone())
            .ok_or_else(|| not_found(name))
    }

    async fn delete_stack_set(&self, name: &str) -> ApiResult<()> {
        let mut state = self.state();
        state.calls.push(format!("DeleteStackSet {}", name));
        let stack_set = state.stack_sets.get(name).ok_or_else(|| not_found(name))?;
        if !stack_set.instances.is_empty() {
            return Err(ApiError::Fatal(format!("StackSet {} is not empty", name)));
        }
        state.stack_sets.remove(name);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeOrganizations {
    pub root_arns: ApiResult<Vec<String>>,
    pub organization_id: ApiResult<String>,
}

impl Default for FakeOrganizations {
    fn default() -> Self {
        Self {
            root_arns: Ok(vec![String::from(
                "arn:aws:organizations::111111111111:root/o-abc123/r-ab12",
            )]),
            organization_id: Ok(String::from("o-abc123")),
        }
    }
}

#[async_trait]
impl OrganizationsApi for FakeOrganizations {
    async fn list_root_arns(&self) -> ApiResult<Vec<String>> {
        self.root_arns.clone()
    }

    async fn organization_id(&self) -> ApiResult<String> {
        self.organization_id.clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeParameterStore {
    pub parameters: HashMap<String, String>,
    pub fail_listing: bool,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeParameterStore {
    pub fn with(name: &str, value: &str) -> Self {
        Self {
            parameters: HashMap::from([(String::from(name), String::from(value))]),
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl ParameterStoreApi for FakeParameterStore {
    async fn list_parameter_names(&self) -> ApiResult<Vec<String>> {
        if self.fail_listing {
            return Err(ApiError::Transient(String::from("throttled")));
        }
        Ok(self.parameters.keys().cloned().collect())
    }

    async fn get_parameter_value(&self, name: &str) -> ApiResult<String> {
        self.lookups
            .lock()
            .expect("poisoned mutex")
            .push(String::from(name));
        self.parameters
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(String::from(name)))
    }
}

#[derive(Debug, Default)]
pub struct CapturingSender {
    pub fail: bool,
    pub sent: Mutex<Vec<(String, CustomResourceResponse)>>,
}

impl CapturingSender {
    pub fn sent(&self) -> Vec<(String, CustomResourceResponse)> {
        self.sent.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl ResponseSender for CapturingSender {
    async fn send(
        &self,
        response_url: &str,
        response: &CustomResourceResponse,
    ) -> Result<(), ResponseError> {
        self.sent
            .lock()
            .expect("poisoned mutex")
            .push((String::from(response_url), response.clone()));
        if self.fail {
            return Err(ResponseError::Delivery(String::from("connection reset")));
        }
        Ok(())
    }
}

/// A raw HTTP/1.1 reply that closes the connection.
pub fn http_reply(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\ncontent-type: application/x-amz-json-1.1\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
}

/// Serves one connection per canned reply, in order, on a local port.
/// Resolves to the raw requests received.
pub async fn serve_http(replies: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local address");
    let server = tokio::spawn(async move {
        let mut requests = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().await.expect("accept");
            requests.push(read_request(&mut stream).await);
            stream.write_all(reply.as_bytes()).await.expect("write reply");
            let _ = stream.shutdown().await;
        }
        requests
    });
    (format!("http://{}", address), server)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await.expect("read request");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let Some(end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buffer[..end]).into_owned();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buffer.len() >= end + 4 + length {
            break;
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
