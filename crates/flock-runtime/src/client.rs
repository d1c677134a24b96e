//! HTTP client for the container runtime's control API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use flock_core::{RuntimeClient, ScaleError, ScaleResult, ServiceStatus, TaskInfo};

/// The runtime accepts at most this many task handles per protection call.
const PROTECTION_BATCH_SIZE: usize = 10;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one worker service in one runtime cluster.
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    http: reqwest::Client,
    base_url: String,
    cluster: String,
    service: String,
}

#[derive(Debug, Deserialize)]
struct ServiceBody {
    desired_count: u32,
    running_count: u32,
}

#[derive(Debug, Serialize)]
struct DesiredBody {
    desired_count: u32,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    tasks: Vec<WireTask>,
}

#[derive(Debug, Deserialize)]
struct WireTask {
    handle: String,
    #[serde(default)]
    private_ip: String,
}

#[derive(Debug, Serialize)]
struct ProtectionBody<'a> {
    tasks: &'a [String],
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_minutes: Option<u32>,
}

impl RuntimeApiClient {
    pub fn new(base_url: &str, cluster: &str, service: &str) -> ScaleResult<Self> {
        if cluster.is_empty() {
            return Err(ScaleError::Config(
                "runtime cluster must not be empty".to_string(),
            ));
        }
        if service.is_empty() {
            return Err(ScaleError::Config(
                "runtime service must not be empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScaleError::Config(format!("building http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cluster: cluster.to_string(),
            service: service.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn service_url(&self) -> String {
        format!(
            "{}/v1/clusters/{}/services/{}",
            self.base_url, self.cluster, self.service
        )
    }
}

#[async_trait]
impl RuntimeClient for RuntimeApiClient {
    async fn service_status(&self) -> ScaleResult<ServiceStatus> {
        let url = self.service_url();
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ScaleError::RuntimeRead(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScaleError::RuntimeRead(format!("{url} returned {status}")));
        }

        let body: ServiceBody = response
            .json()
            .await
            .map_err(|e| ScaleError::RuntimeRead(e.to_string()))?;
        Ok(ServiceStatus {
            desired: body.desired_count,
            running: body.running_count,
        })
    }

    async fn set_desired(&self, count: u32) -> ScaleResult<()> {
        let url = format!("{}/desired-count", self.service_url());
        let response = self
            .http
            .put(&url)
            .json(&DesiredBody {
                desired_count: count,
            })
            .send()
            .await
            .map_err(|e| ScaleError::RuntimeWrite(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScaleError::RuntimeWrite(format!("{url} returned {status}")));
        }
        Ok(())
    }

    async fn task_ips(&self) -> ScaleResult<Vec<TaskInfo>> {
        let url = format!("{}/tasks", self.service_url());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ScaleError::RuntimeRead(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScaleError::RuntimeRead(format!("{url} returned {status}")));
        }

        let body: TaskList = response
            .json()
            .await
            .map_err(|e| ScaleError::RuntimeRead(e.to_string()))?;
        Ok(body
            .tasks
            .into_iter()
            .map(|task| TaskInfo {
                handle: task.handle,
                private_ip: task.private_ip,
            })
            .collect())
    }

    async fn set_protection(
        &self,
        handles: &[String],
        enabled: bool,
        ttl_minutes: u32,
    ) -> ScaleResult<()> {
        let url = format!(
            "{}/v1/clusters/{}/task-protection",
            self.base_url, self.cluster
        );
        let ttl = if enabled && ttl_minutes > 0 {
            Some(ttl_minutes)
        } else {
            None
        };

        // A failed batch aborts the remaining ones.
        for batch in handles.chunks(PROTECTION_BATCH_SIZE) {
            let response = self
                .http
                .post(&url)
                .json(&ProtectionBody {
                    tasks: batch,
                    enabled,
                    ttl_minutes: ttl,
                })
                .send()
                .await
                .map_err(|e| ScaleError::Protection(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ScaleError::Protection(format!("{url} returned {status}")));
            }
        }
        Ok(())
    }
}
