//! HTTP client for the job-queue service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use flock_core::{
    AgentInfo, AgentStatus, JobServiceClient, PendingCounts, PoolStatus, ScaleError, ScaleResult,
};

const PAGE_SIZE: u32 = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one agent pool on the job-queue service.
#[derive(Debug, Clone)]
pub struct QueueClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    pool_id: String,
}

#[derive(Debug, Deserialize)]
struct AgentPage {
    agents: Vec<WireAgent>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct WireAgent {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    current_page: u32,
    total_pages: u32,
    #[serde(default)]
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct QueueCounts {
    plan_pending: u32,
    apply_pending: u32,
}

impl QueueClient {
    pub fn new(base_url: &str, token: &str, pool_id: &str) -> ScaleResult<Self> {
        if token.is_empty() {
            return Err(ScaleError::Config(
                "job service token must not be empty".to_string(),
            ));
        }
        if pool_id.is_empty() {
            return Err(ScaleError::Config(
                "agent pool id must not be empty".to_string(),
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
            token: token.to_string(),
            pool_id: pool_id.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> ScaleResult<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| ScaleError::JobServiceRead(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScaleError::JobServiceRead(format!(
                "{url} returned {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ScaleError::JobServiceRead(e.to_string()))
    }

    /// Every agent in the pool, following pagination until exhausted.
    async fn list_agents(&self) -> ScaleResult<Vec<WireAgent>> {
        let url = format!("{}/api/v1/pools/{}/agents", self.base_url, self.pool_id);
        let mut page = 1u32;
        let mut agents = Vec::new();

        loop {
            let body: AgentPage = self
                .get_json(
                    &url,
                    &[
                        ("page", page.to_string()),
                        ("page_size", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            agents.extend(body.agents);

            match body.pagination {
                Some(p) if p.current_page < p.total_pages => {
                    page = p.next_page.unwrap_or(p.current_page + 1);
                }
                _ => break,
            }
        }

        Ok(agents)
    }
}

#[async_trait]
impl JobServiceClient for QueueClient {
    async fn pool_status(&self) -> ScaleResult<PoolStatus> {
        let mut status = PoolStatus::default();
        for agent in self.list_agents().await? {
            status.total += 1;
            match AgentStatus::parse(&agent.status) {
                AgentStatus::Busy => status.busy += 1,
                AgentStatus::Idle => status.idle += 1,
                AgentStatus::Other => {}
            }
        }
        Ok(status)
    }

    async fn pending_jobs(&self) -> ScaleResult<u32> {
        Ok(self.pending_by_kind().await?.total())
    }

    async fn pending_by_kind(&self) -> ScaleResult<PendingCounts> {
        let url = format!("{}/api/v1/pools/{}/queue", self.base_url, self.pool_id);
        let counts: QueueCounts = self.get_json(&url, &[]).await?;
        Ok(PendingCounts {
            plan: counts.plan_pending,
            apply: counts.apply_pending,
        })
    }

    async fn agent_details(&self) -> ScaleResult<Vec<AgentInfo>> {
        Ok(self
            .list_agents()
            .await?
            .into_iter()
            .map(|agent| AgentInfo {
                status: AgentStatus::parse(&agent.status),
                id: agent.id,
                name: agent.name,
                ip: agent.ip,
            })
            .collect())
    }
}
