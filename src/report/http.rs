use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::config_file::ControlPlaneConfig;
use crate::report::events::StateChange;
use crate::report::transport::{Transport, TransportError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submission<'a, T: Serialize> {
    cluster: &'a str,
    submission_id: Uuid,
    #[serde(flatten)]
    change: &'a T,
}

/// Submits changes as JSON to the control plane.
///
/// Timeouts, connection failures, 429 and 5xx responses are retried with
/// exponential backoff up to `max_attempts`. Anything else fails at once
/// and the change stays pending for the next report cycle.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    cluster: String,
    max_attempts: u32,
}

impl HttpTransport {
    pub fn new(config: &ControlPlaneConfig, cluster: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
            .build()?;
        // Url::join drops the last segment unless the base ends with a slash
        let mut endpoint = config.endpoint.clone();
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            client,
            endpoint,
            cluster: cluster.to_string(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    fn route(change: &StateChange) -> &'static str {
        match change {
            StateChange::Container(_) => "container-state-change",
            StateChange::Task(_) => "task-state-change",
            StateChange::Attachment(_) => "attachment-state-change",
        }
    }

    fn body(&self, change: &StateChange) -> Result<serde_json::Value, TransportError> {
        let submission_id = Uuid::now_v7();
        let cluster = self.cluster.as_str();
        let value = match change {
            StateChange::Container(change) => serde_json::to_value(Submission {
                cluster,
                submission_id,
                change,
            })?,
            StateChange::Task(change) => serde_json::to_value(Submission {
                cluster,
                submission_id,
                change,
            })?,
            StateChange::Attachment(change) => serde_json::to_value(Submission {
                cluster,
                submission_id,
                change,
            })?,
        };
        Ok(value)
    }

    async fn attempt(&self, url: &Url, body: &serde_json::Value) -> Result<(), TransportError> {
        let response = self.client.post(url.clone()).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, change: &StateChange) -> Result<(), TransportError> {
        let url = self.endpoint.join(Self::route(change))?;
        let body = self.body(change)?;

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.attempt(&url, &body).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    log::debug!(
                        "Submission attempt {attempt}/{} failed for {change}: {e}",
                        self.max_attempts
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::events::TaskStateChange;
    use crate::state::status::TaskStatus;

    fn transport(endpoint: &str) -> HttpTransport {
        let config = ControlPlaneConfig {
            endpoint: Url::parse(endpoint).unwrap(),
            timeout: 1,
            max_attempts: 0,
        };
        HttpTransport::new(&config, "prod").unwrap()
    }

    fn task_change() -> StateChange {
        StateChange::Task(TaskStateChange {
            task_arn: "task-1".to_string(),
            status: TaskStatus::Running,
            reason: None,
            timestamp: 1700000000000000,
            sent_status: TaskStatus::None,
        })
    }

    #[test]
    fn test_endpoint_keeps_its_path() {
        let t = transport("http://127.0.0.1:9/v1");
        let url = t.endpoint.join(HttpTransport::route(&task_change())).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/v1/task-state-change");
        assert_eq!(t.max_attempts, 1);
    }

    #[test]
    fn test_body_carries_cluster_and_change() {
        let t = transport("http://127.0.0.1:9/");
        let body = t.body(&task_change()).unwrap();
        assert_eq!(body["cluster"], "prod");
        assert_eq!(body["taskArn"], "task-1");
        assert_eq!(body["status"], "RUNNING");
        assert!(body["submissionId"].is_string());
    }

    #[tokio::test]
    async fn test_unreachable_control_plane_is_an_error() {
        // Port 9 (discard) is not expected to accept connections
        let t = transport("http://127.0.0.1:9/");
        assert!(t.submit(&task_change()).await.is_err());
    }
}
