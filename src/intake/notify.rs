use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::data::IntakeSubmission;

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Forwards signups to the agency's intake endpoint. Best effort: the send
/// runs on its own task and failures are only logged.
#[derive(Debug, Clone)]
pub struct AgencyNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl AgencyNotifier {
    pub fn new(url: Option<String>) -> AgencyNotifier {
        AgencyNotifier {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn disabled() -> AgencyNotifier {
        AgencyNotifier::new(None)
    }

    pub fn notify(&self, submission: IntakeSubmission) -> Option<JoinHandle<()>> {
        let Some(url) = self.url.clone() else {
            debug!("no agency endpoint configured, skipping notification");
            return None;
        };
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime, skipping agency notification");
            return None;
        };
        let client = self.client.clone();

        Some(runtime.spawn(async move {
            match client.post(&url).json(&submission).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(email = %submission.email, "sent client request to agency");
                }
                Ok(response) => {
                    let status = response.status();
                    let reason = response
                        .json::<ErrorBody>()
                        .await
                        .ok()
                        .and_then(|body| body.error)
                        .unwrap_or_else(|| "unknown error".to_string());
                    warn!(%status, reason = %reason, "agency rejected client request");
                }
                Err(e) => warn!(error = %e, "could not reach agency endpoint"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_agency_never_fails_the_caller() {
        let notifier = AgencyNotifier::new(Some("http://127.0.0.1:9/api/client-request".to_string()));

        let handle = notifier.notify(IntakeSubmission::default()).unwrap();
        assert!(handle.await.is_ok());
    }

    #[test]
    fn notifying_outside_a_runtime_is_skipped() {
        let notifier = AgencyNotifier::new(Some("http://127.0.0.1:9/api/client-request".to_string()));

        assert!(notifier.notify(IntakeSubmission::default()).is_none());
    }

    #[test]
    fn disabled_notifier_sends_nothing() {
        assert!(AgencyNotifier::disabled().notify(IntakeSubmission::default()).is_none());
    }
}
