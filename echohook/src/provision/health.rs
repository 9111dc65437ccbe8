//! Post-install health probe.

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use super::ProvisionError;

/// Poll `url` until it answers 2xx or attempts run out.
pub async fn wait_healthy(
    url: &str,
    attempts: u32,
    delay: Duration,
) -> Result<(), ProvisionError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| ProvisionError::HealthCheck {
            attempts: 0,
            last_error: e.to_string(),
        })?;

    let mut last_error = String::from("no attempts made");

    for attempt in 1..=attempts {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = url, attempt = attempt, "health_check_passed");
                return Ok(());
            }
            Ok(resp) => {
                last_error = format!("status {}", resp.status().as_u16());
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }

        warn!(
            url = url,
            attempt = attempt,
            max_attempts = attempts,
            error = %last_error,
            "health_check_retry"
        );

        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(ProvisionError::HealthCheck {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::{router, AppState};
    use crate::Config;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_wait_healthy_against_receiver() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(Config::default()));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{}/health", addr);
        wait_healthy(&url, 5, Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_healthy_gives_up() {
        // Bind then drop to get a port nothing listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let url = format!("http://{}/health", addr);
        let err = wait_healthy(&url, 2, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::HealthCheck { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_wait_healthy_non_success_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(Config::default()));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{}/missing", addr);
        let err = wait_healthy(&url, 1, Duration::from_millis(10))
            .await
            .unwrap_err();
        match err {
            ProvisionError::HealthCheck { last_error, .. } => assert_eq!(last_error, "status 404"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
