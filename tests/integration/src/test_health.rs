//! Health and routing-surface integration tests.

#[cfg(test)]
mod tests {
    use crate::{client, endpoint_url};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_running() {
        let response = client()
            .get(format!("{}/health", endpoint_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert!(response.headers().contains_key("x-request-id"));
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["status"], "running");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unknown_path() {
        let response = client()
            .get(format!("{}/nope", endpoint_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_get_on_events() {
        let response = client()
            .get(format!("{}/events", endpoint_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 405);
    }
}
