//! Event ingestion integration tests.

#[cfg(test)]
mod tests {
    use crate::{client, endpoint_url, event_body, post_json, test_event_id};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_drop_unmatched_event() {
        let event_id = test_event_id("nomatch");
        let (status, json) = post_json("/events", &event_body("notes.json", &event_id)).await;

        assert_eq!(status, 200);
        let report = &json["events"][0];
        assert_eq!(report["eventId"], event_id.as_str());
        assert_eq!(report["matchedRules"].as_array().unwrap().len(), 0);
        assert_eq!(report["chains"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_dead_letter_after_unreachable_backend() {
        let event_id = test_event_id("heavy");
        let (status, json) =
            post_json("/events", &event_body("batch/config.txt", &event_id)).await;

        assert_eq!(status, 200);
        let chain = &json["events"][0]["chains"][0];
        assert_eq!(chain["ruleId"], "satellite");
        assert_eq!(chain["backendKind"], "heavyCompute");
        assert_eq!(chain["attempts"], 2);
        assert_eq!(chain["status"], "deadLettered");
        assert_eq!(chain["cause"], "retryExhausted");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_decode_s3_notification() {
        let sequencer = test_event_id("seq");
        let body = serde_json::json!({
            "Records": [{
                "eventName": "ObjectCreated:Put",
                "eventTime": chrono::Utc::now(),
                "s3": {
                    "bucket": {"name": "lz"},
                    "object": {"key": "docs/readme+v2.md", "size": 3, "sequencer": sequencer}
                }
            }]
        });

        let (status, json) = post_json("/events", &body).await;
        assert_eq!(status, 200);
        assert_eq!(json["events"][0]["key"], "docs/readme v2.md");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_invalid_json() {
        let response = client()
            .post(format!("{}/events", endpoint_url()))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["__type"], "SerializationException");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_record_without_key() {
        let body = serde_json::json!({
            "Records": [{"s3": {"bucket": {"name": "lz"}, "object": {}}}]
        });
        let (status, json) = post_json("/events", &body).await;
        assert_eq!(status, 400);
        assert_eq!(json["__type"], "ValidationException");
    }
}
