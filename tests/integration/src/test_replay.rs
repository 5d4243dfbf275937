//! Dead-letter replay integration tests.

#[cfg(test)]
mod tests {
    use crate::{event_body, post_json, test_event_id};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_replay_original_event() {
        let event_id = test_event_id("replay");
        let record = serde_json::json!({
            "originalEvent": event_body("notes.json", &event_id),
            "rule": {"id": "retired", "backendKind": "heavyCompute", "target": "old-queue"},
            "failureReason": "backend unreachable",
            "cause": "retryExhausted",
            "attemptsMade": 2,
            "lastAttemptAt": chrono::Utc::now(),
        });

        let (status, json) = post_json("/replay", &record).await;
        assert_eq!(status, 200);
        let report = &json["events"][0];
        assert_eq!(report["eventId"], event_id.as_str());
        assert_eq!(report["matchedRules"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_malformed_record() {
        let (status, json) = post_json("/replay", &serde_json::json!({"rule": "x"})).await;
        assert_eq!(status, 400);
        assert_eq!(json["__type"], "SerializationException");
    }
}
