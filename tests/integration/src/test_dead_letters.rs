//! Dead-letter listing integration tests.

#[cfg(test)]
mod tests {
    use crate::{event_body, get_json, post_json, test_event_id};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_dead_letters_of_failed_event() {
        let event_id = test_event_id("listed");
        let (status, _) = post_json("/events", &event_body("batch/scene.txt", &event_id)).await;
        assert_eq!(status, 200);

        let (status, json) = get_json(&format!("/dead-letters?eventId={event_id}")).await;
        assert_eq!(status, 200);
        let records = json["deadLetters"].as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["rule"]["id"], "satellite");
        assert_eq!(records[0]["cause"], "retryExhausted");
        assert_eq!(records[0]["attemptsMade"], 2);
        assert_eq!(records[0]["originalEvent"]["eventId"], event_id.as_str());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_nothing_for_unknown_event() {
        let event_id = test_event_id("unknown");
        let (status, json) = get_json(&format!("/dead-letters?eventId={event_id}")).await;
        assert_eq!(status, 200);
        assert_eq!(json["deadLetters"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_require_event_id() {
        let (status, json) = get_json("/dead-letters").await;
        assert_eq!(status, 400);
        assert_eq!(json["__type"], "SerializationException");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_event_without_id() {
        let (status, json) = post_json("/events", &event_body("batch/a.txt", "")).await;
        assert_eq!(status, 400);
        assert_eq!(json["__type"], "ValidationException");
    }
}
