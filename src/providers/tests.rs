use super::*;
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn fetches_and_filters_gpt_models() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/models")
                .header("Authorization", "Bearer test-key");
            then.status(200).json_body(json!({
                "data": [
                    {"id": "gpt-5"},
                    {"id": "whisper-1"},
                    {"id": "gpt-5-mini"},
                    {"id": "gpt-5"},
                    {"id": "text-embedding-3-small"}
                ]
            }));
        })
        .await;

    let client = reqwest::Client::new();
    let models = fetch_openai_models(&client, &server.base_url(), "test-key")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(models, vec!["gpt-5".to_string(), "gpt-5-mini".to_string()]);
}

#[tokio::test]
async fn falls_back_to_defaults_when_no_gpt_models_listed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/models");
            then.status(200)
                .json_body(json!({"data": [{"id": "whisper-1"}]}));
        })
        .await;

    let client = reqwest::Client::new();
    let models = fetch_openai_models(&client, &server.base_url(), "test-key")
        .await
        .unwrap();

    assert_eq!(models, vec!["gpt-5".to_string(), "gpt-5-mini".to_string()]);
}

#[tokio::test]
async fn malformed_listing_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/models");
            then.status(200).body("not json");
        })
        .await;

    let client = reqwest::Client::new();
    let result = fetch_openai_models(&client, &server.base_url(), "test-key").await;
    assert!(result.is_err());
}
