//! Profile lookup adapter against a mock HTTP API.

use std::time::Duration;

use orbit_pixelart::services::linkedin::{LinkedinClient, LookupError, ProfileLookup};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> LinkedinClient {
    LinkedinClient::new(
        &server.uri(),
        "test-key",
        "test-host",
        Duration::from_millis(5),
        3,
    )
    .expect("build lookup client")
}

#[tokio::test]
async fn fetch_returns_picture_and_concatenated_name() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("username", "janedoe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "profilePicture": "https://media.example.com/jane.png"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let profile = client
        .fetch("https://linkedin.com/in/janedoe/")
        .await
        .unwrap();

    assert_eq!(profile.picture_url, "https://media.example.com/jane.png");
    assert_eq!(profile.display_name, "Jane Doe");
}

#[tokio::test]
async fn missing_picture_field_is_a_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "firstName": "Jane",
            "lastName": "Doe"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch("https://linkedin.com/in/janedoe").await;
    assert!(matches!(result, Err(LookupError::NoProfilePicture)));
}

#[tokio::test]
async fn throttling_is_retried_until_the_cap_then_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4) // initial call + 3 retries
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch("https://linkedin.com/in/janedoe").await;
    assert!(matches!(
        result,
        Err(LookupError::RateLimitExceeded { attempts: 3 })
    ));
}

#[tokio::test]
async fn throttling_clears_after_a_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "profilePicture": "https://media.example.com/jane.png"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let profile = client
        .fetch("https://linkedin.com/in/janedoe")
        .await
        .unwrap();
    assert_eq!(profile.display_name, "Jane Doe");
}

#[tokio::test]
async fn other_api_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch("https://linkedin.com/in/janedoe").await;
    assert!(matches!(result, Err(LookupError::Api(_))));
}
