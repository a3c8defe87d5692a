use muleb2b_provider::testing::ProviderTester;
use muleb2b_provider::{MuleB2bProvider, ProviderError};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/accounts/login"))
        .and(body_json(json!({"username": "ci", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-abc",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn provider_config(server: &MockServer) -> serde_json::Value {
    json!({
        "base_url": server.uri(),
        "organization_id": "org-1",
        "username": "ci",
        "password": "pw"
    })
}

#[tokio::test]
async fn test_configure_then_lookup_environment() {
    let server = MockServer::start().await;
    mock_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/accounts/api/organizations/org-1/environments"))
        .and(header("authorization", "Bearer token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "env-sbx", "name": "Sandbox"},
                {"id": "env-prd", "name": "Production"}
            ],
            "total": 2
        })))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(MuleB2bProvider::new());
    assert_ok!(tester.validate_provider_config(provider_config(&server)).await);
    assert_ok!(tester.configure(provider_config(&server)).await);

    let state = tester
        .read_data_source("muleb2b_environment", json!({"name": "Production"}))
        .await
        .unwrap();
    assert_eq!(state["id"], json!("env-prd"));

    let err = tester
        .read_data_source("muleb2b_environment", json!({"name": "QA"}))
        .await
        .unwrap_err();
    assert_eq!(err.message(), "no environment found with name (QA)");
}

#[tokio::test]
async fn test_configure_fails_on_rejected_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(MuleB2bProvider::new());
    assert!(tester.configure(provider_config(&server)).await.is_err());

    let err = tester
        .read_data_source("muleb2b_environment", json!({"name": "Sandbox"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::FailedPrecondition(_)));
}
