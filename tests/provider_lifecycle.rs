use std::sync::Arc;

use muleb2b_provider::testing::{
    assert_plan_changes_attribute, assert_plan_has_changes, assert_plan_no_changes,
    assert_plan_replaces,
    assert_plan_updates_in_place, InMemoryB2bApi, ProviderTester,
};
use muleb2b_provider::{B2bApi, MuleB2bProvider};
use serde_json::{json, Value};
use tokio_test::assert_ok;

const ENV: &str = "env-1";

fn tester() -> (Arc<InMemoryB2bApi>, ProviderTester<MuleB2bProvider>) {
    let api = Arc::new(InMemoryB2bApi::new().with_environment(ENV, "Sandbox"));
    let tester = ProviderTester::new(MuleB2bProvider::with_api(api.clone()));
    (api, tester)
}

fn partner_config() -> Value {
    json!({
        "name": "Acme",
        "environment_id": ENV,
        "description": "Acme Corp",
        "identifier": [
            {"identifier_type_id": "duns", "value": "123456789"},
            {"identifier_type_id": "as2", "value": "ACME"}
        ],
        "contact": [
            {"name": "Jane", "email": "jane@acme.test", "type": "technical"}
        ]
    })
}

#[tokio::test]
async fn test_partner_plan_is_stable_after_create() {
    let (_, tester) = tester();
    assert_ok!(tester.validate_resource_config("muleb2b_partner", partner_config()).await);

    let state = tester
        .lifecycle_create("muleb2b_partner", partner_config())
        .await
        .unwrap();
    assert!(state["x12_inbound_config"].is_array());

    let plan = tester
        .plan_update("muleb2b_partner", state.clone(), partner_config())
        .await
        .unwrap();
    assert_plan_no_changes(&plan);
    assert_eq!(plan.planned_state["id"], state["id"]);
}

#[tokio::test]
async fn test_partner_update_in_place_and_replace() {
    let (api, tester) = tester();
    let state = tester
        .lifecycle_create("muleb2b_partner", partner_config())
        .await
        .unwrap();

    let mut described = partner_config();
    described["description"] = json!("Acme Corporation");
    let plan = tester
        .plan_update("muleb2b_partner", state.clone(), described.clone())
        .await
        .unwrap();
    assert_plan_has_changes(&plan);
    assert_plan_changes_attribute(&plan, "description");
    assert_plan_updates_in_place(&plan);

    let updated = tester
        .lifecycle_update("muleb2b_partner", state.clone(), described)
        .await
        .unwrap();
    assert_eq!(updated["description"], json!("Acme Corporation"));
    assert_eq!(updated["id"], state["id"]);
    assert_eq!(api.calls_to("update_partner").len(), 1);
    assert!(api.calls_to("delete_identifier").is_empty());

    let mut renamed = partner_config();
    renamed["name"] = json!("Acme Industries");
    let plan = tester
        .plan_update("muleb2b_partner", updated, renamed)
        .await
        .unwrap();
    assert_plan_replaces(&plan);
}

#[tokio::test]
async fn test_deleted_partner_drops_from_state() {
    let (_, tester) = tester();
    let state = tester
        .lifecycle_create("muleb2b_partner", partner_config())
        .await
        .unwrap();

    assert_ok!(tester.lifecycle_delete("muleb2b_partner", state.clone()).await);
    let read = tester.read("muleb2b_partner", state.clone()).await.unwrap();
    assert!(read.is_null());
    assert_ok!(tester.delete("muleb2b_partner", state).await);
}

#[tokio::test]
async fn test_identifier_value_change_replaces() {
    let (api, tester) = tester();
    let partner_id = api.seed_partner(ENV, "Acme");
    let config = json!({
        "partner_id": partner_id,
        "environment_id": ENV,
        "identifier_type_id": "duns",
        "value": "111"
    });
    let mut changed = config.clone();
    changed["value"] = json!("222");

    let state = tester
        .lifecycle_crud("muleb2b_identifier", config, changed)
        .await
        .unwrap();
    assert_eq!(state["value"], json!("222"));
    assert!(api.list_identifiers(ENV, &partner_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_data_sources_through_provider() {
    let api = Arc::new(
        InMemoryB2bApi::new()
            .with_environment(ENV, "Sandbox")
            .with_edi_document_type(ENV, "X12", "4010", "850"),
    );
    let tester = ProviderTester::new(MuleB2bProvider::with_api(api));

    let environment = tester
        .read_data_source("muleb2b_environment", json!({"name": "Sandbox"}))
        .await
        .unwrap();
    assert_eq!(environment["id"], json!(ENV));

    let document_type = tester
        .read_data_source(
            "muleb2b_ediDocumentType",
            json!({
                "environment_id": ENV,
                "format_type": "X12",
                "format_version": "4010",
                "document_name": "850"
            }),
        )
        .await
        .unwrap();
    assert_eq!(document_type["id"], json!("doctype-X12-4010-850"));

    assert!(tester
        .validate_data_source_config("muleb2b_partner", json!({"environment_id": ENV}))
        .await
        .is_err());
}

#[tokio::test]
async fn test_two_environments_share_one_client() {
    let api = Arc::new(
        InMemoryB2bApi::new()
            .with_environment("env-1", "Sandbox")
            .with_environment("env-2", "Production"),
    );
    let tester = ProviderTester::new(MuleB2bProvider::with_api(api.clone()));

    let mut production = partner_config();
    production["environment_id"] = json!("env-2");
    let (sandbox_state, production_state) = tokio::join!(
        tester.lifecycle_create("muleb2b_partner", partner_config()),
        tester.lifecycle_create("muleb2b_partner", production),
    );
    let sandbox_state = sandbox_state.unwrap();
    let production_state = production_state.unwrap();

    assert_eq!(sandbox_state["environment_id"], json!("env-1"));
    assert_eq!(production_state["environment_id"], json!("env-2"));
    assert_ne!(sandbox_state["id"], production_state["id"]);
    assert_eq!(api.list_partners("env-1").await.unwrap().len(), 1);
    assert_eq!(api.list_partners("env-2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_endpoint_plan_is_stable_after_create() {
    let (api, tester) = tester();
    let partner_id = api.seed_partner(ENV, "Acme");
    let config = json!({
        "name": "acme-as2",
        "role": "receive",
        "type": "http",
        "partner_id": partner_id,
        "environment_id": ENV,
        "http_config": [{
            "server_address": "b2b.acme.test",
            "server_port": 443,
            "path": "/inbound",
            "protocol": "https",
            "auth_mode": [{"type": "basic", "username": "acme", "password": "s3cret"}],
            "tls_context": [{"need_certificate": true}]
        }]
    });

    let state = tester
        .lifecycle_create("muleb2b_endpoint", config.clone())
        .await
        .unwrap();
    assert_eq!(state["http_config"][0]["response_timeout"], json!(15000));
    assert_eq!(state["http_config"][0]["tls_context"][0]["insecure"], json!(false));

    assert_eq!(
        state["http_config"][0]["auth_mode"][0]["password"],
        json!("s3cret")
    );

    let plan = tester
        .plan_update("muleb2b_endpoint", state, config)
        .await
        .unwrap();
    assert_plan_no_changes(&plan);
}

#[tokio::test]
async fn test_partial_x12_block_plans_clean() {
    let (_, tester) = tester();
    let mut config = partner_config();
    config["x12_inbound_config"] = json!([{"acknowledgements": [{"generate_ta1": true}]}]);

    let state = tester
        .lifecycle_create("muleb2b_partner", config.clone())
        .await
        .unwrap();
    let x12 = &state["x12_inbound_config"][0];
    assert_eq!(x12["acknowledgements"][0]["generate_ta1"], json!(true));
    assert_eq!(x12["character_set"], json!("EXTENDED"));
    assert_eq!(
        x12["validations"][0]["fail_when_segments_out_of_order"],
        json!(true)
    );

    let plan = tester
        .plan_update("muleb2b_partner", state.clone(), config.clone())
        .await
        .unwrap();
    assert_plan_no_changes(&plan);

    config["x12_inbound_config"][0]["acknowledgements"][0]["generate_ta1"] = json!(false);
    let plan = tester
        .plan_update("muleb2b_partner", state, config)
        .await
        .unwrap();
    assert_plan_changes_attribute(&plan, "x12_inbound_config");
    assert_eq!(
        plan.planned_state["x12_inbound_config"][0]["acknowledgements"][0]
            ["failure_acknowledgement_type"],
        json!(0)
    );
}

#[tokio::test]
async fn test_contact_and_address_edits_settle() {
    let (api, tester) = tester();
    let mut config = partner_config();
    config["contact"][0]["phone"] = json!("111");
    config["address"] = json!([{
        "address_line_1": "1 Main St",
        "address_line_2": "Suite 5",
        "city": "Springfield",
        "state": "IL",
        "country": "US",
        "postal_code": "62701"
    }]);
    let state = tester
        .lifecycle_create("muleb2b_partner", config.clone())
        .await
        .unwrap();

    config["contact"][0]["phone"] = json!("222");
    config["address"][0]
        .as_object_mut()
        .unwrap()
        .remove("address_line_2");
    let updated = tester
        .lifecycle_update("muleb2b_partner", state, config.clone())
        .await
        .unwrap();
    assert_eq!(updated["contact"][0]["phone"], json!("222"));
    assert!(updated["address"][0].get("address_line_2").is_none());
    assert_eq!(api.calls_to("update_contact").len(), 1);

    let plan = tester
        .plan_update("muleb2b_partner", updated, config)
        .await
        .unwrap();
    assert_plan_no_changes(&plan);
}
