#![allow(clippy::disallowed_methods)]

use jamfpro::crud::state::ResourceData;
use jamfpro::JamfProProvider;
use mockito::{Matcher, Mock, Server, ServerGuard};
use tfplug::resource::{
    CreateResourceRequest, DeleteResourceRequest, ReadResourceRequest, UpdateResourceRequest,
};
use tfplug::{AttributePath, Context, DynamicValue, Resource};
use tokio_test::assert_ok;

fn provider_config(url: &str) -> DynamicValue {
    let mut config = DynamicValue::null();
    config
        .set_string(&AttributePath::new("jamfpro_instance_fqdn"), url.to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("auth_method"), "oauth2".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("client_id"), "client".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("client_secret"), "secret".to_string())
        .unwrap();
    config
        .set_number(
            &AttributePath::new("mandatory_request_delay_milliseconds"),
            1.0,
        )
        .unwrap();
    config
}

async fn token_mock(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/api/oauth/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".to_string(),
            "client_credentials".to_string(),
        ))
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"test-token","expires_in":3600}"#)
        .create_async()
        .await
}

fn configured_provider(server: &ServerGuard) -> JamfProProvider {
    let mut provider = JamfProProvider::new();
    let diags = provider.configure(&provider_config(&server.url()));
    assert!(!diags.has_error(), "{}", diags);
    provider
}

fn building_config(name: &str) -> DynamicValue {
    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("name"), name.to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("city"), "Minneapolis".to_string())
        .unwrap();
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn create_building_posts_then_reads_back_state() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server).await;

    let create_mock = server
        .mock("POST", "/api/v1/buildings")
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJsonString(
            r#"{"name":"HQ","city":"Minneapolis"}"#.to_string(),
        ))
        .with_status(201)
        .with_body(r#"{"id":"7","href":"/api/v1/buildings/7"}"#)
        .expect(1)
        .create_async()
        .await;

    let read_mock = server
        .mock("GET", "/api/v1/buildings/7")
        .match_header("authorization", "Bearer test-token")
        .with_body(
            r#"{"id":"7","name":"HQ","streetAddress1":"1 Main St","streetAddress2":"","city":"Minneapolis","stateProvince":"MN","zipPostalCode":"55401","country":"US"}"#,
        )
        // availability check, then the state read-back
        .expect(2)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = assert_ok!(provider.create_resource("jamfpro_building"));

    let config = building_config("HQ");
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "jamfpro_building".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    assert!(!response.diagnostics.has_error(), "{}", response.diagnostics);
    assert_eq!(response.new_state.id(), "7");
    assert_eq!(
        response
            .new_state
            .get_string(&AttributePath::new("street_address1"))
            .unwrap(),
        "1 Main St"
    );
    assert_eq!(
        response
            .new_state
            .get_optional_string(&AttributePath::new("street_address2"))
            .unwrap(),
        None
    );

    create_mock.assert_async().await;
    read_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn create_with_rejected_payload_reports_error_without_retrying() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server).await;

    let create_mock = server
        .mock("POST", "/api/v1/buildings")
        .with_status(400)
        .with_body(
            r#"{"httpStatus":400,"errors":[{"code":"INVALID_FIELD","field":"name","description":"name must be unique"}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = provider.create_resource("jamfpro_building").unwrap();

    let config = building_config("HQ");
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "jamfpro_building".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    assert!(response.diagnostics.has_error());
    let error = response.diagnostics.errors().next().unwrap();
    assert_eq!(error.summary, "Failed to create building");
    assert!(error.detail.contains("name must be unique"), "{}", error.detail);
    assert_eq!(response.new_state.id(), "");

    create_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn create_fails_when_new_building_cannot_be_read() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server).await;

    let _create_mock = server
        .mock("POST", "/api/v1/buildings")
        .with_status(201)
        .with_body(r#"{"id":"8","href":"/api/v1/buildings/8"}"#)
        .create_async()
        .await;

    let availability_mock = server
        .mock("GET", "/api/v1/buildings/8")
        .with_status(403)
        .with_body("Forbidden")
        .expect(1)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = provider.create_resource("jamfpro_building").unwrap();

    let config = building_config("Depot");
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "jamfpro_building".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    let errors: Vec<_> = response.diagnostics.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].summary, "Failed to confirm building creation");
    assert!(errors[0].detail.contains("ID '8'"), "{}", errors[0].detail);
    assert_eq!(response.new_state.id(), "8");

    availability_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn read_of_deleted_building_removes_it_from_state() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server).await;

    let read_mock = server
        .mock("GET", "/api/v1/buildings/9")
        .with_status(404)
        .with_body("Building not found")
        .expect(1)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = provider.create_resource("jamfpro_building").unwrap();

    let mut state = building_config("Annex");
    state.set_id("9");

    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest::new("jamfpro_building", state),
        )
        .await;

    assert!(!response.diagnostics.has_error(), "{}", response.diagnostics);
    assert!(response.new_state.is_none());
    let warnings: Vec<_> = response.diagnostics.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].summary, "Resource not found");

    read_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn update_puts_then_refreshes_state() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server).await;

    let update_mock = server
        .mock("PUT", "/api/v1/buildings/4")
        .match_body(Matcher::PartialJsonString(r#"{"name":"Renamed"}"#.to_string()))
        .with_body(r#"{"id":"4","name":"Renamed","city":"Minneapolis"}"#)
        .expect(1)
        .create_async()
        .await;

    let read_mock = server
        .mock("GET", "/api/v1/buildings/4")
        .with_body(r#"{"id":"4","name":"Renamed","city":"St Paul"}"#)
        .expect(1)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = provider.create_resource("jamfpro_building").unwrap();

    let mut prior_state = building_config("Old");
    prior_state.set_id("4");
    let config = building_config("Renamed");

    let response = resource
        .update(
            Context::new(),
            UpdateResourceRequest {
                type_name: "jamfpro_building".to_string(),
                prior_state,
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    assert!(!response.diagnostics.has_error(), "{}", response.diagnostics);
    assert_eq!(response.new_state.id(), "4");
    assert_eq!(
        response
            .new_state
            .get_string(&AttributePath::new("city"))
            .unwrap(),
        "St Paul"
    );

    update_mock.assert_async().await;
    read_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_building_calls_api_once() {
    let mut server = Server::new_async().await;
    let _token = token_mock(&mut server).await;

    let delete_mock = server
        .mock("DELETE", "/api/v1/buildings/5")
        .match_header("authorization", "Bearer test-token")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = provider.create_resource("jamfpro_building").unwrap();

    let mut prior_state = building_config("Annex");
    prior_state.set_id("5");

    let response = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "jamfpro_building".to_string(),
                prior_state,
            },
        )
        .await;

    assert!(!response.diagnostics.has_error(), "{}", response.diagnostics);
    delete_mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_timeout_is_reported_before_any_request() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/api/oauth/token")
        .expect(0)
        .create_async()
        .await;

    let provider = configured_provider(&server);
    let resource = provider.create_resource("jamfpro_building").unwrap();

    let mut config = building_config("HQ");
    config
        .set_string(
            &AttributePath::new("timeouts").attribute("create"),
            "soon".to_string(),
        )
        .unwrap();

    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "jamfpro_building".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    assert!(response
        .diagnostics
        .errors()
        .any(|d| d.summary == "Invalid timeout"));
    token.assert_async().await;
}
