use hydra_pywr_core::client::ClientError;
use hydra_pywr_core::config::HydraConfig;
use hydra_pywr_core::hydra::NewAttribute;
use hydra_pywr_core::{HydraClient, JsonConnection};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_call_sends_function_envelope_and_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json"))
        .and(header("session_id", "abc123"))
        .and(header("user_id", "4"))
        .and(body_partial_json(json!({"get_template": {"template_id": 9}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 9,
            "name": "Pywr",
            "templatetypes": [
                {"id": 1, "name": "pywr_network", "resource_type": "NETWORK", "typeattrs": null}
            ],
            "cr_date": "2023-04-01"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let conn = JsonConnection::new(server.uri())
        .with_session("abc123")
        .with_user_id(4);
    let template = conn.get_template(9).await.unwrap();
    assert_eq!(template.name, "Pywr");
    assert_eq!(template.network_type().unwrap().id, 1);
}

#[tokio::test]
async fn test_login_stores_session_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json"))
        .and(body_partial_json(json!({"login": {"username": "modeller"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s-1",
            "user_id": 12
        })))
        .mount(&server)
        .await;

    let config = HydraConfig {
        url: server.uri(),
        username: Some("modeller".to_string()),
        password: Some("pw".to_string()),
        ..HydraConfig::default()
    };
    let conn = JsonConnection::connect(&config).await.unwrap();
    assert_eq!(conn.session_id(), Some("s-1"));
    assert_eq!(conn.user_id(), Some(12));
}

#[tokio::test]
async fn test_login_falls_back_to_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "beaker.session.id=cookie-7; Path=/")
                .set_body_json(json!("OK")),
        )
        .mount(&server)
        .await;

    let mut conn = JsonConnection::new(server.uri());
    conn.login("modeller", "pw").await.unwrap();
    assert_eq!(conn.session_id(), Some("cookie-7"));
}

#[tokio::test]
async fn test_fault_body_becomes_fault_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "faultcode": "HydraError",
            "faultstring": "Network 99 not found"
        })))
        .mount(&server)
        .await;

    let conn = JsonConnection::new(server.uri());
    let err = conn.get_network(99, true, None).await.unwrap_err();
    match err {
        ClientError::Fault { code, message } => {
            assert_eq!(code, "HydraError");
            assert_eq!(message, "Network 99 not found");
        }
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let conn = JsonConnection::new(server.uri());
    let err = conn.get_attributes().await.unwrap_err();
    assert!(matches!(err, ClientError::Http { status: 502, .. }));
}

#[tokio::test]
async fn test_add_attributes_and_resource_attribute_arguments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"add_attributes": {"attrs": [{"name": "max_flow"}]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 31, "name": "max_flow", "dimension_id": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"add_resource_attribute": {
            "resource_type": "NODE",
            "resource_id": 4,
            "attr_id": 31,
            "is_var": "Y",
            "error_on_duplicate": false
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 77, "attr_id": 31, "attr_is_var": "Y", "ref_key": "NODE"
        })))
        .mount(&server)
        .await;

    let conn = JsonConnection::new(server.uri());
    let attrs = conn.add_attributes(&[NewAttribute::new("max_flow")]).await.unwrap();
    assert_eq!(attrs[0].id, 31);

    let ra = conn.add_resource_attribute("node", 4, 31, true).await.unwrap();
    assert_eq!(ra.id, 77);
    assert!(ra.is_var());
}

#[tokio::test]
async fn test_unparseable_result_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let conn = JsonConnection::new(server.uri());
    let err = conn.get_dimension_by_name("Volume").await.unwrap_err();
    assert!(matches!(err, ClientError::Parse { function, .. } if function == "get_dimension_by_name"));
}
