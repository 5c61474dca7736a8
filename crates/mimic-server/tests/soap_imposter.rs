//! Live-socket integration tests for SOAP imposters.
//!
//! Each test binds an ephemeral port through the manager and drives the
//! imposter with a real HTTP client.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tokio::time::sleep;

use mimic_server::imposter::{
    create_server, ImposterConfig, ImposterError, ImposterManager, ResponseTemplate, Stub,
    StubResponse,
};

const STOCK_WSDL: &str = r#"<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/" targetNamespace="http://example.com/stock">
  <wsdl:portType name="StockQuotePortType">
    <wsdl:operation name="GetQuote"/>
  </wsdl:portType>
</wsdl:definitions>"#;

const GET_QUOTE_ENVELOPE: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body><op:GetQuote xmlns:op="http://example.com/stock"/></soapenv:Body>
</soapenv:Envelope>"#;

fn header_stub(headers: &[(&str, &str)]) -> Stub {
    Stub {
        predicates: vec![],
        responses: vec![StubResponse::Is {
            is: ResponseTemplate {
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                response: serde_json::Value::Null,
            },
        }],
    }
}

#[tokio::test]
async fn ephemeral_port_is_observable_on_the_handle() {
    let manager = ImposterManager::new(false, false);
    let config = ImposterConfig {
        name: Some("partners".to_string()),
        ..Default::default()
    };
    let handle = manager.create_imposter(config).await.expect("create");

    assert_ne!(handle.port(), 0);
    assert_eq!(handle.metadata().name.as_deref(), Some("partners"));
    manager.delete_all();
}

#[tokio::test]
async fn end_to_end_one_way_response() {
    let manager = ImposterManager::new(false, false);
    let config = ImposterConfig {
        stubs: vec![header_stub(&[("X", "1")])],
        ..Default::default()
    };
    let handle = manager.create_imposter(config).await.expect("create");

    let client = Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/", handle.port()))
        .body("")
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 202);
    assert_eq!(
        response.headers().get("x").and_then(|v| v.to_str().ok()),
        Some("1")
    );
    assert_eq!(
        response
            .headers()
            .get("connection")
            .and_then(|v| v.to_str().ok()),
        Some("close")
    );
    assert_eq!(response.text().await.unwrap(), "");

    manager.delete_all();
}

#[tokio::test]
async fn schema_driven_response_wraps_rendered_body() {
    let manager = ImposterManager::new(false, false);
    let config = ImposterConfig {
        wsdl: Some(STOCK_WSDL.to_string()),
        stubs: vec![Stub {
            predicates: vec![],
            responses: vec![StubResponse::Is {
                is: ResponseTemplate {
                    headers: HashMap::new(),
                    response: json!({"price": "12.50"}),
                },
            }],
        }],
        ..Default::default()
    };
    let handle = manager.create_imposter(config).await.expect("create");

    let client = Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/stock", handle.port()))
        .body(GET_QUOTE_ENVELOPE)
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("xmlns:mb=\"http://example.com/stock\""));
    assert!(body.contains("<mb:GetQuoteResponse><mb:price>12.50</mb:price></mb:GetQuoteResponse>"));
    assert!(body.starts_with("<soapenv:Envelope"));
    assert!(body.ends_with("</soapenv:Envelope>"));

    manager.delete_all();
}

#[tokio::test]
async fn recording_captures_every_concurrent_request() {
    let manager = ImposterManager::new(false, false);
    let config = ImposterConfig {
        record_requests: true,
        ..Default::default()
    };
    let handle = manager.create_imposter(config).await.expect("create");
    let port = handle.port();

    let client = Client::new();
    let mut tasks = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .post(format!("http://127.0.0.1:{port}/req/{i}"))
                .body("")
                .send()
                .await
                .expect("request")
                .status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 202);
    }

    assert_eq!(handle.requests().len(), 8);
    manager.delete_all();
}

#[tokio::test]
async fn recording_preserves_sequential_arrival_order() {
    let manager = ImposterManager::new(false, false);
    let config = ImposterConfig {
        record_requests: true,
        ..Default::default()
    };
    let handle = manager.create_imposter(config).await.expect("create");
    let port = handle.port();

    let client = Client::new();
    for path in ["/first", "/second", "/third"] {
        let response = client
            .post(format!("http://127.0.0.1:{port}{path}"))
            .body("")
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), 202);
    }

    let paths: Vec<String> = handle.requests().iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec!["/first", "/second", "/third"]);
    manager.delete_all();
}

#[tokio::test]
async fn malformed_request_is_isolated_from_siblings() {
    let manager = ImposterManager::new(false, false);
    let handle = manager
        .create_imposter(ImposterConfig::default())
        .await
        .expect("create");
    let port = handle.port();

    let client = Client::new();
    let (bad, good) = tokio::join!(
        client
            .post(format!("http://127.0.0.1:{port}/"))
            .body("this is not xml")
            .send(),
        client
            .post(format!("http://127.0.0.1:{port}/"))
            .body("")
            .send(),
    );

    let bad = bad.expect("malformed request still gets a reply");
    assert_eq!(bad.status(), 400);
    let details: serde_json::Value = bad.json().await.unwrap();
    assert_eq!(details["code"], "bad data");

    assert_eq!(good.expect("sibling request").status(), 202);

    // The listener survived both.
    let after = client
        .post(format!("http://127.0.0.1:{port}/"))
        .body("")
        .send()
        .await
        .expect("follow-up request");
    assert_eq!(after.status(), 202);

    manager.delete_all();
}

#[tokio::test]
async fn stubs_can_be_added_while_serving() {
    let manager = ImposterManager::new(false, false);
    let handle = manager
        .create_imposter(ImposterConfig::default())
        .await
        .expect("create");
    let port = handle.port();

    let client = Client::new();
    let before = client
        .post(format!("http://127.0.0.1:{port}/"))
        .body("")
        .send()
        .await
        .expect("request");
    assert!(before.headers().get("x-added").is_none());

    handle.add_stub(header_stub(&[("x-added", "yes")]));

    let after = client
        .post(format!("http://127.0.0.1:{port}/"))
        .body("")
        .send()
        .await
        .expect("request");
    assert_eq!(
        after.headers().get("x-added").and_then(|v| v.to_str().ok()),
        Some("yes")
    );

    manager.delete_all();
}

#[tokio::test]
async fn disallowed_injection_fails_before_any_socket_exists() {
    let manager = ImposterManager::new(false, false);
    let config = ImposterConfig {
        stubs: vec![Stub {
            predicates: vec![],
            responses: vec![StubResponse::Inject {
                inject: "#{ response: #{} }".to_string(),
            }],
        }],
        ..Default::default()
    };

    let result = manager.create_imposter(config).await;
    assert!(matches!(result, Err(ImposterError::InvalidStubs(_))));
    assert_eq!(manager.count(), 0);
}

#[tokio::test]
async fn duplicate_port_is_rejected() {
    let manager = ImposterManager::new(false, false);
    let handle = manager
        .create_imposter(ImposterConfig::default())
        .await
        .expect("create");

    let config = ImposterConfig {
        port: Some(handle.port()),
        ..Default::default()
    };
    let result = manager.create_imposter(config).await;
    assert!(matches!(result, Err(ImposterError::PortInUse(_))));

    manager.delete_all();
}

#[tokio::test]
async fn bind_failure_rejects_creation() {
    // Hold the port with a plain listener, then ask the factory for it.
    let blocker = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let config = ImposterConfig {
        port: Some(taken),
        host: Some("127.0.0.1".to_string()),
        ..Default::default()
    };
    let result = create_server(config, false).await;
    assert!(matches!(result, Err(ImposterError::BindError(port, _)) if port == taken));
}

#[tokio::test]
async fn close_stops_accepting_new_connections() {
    let manager = ImposterManager::new(false, false);
    let handle = manager
        .create_imposter(ImposterConfig::default())
        .await
        .expect("create");
    let port = handle.port();

    manager.delete_imposter(port).expect("delete");
    sleep(Duration::from_millis(100)).await;

    let client = Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let result = client
        .post(format!("http://127.0.0.1:{port}/"))
        .body("")
        .send()
        .await;
    assert!(result.is_err());
}
