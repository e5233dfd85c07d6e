mod support;

use std::sync::Arc;

use tracing::Level;
use vigil::StatusCode;
use vigil::service;

use support::{capture, get, send};

#[tokio::test]
async fn healthcheck_reports_ok_and_tags_the_record() {
    let (logs, _guard) = capture();
    let router = Arc::new(service::router());

    let req = http::Request::builder()
        .uri("/healthcheck")
        .header("user-agent", "kube-probe/1.29")
        .body(String::new())
        .unwrap();
    let res = send(&router, req).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(&res.body()[..], br#"["OK"]"#);
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_owned();

    let records = logs.requests();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.message, "REQUEST");
    assert_eq!(record.field("id"), Some(request_id.as_str()));
    assert_eq!(record.json("request")["user-agent"], "kube-probe/1.29");
    assert_eq!(record.json("request")["route"], "/healthcheck");
    assert_eq!(record.field("attributes"), Some(r#"{"Healthcheck":{"health":["OK"]}}"#));
}

#[tokio::test]
async fn status_probes_every_service() {
    let (logs, _guard) = capture();
    let router = Arc::new(service::router());

    let res = get(&router, "/status/").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    for slot in ["service1", "service2", "service3"] {
        assert_eq!(body[slot], "🟢");
    }

    let attributes = logs.requests()[0].json("attributes");
    assert_eq!(attributes["Status"]["service3"]["code"], 200);
    assert_eq!(attributes["Status"]["service1"]["message"], "Mock service service1 is up");
}

#[tokio::test]
async fn unknown_path_is_not_supported() {
    let (logs, _guard) = capture();
    let router = Arc::new(service::router());

    let res = get(&router, "/nope").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(&res.body()[..], br#"{"error":"Not Supported","code":404}"#);

    let record = &logs.requests()[0];
    assert_eq!(record.level, Level::WARN);
    assert_eq!(record.message, "Not Found");
}

#[tokio::test]
async fn debug_and_default_info_answer_json() {
    let router = Arc::new(service::router());

    let res = get(&router, "/debug").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let vars: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert!(vars.is_object());

    let res = get(&router, "/").await;
    let info: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(info["title"], "Welcome to the default page");
}
