//! Handler tests driving the full router with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use kyvert_api::app;
use kyvert_api::error::ErrorBody;
use kyvert_api::routes::convert::{ConvertRequest, ConvertResponse};

const REQUIRE_LABELS: &str = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: require-labels
spec:
  validationFailureAction: Audit
  rules:
    - name: check-for-labels
      match:
        any:
        - resources:
            kinds: [Pod]
      validate:
        message: "label 'app.kubernetes.io/name' is required"
        pattern:
          metadata:
            labels:
              app.kubernetes.io/name: "?*"
"#;

fn convert_request(yaml: &str) -> Request<Body> {
    let body = serde_json::to_vec(&ConvertRequest {
        yaml: yaml.to_string(),
    })
    .unwrap();
    Request::builder()
        .method("POST")
        .uri("/v1/convert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

#[tokio::test]
async fn health_probes_respond() {
    for uri in ["/health/liveness", "/health/readiness"] {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn convert_returns_validating_policy_yaml() {
    let response = app().oneshot(convert_request(REQUIRE_LABELS)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: ConvertResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(body.converted_yaml.contains("kind: ValidatingPolicy"));
    assert!(body
        .converted_yaml
        .contains("'app.kubernetes.io/name' in object.metadata.labels"));
}

#[tokio::test]
async fn response_field_is_camel_cased() {
    let response = app().oneshot(convert_request(REQUIRE_LABELS)).await.unwrap();
    let bytes = body_bytes(response).await;
    let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(raw.get("convertedYaml").is_some(), "{raw}");
}

#[tokio::test]
async fn malformed_policy_yields_parse_error() {
    let response = app().oneshot(convert_request(": not yaml :")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: ErrorBody = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.error.code, "PARSE_ERROR");
}

#[tokio::test]
async fn unsupported_construct_reports_field_path() {
    let yaml = r#"
apiVersion: kyverno.io/v1
kind: ClusterPolicy
metadata:
  name: add-labels
spec:
  rules:
    - name: add-team-label
      match:
        any:
        - resources:
            kinds: [Pod]
      mutate:
        patchStrategicMerge:
          metadata: {}
"#;
    let response = app().oneshot(convert_request(yaml)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: ErrorBody = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.error.code, "UNSUPPORTED_CONSTRUCT");
    assert_eq!(body.error.path.as_deref(), Some("spec.rules[0].mutate"));
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let response = app().oneshot(convert_request("   ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: ErrorBody = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body.error.code, "BAD_REQUEST");
}
