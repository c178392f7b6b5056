/// End-to-end tests for the prediction endpoint
///
/// Run with: cargo test --test api_tests -- --nocapture

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

use energy_predictor::{
    create_router,
    features::{Predictor, GFA_LOG_FEATURE},
    model::{
        ArtifactBundle, ArtifactMeta, ArtifactStore, Kernel, ModelArtifact, StandardScaler,
        SvrModel,
    },
    types::{ErrorBody, MetadataResponse, PredictResponse, Status},
    AppState,
};

const MODEL_NAME: &str = "seattle_energy_svr:latest";

fn feature_list() -> Vec<String> {
    [
        GFA_LOG_FEATURE,
        "NumberofFloors",
        "BuildingAge",
        "HasGas",
        "HasSteam",
        "HasElectricity",
        "NumberofBuildings",
        "Latitude",
        "Longitude",
        "LargestPropertyUseTypeGFA_log",
        "PropertyGFAParking_log",
        "BuildingType_NonResidential",
        "BuildingType_Nonresidential COS",
        "BuildingType_SPS-District K-12",
        "PrimaryPropertyType_Hotel",
        "PrimaryPropertyType_K-12 School",
        "PrimaryPropertyType_Large Office",
        "PrimaryPropertyType_Mixed Use Property",
        "PrimaryPropertyType_Retail Store",
        "PrimaryPropertyType_Small- and Mid-Sized Office",
        "PrimaryPropertyType_Warehouse",
        "PrimaryPropertyType_Other",
        "Neighborhood_DOWNTOWN",
        "Neighborhood_NORTHEAST",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// 25-wide scaler in front of a 24-wide RBF SVR, as shipped.
fn artifacts() -> (ModelArtifact, StandardScaler, ArtifactMeta) {
    let mut mean = vec![0.0; 25];
    let mut scale = vec![1.0; 25];
    mean[0] = 10.5;
    scale[0] = 1.2;
    mean[1] = 4.0;
    scale[1] = 6.5;
    mean[2] = 60.0;
    scale[2] = 32.0;
    mean[3] = 0.7;
    scale[3] = 0.45;
    let scaler = StandardScaler::new(mean, scale).unwrap();

    let support_vectors: Vec<Vec<f64>> = (0..4)
        .map(|k| (0..24).map(|j| ((j + k) % 5) as f64 * 0.1 - 0.2).collect())
        .collect();
    let svr = SvrModel::new(
        Kernel::Rbf,
        0.04,
        support_vectors,
        vec![0.8, -0.3, 0.5, 0.1],
        13.2,
    )
    .unwrap();

    let meta = ArtifactMeta {
        features: feature_list(),
    };
    (ModelArtifact::Svr(svr), scaler, meta)
}

fn bundle_from(
    model: ModelArtifact,
    scaler: StandardScaler,
    features: Vec<String>,
) -> ArtifactBundle {
    ArtifactBundle::new(model.into_regressor(), Arc::new(scaler), features)
}

fn app_with(bundle: ArtifactBundle) -> Router {
    create_router(AppState::new(Predictor::new(bundle, 24), MODEL_NAME))
}

fn test_app() -> Router {
    let (model, scaler, meta) = artifacts();
    app_with(bundle_from(model, scaler, meta.features))
}

fn example_payload() -> Value {
    json!({
        "PropertyGFATotal": 50000.0,
        "NumberofFloors": 5,
        "BuildingAge": 25,
        "HasGas": 1,
        "ENERGYSTARScore": 65.0
    })
}

async fn post_json(app: Router, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn predict(app: Router, payload: &Value) -> (StatusCode, Value) {
    post_json(app, payload.to_string()).await
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_example_prediction_succeeds() {
    println!("\n=== Test: Example Prediction ===");
    let (status, body) = predict(test_app(), &example_payload()).await;
    assert_eq!(status, StatusCode::OK);

    let parsed: PredictResponse = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.status, Status::Success);
    assert!(parsed.prediction_kbtu.is_finite());
    assert!(parsed.prediction_kbtu > 0.0);
    assert_eq!(
        parsed.prediction_kbtu,
        (parsed.prediction_kbtu * 100.0).round() / 100.0,
        "prediction should be rounded to 2 decimals"
    );
    println!("✓ prediction_kbtu = {}", parsed.prediction_kbtu);
}

#[tokio::test]
async fn test_prediction_is_deterministic() {
    let (_, first) = predict(test_app(), &example_payload()).await;
    let (_, second) = predict(test_app(), &example_payload()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_energy_star_score_defaults() {
    let mut payload = example_payload();
    payload.as_object_mut().unwrap().remove("ENERGYSTARScore");

    let (status, body) = predict(test_app(), &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    // the score is validated but does not feed the model
    let (_, with_score) = predict(test_app(), &example_payload()).await;
    assert_eq!(body["prediction_kbtu"], with_score["prediction_kbtu"]);
}

#[tokio::test]
async fn test_validation_errors_name_fields() {
    println!("\n=== Test: Validation Errors ===");
    let mut payload = example_payload();
    payload["PropertyGFATotal"] = json!(0);
    payload["HasGas"] = json!(2);

    let (status, body) = predict(test_app(), &payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let parsed: ErrorBody = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.status, Status::Error);
    let fields: Vec<&str> = parsed.errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["PropertyGFATotal", "HasGas"]);
    assert_eq!(parsed.errors[1].rule, "must be 0 or 1");
    println!("✓ {}", parsed.message);
}

#[tokio::test]
async fn test_has_gas_boundaries() {
    let cases = [
        (0, StatusCode::OK),
        (1, StatusCode::OK),
        (2, StatusCode::UNPROCESSABLE_ENTITY),
    ];
    for (has_gas, expected) in cases {
        let mut payload = example_payload();
        payload["HasGas"] = json!(has_gas);
        let (status, _) = predict(test_app(), &payload).await;
        assert_eq!(status, expected, "HasGas={}", has_gas);
    }
}

#[tokio::test]
async fn test_missing_required_field() {
    let mut payload = example_payload();
    payload.as_object_mut().unwrap().remove("BuildingAge");

    let (status, body) = predict(test_app(), &payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "BuildingAge");
    assert_eq!(body["errors"][0]["rule"], "required");
}

#[tokio::test]
async fn test_malformed_json_is_structured() {
    let (status, body) = post_json(test_app(), "{ not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("malformed request body"));
}

#[tokio::test]
async fn test_narrow_scaler_returns_structured_error() {
    println!("\n=== Test: Scaler Narrower Than Feature List ===");
    let (model, _, meta) = artifacts();
    let scaler = StandardScaler::new(vec![0.0; 20], vec![1.0; 20]).unwrap();

    let app = app_with(bundle_from(model, scaler, meta.features));
    let (status, body) = predict(app, &example_payload()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let parsed: ErrorBody = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.status, Status::Error);
    assert_eq!(
        parsed.message,
        "prediction failed: scaler expects 20 features but 24 were assembled"
    );
    println!("✓ {}", parsed.message);
}

#[tokio::test]
async fn test_missing_gfa_column_returns_structured_error() {
    let (model, scaler, meta) = artifacts();
    let mut features = meta.features;
    features[0] = "PropertyGFABuilding(s)_log".to_string();

    let app = app_with(bundle_from(model, scaler, features));
    let (status, body) = predict(app, &example_payload()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains(GFA_LOG_FEATURE));
}

#[tokio::test]
async fn test_metadata_reports_widths() {
    let (status, body) = get_json(test_app(), "/metadata").await;
    assert_eq!(status, StatusCode::OK);

    let parsed: MetadataResponse = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.model_name, MODEL_NAME);
    assert_eq!(parsed.features.len(), 24);
    assert_eq!(parsed.scaler_width, 25);
    assert_eq!(parsed.model_width, 24);
    assert_eq!(parsed.padding_gap, 1);
}

#[tokio::test]
async fn test_health_and_example() {
    let (status, body) = get_json(test_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(!body["version"].as_str().unwrap().is_empty());

    let (status, example) = get_json(test_app(), "/predict/example").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(example, example_payload());
}

#[tokio::test]
async fn test_store_round_trip_serves_same_prediction() {
    println!("\n=== Test: Artifacts Loaded From Disk ===");
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let (model, scaler, meta) = artifacts();
    store.save(MODEL_NAME, &model, &scaler, &meta).unwrap();

    let loaded = store.load("seattle_energy_svr").unwrap();
    let (_, from_disk) = predict(app_with(loaded), &example_payload()).await;
    let (_, in_memory) = predict(test_app(), &example_payload()).await;

    assert_eq!(from_disk["status"], "success");
    assert_eq!(from_disk, in_memory);
    println!("✓ prediction_kbtu = {}", from_disk["prediction_kbtu"]);
}

#[tokio::test]
async fn test_shipped_artifacts_predict_example() {
    println!("\n=== Test: Shipped Artifacts ===");
    let store = ArtifactStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/artifacts"));
    let bundle = store.load(MODEL_NAME).unwrap();

    let (status, body) = predict(app_with(bundle), &example_payload()).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let parsed: PredictResponse = serde_json::from_value(body).unwrap();
    assert_eq!(parsed.status, Status::Success);
    assert!(parsed.prediction_kbtu.is_finite());
    assert!(parsed.prediction_kbtu > 0.0);
    println!("✓ prediction_kbtu = {}", parsed.prediction_kbtu);
}
