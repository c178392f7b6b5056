use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use energy_predictor::{
    config::Config,
    create_router,
    features::Predictor,
    model::ArtifactStore,
    validation::{BuildingData, BuildingRecord},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "energy_predictor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store = ArtifactStore::new(&config.artifact_dir);
    let bundle = store
        .load(&config.model_name)
        .with_context(|| {
            format!(
                "failed to load artifacts for {} from {}",
                config.model_name,
                config.artifact_dir.display()
            )
        })?;

    let model_in = bundle.model.n_features_in();
    if model_in != config.model_width {
        bail!(
            "model expects {} features but MODEL_WIDTH is {}",
            model_in,
            config.model_width
        );
    }

    let predictor =
        Predictor::new(bundle, config.model_width).with_feature_logging(config.log_features);
    tracing::info!(
        "loaded {}; features[{}] scaler_width={} model_width={}",
        config.model_name,
        predictor.features().len(),
        predictor.scaler_width(),
        predictor.model_width()
    );
    if predictor.padding_gap() > 0 {
        tracing::warn!(
            "scaler expects {} more columns than the feature list; padding with zeros",
            predictor.padding_gap()
        );
    }

    // Warmup on the schema example so artifact mismatches surface before serving
    let sample = BuildingRecord::try_from(BuildingData::example())?;
    let warm = predictor
        .predict(&sample)
        .context("warmup prediction failed")?;
    tracing::info!("warmup prediction ok ({} kBTU)", warm);

    let state = AppState::new(predictor, config.model_name.clone());
    let app = create_router(state);

    let addr = config.bind_addr();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
