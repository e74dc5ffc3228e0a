use std::sync::Arc;

use auth_lambda::config::AuthLambdaConfig;
use auth_lambda::{
    build_lambda_router, build_router, AppState, Customer, LookupHandler, MongoCustomerStore,
    SERVICE_NAME,
};
use common_auth::{PlaceholderTokenIssuer, TokenIssuer};
use common_config::load;
use common_obs::ObsInit;
use tokio::net::TcpListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_sha() -> &'static str {
    option_env!("BUILD_SHA").unwrap_or("unknown")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ObsInit::init(SERVICE_NAME).map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;

    let config = load::<AuthLambdaConfig>()?;
    tracing::info!(
        event = "service_start",
        service = SERVICE_NAME,
        version = VERSION,
        build_sha = build_sha(),
        lambda_runtime = config.lambda_runtime,
        collection = config.store.collection.as_str(),
        "starting service"
    );

    let store = MongoCustomerStore::connect(&config.store).await?;
    if let Err(error) = store.ping().await {
        tracing::warn!(
            %error,
            database = store.database(),
            "customer store ping failed; connection will be retried on first lookup"
        );
    }

    let issuer: Arc<dyn TokenIssuer<Customer>> =
        Arc::new(PlaceholderTokenIssuer::new(config.placeholder_token.clone()));
    let handler = LookupHandler::new(Arc::new(store), issuer);
    let state = Arc::new(AppState::new(handler));

    if config.lambda_runtime {
        lambda_http::run(build_lambda_router(state))
            .await
            .map_err(|err| -> Box<dyn std::error::Error> { err })?;
    } else {
        let addr = config.socket_addr()?;
        tracing::info!(listen_addr = %addr, "serving local HTTP endpoint");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, build_router(state).into_make_service()).await?;
    }

    tracing::info!(event = "service_stop", service = SERVICE_NAME);

    Ok(())
}
