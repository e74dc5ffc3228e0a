use std::net::SocketAddr;

use common_auth::DEFAULT_PLACEHOLDER_TOKEN;
use common_config::{env_string, service_port, ConfigError, ServiceConfig};

use crate::store::StoreConfig;

/// Connection string variable, shared with the rest of the deployment.
pub const MONGO_URI_ENV: &str = "MONGO_URI";
/// Set by the Lambda execution environment.
pub const LAMBDA_RUNTIME_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

#[derive(Debug, Clone)]
pub struct AuthLambdaConfig {
    pub bind_address: String,
    pub port: u16,
    pub store: StoreConfig,
    pub placeholder_token: String,
    /// Serve invocations through the Lambda runtime instead of a local listener.
    pub lambda_runtime: bool,
}

impl Default for AuthLambdaConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            store: StoreConfig::default(),
            placeholder_token: DEFAULT_PLACEHOLDER_TOKEN.to_string(),
            lambda_runtime: false,
        }
    }
}

impl AuthLambdaConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_address, self.port).parse()
    }
}

impl ServiceConfig for AuthLambdaConfig {
    const PREFIX: &'static str = "AUTH_LAMBDA_";

    fn apply_environment_overrides(&mut self, prefix: &str) {
        if let Some(uri) = env_string(MONGO_URI_ENV) {
            self.store.uri = uri;
        }
        if let Some(database) = env_string(&format!("{prefix}MONGO_DATABASE")) {
            self.store.database = Some(database);
        }
        if let Some(collection) = env_string(&format!("{prefix}MONGO_COLLECTION")) {
            self.store.collection = collection;
        }
        if let Some(token) = env_string(&format!("{prefix}PLACEHOLDER_TOKEN")) {
            self.placeholder_token = token;
        }
        if let Some(bind_address) = env_string(&format!("{prefix}BIND_ADDRESS")) {
            self.bind_address = bind_address;
        }
        self.port = service_port(&format!("{prefix}PORT"), self.port);
        self.lambda_runtime = env_string(LAMBDA_RUNTIME_ENV).is_some();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.uri.trim().is_empty() {
            return Err(ConfigError::Missing(MONGO_URI_ENV));
        }
        Ok(())
    }
}
