use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    pub delivery: DeliveryConfig,
    pub affiliations_path: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "6543".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store = StoreConfig {
            base_url: env_or("DX_STORE_URL", "http://localhost:9200/clincoded"),
            timeout: seconds_var("DX_STORE_TIMEOUT_SECS", 10)?,
        };

        let delivery = DeliveryConfig {
            timeout: seconds_var("DX_DELIVERY_TIMEOUT_SECS", 10)?,
            routing: BrokerRouting::from_env(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            store,
            delivery,
            affiliations_path: PathBuf::from(env_or(
                "DX_AFFILIATIONS_PATH",
                "config/affiliations.json",
            )),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn seconds_var(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidSeconds { key }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the document store holding indexed classification records.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Broker acknowledgement window and per-deployment routing.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub timeout: Duration,
    pub routing: BrokerRouting,
}

/// Deployment inferred from the inbound request host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deployment {
    Local,
    Production,
    Other,
}

impl Deployment {
    pub fn label(self) -> &'static str {
        match self {
            Deployment::Local => "local",
            Deployment::Production => "production",
            Deployment::Other => "other",
        }
    }
}

/// Maps inbound hosts onto the three broker profiles.
#[derive(Debug, Clone)]
pub struct BrokerRouting {
    pub local_host: String,
    pub production_host: String,
    pub local: BrokerProfile,
    pub production: BrokerProfile,
    pub other: BrokerProfile,
}

impl BrokerRouting {
    fn from_env() -> Self {
        let key_password = env::var("KAFKA_CERT_PW").unwrap_or_default();
        let local_tls = TlsFiles::in_dir(env_or("DX_LOCAL_CERT_DIR", "etc/certs"));
        let exchange_tls = TlsFiles::in_dir(env_or("DX_EXCHANGE_CERT_DIR", "etc/certs/dataexchange"));
        let exchange_bootstrap = env_or("DX_EXCHANGE_BOOTSTRAP", "exchange.clinicalgenome.org:9093");

        Self {
            local_host: env_or("DX_LOCAL_HOST", "localhost:6543"),
            production_host: env_or("DX_PRODUCTION_HOST", "curation.clinicalgenome.org"),
            local: BrokerProfile {
                bootstrap_servers: env_or("DX_LOCAL_BOOTSTRAP", "localhost:9093"),
                topic: env_or("DX_LOCAL_TOPIC", "test"),
                tls: local_tls,
                key_password: key_password.clone(),
            },
            production: BrokerProfile {
                bootstrap_servers: exchange_bootstrap.clone(),
                topic: env_or("DX_PRODUCTION_TOPIC", "gene_validity"),
                tls: exchange_tls.clone(),
                key_password: key_password.clone(),
            },
            other: BrokerProfile {
                bootstrap_servers: exchange_bootstrap,
                topic: env_or("DX_DEV_TOPIC", "gene_validity_dev"),
                tls: exchange_tls,
                key_password,
            },
        }
    }

    /// Exact host match; anything unrecognised is routed to the development exchange.
    pub fn deployment_for_host(&self, host: &str) -> Deployment {
        if host == self.local_host {
            Deployment::Local
        } else if host == self.production_host {
            Deployment::Production
        } else {
            Deployment::Other
        }
    }

    pub fn profile(&self, deployment: Deployment) -> &BrokerProfile {
        match deployment {
            Deployment::Local => &self.local,
            Deployment::Production => &self.production,
            Deployment::Other => &self.other,
        }
    }
}

/// Connection settings for one broker cluster.
#[derive(Clone)]
pub struct BrokerProfile {
    pub bootstrap_servers: String,
    pub topic: String,
    pub tls: TlsFiles,
    pub key_password: String,
}

impl fmt::Debug for BrokerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerProfile")
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("topic", &self.topic)
            .field("tls", &self.tls)
            .field("key_password", &"<redacted>")
            .finish()
    }
}

/// Client key, client certificate, and CA certificate locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub key: PathBuf,
    pub certificate: PathBuf,
    pub ca: PathBuf,
}

impl TlsFiles {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            key: dir.join("client.key"),
            certificate: dir.join("client.crt"),
            ca: dir.join("server.crt"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSeconds { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSeconds { key } => {
                write!(f, "{key} must be a whole number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidSeconds { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "DX_STORE_URL",
            "DX_STORE_TIMEOUT_SECS",
            "DX_DELIVERY_TIMEOUT_SECS",
            "DX_AFFILIATIONS_PATH",
            "DX_LOCAL_HOST",
            "DX_PRODUCTION_HOST",
            "DX_LOCAL_TOPIC",
            "DX_PRODUCTION_TOPIC",
            "DX_DEV_TOPIC",
            "DX_LOCAL_CERT_DIR",
            "DX_EXCHANGE_CERT_DIR",
            "KAFKA_CERT_PW",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 6543);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.store.base_url, "http://localhost:9200/clincoded");
        assert_eq!(config.store.timeout, Duration::from_secs(10));
        assert_eq!(config.delivery.timeout, Duration::from_secs(10));
        assert_eq!(
            config.affiliations_path,
            PathBuf::from("config/affiliations.json")
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 6543));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_timeouts() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DX_DELIVERY_TIMEOUT_SECS", "soon");
        let err = AppConfig::load().expect_err("timeout must be numeric");
        assert!(err.to_string().contains("DX_DELIVERY_TIMEOUT_SECS"));
        reset_env();
    }

    #[test]
    fn routes_hosts_to_three_profiles() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let routing = AppConfig::load().expect("config loads").delivery.routing;

        let local = routing.deployment_for_host("localhost:6543");
        let production = routing.deployment_for_host("curation.clinicalgenome.org");
        let other = routing.deployment_for_host("curation-test.clinicalgenome.org");

        assert_eq!(local, Deployment::Local);
        assert_eq!(production, Deployment::Production);
        assert_eq!(other, Deployment::Other);

        assert_eq!(routing.profile(local).topic, "test");
        assert_eq!(routing.profile(local).bootstrap_servers, "localhost:9093");
        assert_eq!(routing.profile(production).topic, "gene_validity");
        assert_eq!(routing.profile(other).topic, "gene_validity_dev");
        assert_eq!(
            routing.profile(other).tls.ca,
            PathBuf::from("etc/certs/dataexchange/server.crt")
        );
    }

    #[test]
    fn broker_profile_debug_redacts_passphrase() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("KAFKA_CERT_PW", "hunter2");
        let routing = AppConfig::load().expect("config loads").delivery.routing;
        let rendered = format!("{:?}", routing.production);
        assert_eq!(routing.production.key_password, "hunter2");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        reset_env();
    }
}
