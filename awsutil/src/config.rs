use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::{provider::SharedCredentialsProvider, Credentials};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::sqs::{DEFAULT_MAX_MESSAGES, DEFAULT_VISIBILITY_TIMEOUT_SECS};

pub const LOCAL_ENDPOINT: &str = "http://localhost:4566";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Local,
    Aws,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    pub region: String,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqsConfig {
    pub queue_url: Option<String>,
    pub max_messages: i32,
    pub visibility_timeout_secs: i32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SnsConfig {
    pub topic_arn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecvConfig {
    pub polling_frequency_secs: u64,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub runtime: RuntimeConfig,
    pub sqs: SqsConfig,
    #[serde(default)]
    pub sns: SnsConfig,
    pub recv: RecvConfig,
}

impl AppConfig {
    /// Load and MERGE, later sources override earlier ones:
    ///  - built-in defaults
    ///  - config file (optional, TOML)
    ///  - environment (AWSUTIL_* with "__" nesting)
    pub fn load(config_file: &Path) -> Result<Self> {
        Self::load_with_env(config_file, None)
    }

    /// Same as [`AppConfig::load`] with an explicit environment map instead of
    /// the process environment.
    pub fn load_with_env(
        config_file: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let builder = Config::builder()
            .set_default("runtime.mode", "aws")?
            .set_default("runtime.region", "eu-central-1")?
            .set_default("sqs.max_messages", i64::from(DEFAULT_MAX_MESSAGES))?
            .set_default(
                "sqs.visibility_timeout_secs",
                i64::from(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            )?
            .set_default("recv.polling_frequency_secs", 5_i64)?
            .set_default("recv.out_dir", "out")?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            // e.g. AWSUTIL_RUNTIME__REGION=eu-west-1
            .add_source(
                Environment::with_prefix("AWSUTIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            );

        let cfg = builder.build().context("building merged config")?;
        cfg.try_deserialize().context("deserializing AppConfig")
    }

    pub fn is_local(&self) -> bool {
        matches!(self.runtime.mode, RuntimeMode::Local)
    }

    /// Endpoint override for every client: explicit endpoint first, then the
    /// LocalStack endpoint in local mode.
    pub fn endpoint_url(&self) -> Option<String> {
        self.runtime
            .endpoint_url
            .clone()
            .or_else(|| self.is_local().then(|| LOCAL_ENDPOINT.to_string()))
    }
}

/// Shared SDK configuration for all service clients.
pub async fn load_sdk_config(cfg: &AppConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(cfg.runtime.region.clone()));

    // LocalStack accepts any credentials; static ones skip SSO/profile resolution.
    if cfg.is_local() {
        let creds = Credentials::new("test", "test", None, None, "localstack");
        loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
    }

    loader.load().await
}

pub fn build_sqs_client(cfg: &AppConfig, shared: &SdkConfig) -> aws_sdk_sqs::Client {
    let mut b = aws_sdk_sqs::config::Builder::from(shared);
    if let Some(ep) = cfg.endpoint_url() {
        b = b.endpoint_url(ep);
    }
    aws_sdk_sqs::Client::from_conf(b.build())
}

pub fn build_sns_client(cfg: &AppConfig, shared: &SdkConfig) -> aws_sdk_sns::Client {
    let mut b = aws_sdk_sns::config::Builder::from(shared);
    if let Some(ep) = cfg.endpoint_url() {
        b = b.endpoint_url(ep);
    }
    aws_sdk_sns::Client::from_conf(b.build())
}

pub fn build_secrets_client(
    cfg: &AppConfig,
    shared: &SdkConfig,
) -> aws_sdk_secretsmanager::Client {
    let mut b = aws_sdk_secretsmanager::config::Builder::from(shared);
    if let Some(ep) = cfg.endpoint_url() {
        b = b.endpoint_url(ep);
    }
    aws_sdk_secretsmanager::Client::from_conf(b.build())
}
