use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::{AppConfig, RuntimeMode};
use crate::receive::{default_out_file, MalformedPolicy, OutputMode, ReceiveOptions};

#[derive(Parser, Debug)]
#[command(name = "awsutil", version, about = "Poll SQS queues, publish to SNS, read secrets")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every subcommand.
#[derive(Clone, Debug, ClapArgs)]
pub struct CommonArgs {
    /// Use the LocalStack endpoint
    #[arg(long, short = 'l', global = true)]
    pub local: bool,

    /// Print debug logs
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Path to the config file (optional)
    #[arg(long, global = true, default_value = "awsutil.toml")]
    pub config: PathBuf,

    /// Override the AWS region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Override the service endpoint for every client
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// SQS: Continuously poll messages from a queue
    Receive(ReceiveArgs),
    /// SQS: List all queues
    ListQueues,
    /// SQS: Purge a queue
    Purge(PurgeArgs),
    /// SNS: Publish to a topic
    Publish(PublishArgs),
    /// Secrets Manager: Find secrets by name
    FindSecret(SecretArgs),
    /// Secrets Manager: Print a secret string
    GetSecret(SecretArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ReceiveArgs {
    /// Queue URL
    #[arg(env = "QUEUE_URL")]
    pub queue_url: Option<String>,

    /// Delete polled messages from the queue after they are written
    #[arg(long)]
    pub delete: bool,

    /// Output file (defaults to <out_dir>/<queue-name>_events.jsonl)
    #[arg(long)]
    pub out_file: Option<PathBuf>,

    /// Seconds to wait between polls
    #[arg(long, env = "POLLING_FREQUENCY")]
    pub polling_frequency: Option<u64>,

    /// Store the full received queue message instead of the payload
    #[arg(long)]
    pub full_message: bool,

    /// Stop instead of skipping a message that is not a notification envelope
    #[arg(long)]
    pub abort_on_malformed: bool,

    /// Messages per receive call (1-10)
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=10))]
    pub max_messages: Option<i32>,

    /// Visibility timeout in seconds for received messages
    #[arg(long)]
    pub visibility_timeout: Option<i32>,
}

#[derive(ClapArgs, Debug)]
pub struct PurgeArgs {
    /// Queue URL
    #[arg(env = "QUEUE_URL")]
    pub queue_url: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct PublishArgs {
    /// JSON file with the message to publish
    #[arg(long)]
    pub event: PathBuf,

    /// Topic ARN
    #[arg(long, env = "SNS_TOPIC_ARN")]
    pub topic_arn: Option<String>,

    /// Publish the whole file as the message (no Message/MessageAttributes keys)
    #[arg(long)]
    pub raw: bool,
}

#[derive(ClapArgs, Debug)]
pub struct SecretArgs {
    /// Secret name
    pub secret_name: String,
}

/// Load the config file and environment, then apply the global flags.
pub fn merged_config(common: &CommonArgs) -> Result<AppConfig> {
    let mut cfg = AppConfig::load(&common.config)?;
    apply_common(&mut cfg, common);
    Ok(cfg)
}

/// Global flags take precedence over config file and environment.
pub fn apply_common(cfg: &mut AppConfig, common: &CommonArgs) {
    if common.local {
        cfg.runtime.mode = RuntimeMode::Local;
    }
    if let Some(region) = &common.region {
        cfg.runtime.region.clone_from(region);
    }
    if let Some(ep) = &common.endpoint_url {
        cfg.runtime.endpoint_url = Some(ep.clone());
    }
}

/// Require a queue URL from either CLI/env or config; otherwise fail.
pub fn require_queue_url(arg: Option<&String>, cfg: &AppConfig) -> Result<String> {
    arg.cloned()
        .or_else(|| cfg.sqs.queue_url.clone())
        .ok_or_else(|| {
            anyhow!("Queue URL is required. Pass it as an argument, set QUEUE_URL, or set [sqs].queue_url in the config.")
        })
}

/// Require a topic ARN from either CLI/env or config; otherwise fail.
pub fn require_topic_arn(arg: Option<&String>, cfg: &AppConfig) -> Result<String> {
    arg.cloned()
        .or_else(|| cfg.sns.topic_arn.clone())
        .ok_or_else(|| {
            anyhow!("Topic ARN is required. Pass --topic-arn, set SNS_TOPIC_ARN, or set [sns].topic_arn in the config.")
        })
}

impl ReceiveArgs {
    /// Resolve receive-loop options: flag > environment > config > default.
    pub fn options(&self, cfg: &AppConfig) -> Result<ReceiveOptions> {
        let queue_url = require_queue_url(self.queue_url.as_ref(), cfg)?;
        let out_file = self
            .out_file
            .clone()
            .unwrap_or_else(|| default_out_file(&cfg.recv.out_dir, &queue_url));

        Ok(ReceiveOptions {
            out_file,
            delete: self.delete,
            polling_frequency: Duration::from_secs(
                self.polling_frequency
                    .unwrap_or(cfg.recv.polling_frequency_secs),
            ),
            max_messages: self.max_messages.unwrap_or(cfg.sqs.max_messages),
            visibility_timeout_secs: self
                .visibility_timeout
                .unwrap_or(cfg.sqs.visibility_timeout_secs),
            output: if self.full_message {
                OutputMode::FullMessage
            } else {
                OutputMode::Payload
            },
            on_malformed: if self.abort_on_malformed {
                MalformedPolicy::Abort
            } else {
                MalformedPolicy::Skip
            },
            queue_url,
        })
    }
}
