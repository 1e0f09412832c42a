use anyhow::{Context, Result};
use awsutil::cli::{merged_config, require_queue_url, require_topic_arn, Cli, Command};
use awsutil::config::{
    build_secrets_client, build_sns_client, build_sqs_client, load_sdk_config,
};
use awsutil::logging;
use awsutil::publish::{publish, PublishInput};
use awsutil::receive::ReceiveLoop;
use awsutil::secrets::{SecretStore, SecretsManagerStore};
use awsutil::sns::SnsNotificationClient;
use awsutil::sqs::{QueueClient, SqsQueueClient};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init(args.common.debug);

    let cfg = merged_config(&args.common)?;
    let endpoint = cfg.endpoint_url();
    debug!(
        region = %cfg.runtime.region,
        mode = ?cfg.runtime.mode,
        endpoint = endpoint.as_deref(),
        "config loaded"
    );
    let shared = load_sdk_config(&cfg).await;

    match args.command {
        Command::Receive(recv) => {
            let options = recv.options(&cfg)?;
            let client = SqsQueueClient::new(build_sqs_client(&cfg, &shared));
            let receiver = ReceiveLoop::new(client, options);

            let shutdown = CancellationToken::new();
            let signal_shutdown = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("received Ctrl+C, stopping after the current batch");
                        signal_shutdown.cancel();
                    }
                    Err(e) => error!("failed to listen for Ctrl+C: {e}"),
                }
            });

            receiver.run(shutdown).await.context("receive loop failed")?;
        }
        Command::ListQueues => {
            let client = SqsQueueClient::new(build_sqs_client(&cfg, &shared));
            for url in client.list().await? {
                println!("{url}");
            }
        }
        Command::Purge(purge) => {
            let queue_url = require_queue_url(purge.queue_url.as_ref(), &cfg)?;
            let client = SqsQueueClient::new(build_sqs_client(&cfg, &shared));
            client
                .purge(&queue_url)
                .await
                .with_context(|| format!("purging {queue_url}"))?;
            println!("Queue {queue_url} purged");
        }
        Command::Publish(pub_args) => {
            let topic_arn = require_topic_arn(pub_args.topic_arn.as_ref(), &cfg)?;
            let input = PublishInput::from_file(&pub_args.event, pub_args.raw).await?;
            let client = SnsNotificationClient::new(build_sns_client(&cfg, &shared));
            publish(&client, &topic_arn, &input).await?;
            println!("Message published");
        }
        Command::FindSecret(secret) => {
            let store = SecretsManagerStore::new(build_secrets_client(&cfg, &shared));
            for s in store.find(&secret.secret_name).await? {
                if s.description.is_empty() {
                    println!("{}", s.name);
                } else {
                    println!("{} ({})", s.name, s.description);
                }
            }
        }
        Command::GetSecret(secret) => {
            let store = SecretsManagerStore::new(build_secrets_client(&cfg, &shared));
            println!("{}", store.get(&secret.secret_name).await?);
        }
    }

    Ok(())
}
