//! Secret lookup against Secrets Manager.

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::types::{Filter, FilterNameStringType};
use aws_sdk_secretsmanager::Client;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSummary {
    pub name: String,
    pub description: String,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Secrets matching `name` (server-side name filter).
    async fn find(&self, name: &str) -> AppResult<Vec<SecretSummary>>;

    /// The secret string stored under `name`.
    async fn get(&self, name: &str) -> AppResult<String>;
}

/// `SecretStore` backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn find(&self, name: &str) -> AppResult<Vec<SecretSummary>> {
        let filter = Filter::builder()
            .key(FilterNameStringType::Name)
            .values(name)
            .build();

        let mut secrets = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let out = self
                .client
                .list_secrets()
                .filters(filter.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| AppError::service("ListSecrets", DisplayErrorContext(&e).to_string()))?;

            secrets.extend(out.secret_list().iter().map(|s| SecretSummary {
                name: s.name().unwrap_or_default().to_string(),
                description: s.description().unwrap_or_default().to_string(),
            }));

            match out.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(secrets)
    }

    async fn get(&self, name: &str) -> AppResult<String> {
        let out = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception())
                {
                    AppError::NotFound(format!("secret {name}"))
                } else {
                    AppError::service("GetSecretValue", DisplayErrorContext(&e).to_string())
                }
            })?;

        out.secret_string()
            .map(ToString::to_string)
            .ok_or_else(|| AppError::NotFound(format!("secret {name} has no string value")))
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_secretsmanager::operation::get_secret_value::{
        GetSecretValueError, GetSecretValueOutput,
    };
    use aws_sdk_secretsmanager::operation::list_secrets::ListSecretsOutput;
    use aws_sdk_secretsmanager::types::error::{DecryptionFailure, ResourceNotFoundException};
    use aws_sdk_secretsmanager::types::SecretListEntry;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use pretty_assertions::assert_eq;

    use super::*;

    fn entry(name: &str, description: Option<&str>) -> SecretListEntry {
        SecretListEntry::builder()
            .name(name)
            .set_description(description.map(Into::into))
            .build()
    }

    #[tokio::test]
    async fn test_get_returns_secret_string() {
        let rule = mock!(Client::get_secret_value)
            .match_requests(|req| req.secret_id() == Some("db/password"))
            .then_output(|| GetSecretValueOutput::builder().secret_string("hunter2").build());
        let store = SecretsManagerStore::new(mock_client!(aws_sdk_secretsmanager, [&rule]));

        assert_eq!(store.get("db/password").await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn test_get_missing_secret_is_not_found() {
        let rule = mock!(Client::get_secret_value).then_error(|| {
            GetSecretValueError::ResourceNotFoundException(
                ResourceNotFoundException::builder()
                    .message("Secrets Manager can't find the specified secret.")
                    .build(),
            )
        });
        let store = SecretsManagerStore::new(mock_client!(aws_sdk_secretsmanager, [&rule]));

        let err = store.get("nope").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(ref what) if what == "secret nope"));
    }

    #[tokio::test]
    async fn test_get_binary_only_secret_is_not_found() {
        let rule = mock!(Client::get_secret_value)
            .then_output(|| GetSecretValueOutput::builder().name("cert").build());
        let store = SecretsManagerStore::new(mock_client!(aws_sdk_secretsmanager, [&rule]));

        let err = store.get("cert").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(ref what) if what.contains("no string value")));
    }

    #[tokio::test]
    async fn test_get_other_errors_are_service_errors() {
        let rule = mock!(Client::get_secret_value).then_error(|| {
            GetSecretValueError::DecryptionFailure(DecryptionFailure::builder().build())
        });
        let store = SecretsManagerStore::new(mock_client!(aws_sdk_secretsmanager, [&rule]));

        let err = store.get("db/password").await.unwrap_err();

        assert!(matches!(err, AppError::TransientService { operation: "GetSecretValue", .. }));
    }

    #[tokio::test]
    async fn test_find_filters_by_name_across_pages() {
        let first = mock!(Client::list_secrets)
            .match_requests(|req| {
                req.filters().first().is_some_and(|f| {
                    f.key() == Some(&FilterNameStringType::Name) && f.values() == ["db".to_string()]
                }) && req.next_token().is_none()
            })
            .then_output(|| {
                ListSecretsOutput::builder()
                    .secret_list(entry("db/password", Some("primary")))
                    .next_token("page-2")
                    .build()
            });
        let second = mock!(Client::list_secrets)
            .match_requests(|req| req.next_token() == Some("page-2"))
            .then_output(|| {
                ListSecretsOutput::builder()
                    .secret_list(entry("db/replica", None))
                    .build()
            });
        let store = SecretsManagerStore::new(mock_client!(
            aws_sdk_secretsmanager,
            RuleMode::Sequential,
            [&first, &second]
        ));

        let found = store.find("db").await.unwrap();

        assert_eq!(
            found,
            vec![
                SecretSummary {
                    name: "db/password".into(),
                    description: "primary".into(),
                },
                SecretSummary {
                    name: "db/replica".into(),
                    description: String::new(),
                },
            ]
        );
        assert_eq!(second.num_calls(), 1);
    }
}
