//! Elasticsearch sink.
//!
//! Each document is PUT to `{url}/{name}-{YYYY.MM.DD}/_doc/{id}`. A PUT with
//! an explicit id replaces any existing document, so redelivery is harmless.
//! Requests run on tokio's blocking pool.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use snafu::prelude::*;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

use crate::config::SinkConfig;
use crate::error::{DeliveryTaskSnafu, RejectedSnafu, RequestSnafu, SerializeSnafu, SinkError};
use crate::normalize::NormalizedDocument;

use super::Sink;

/// Delivers documents to an Elasticsearch cluster over HTTP.
pub struct ElasticsearchSink {
    agent: Agent,
    base_url: String,
    index_prefix: String,
    authorization: Option<String>,
}

impl ElasticsearchSink {
    pub fn new(config: &SinkConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        let authorization = config.username.as_ref().map(|user| {
            let password = config.password.as_deref().unwrap_or_default();
            format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
        });

        Self {
            agent,
            base_url: config.url.trim_end_matches('/').to_string(),
            index_prefix: config.name.clone(),
            authorization,
        }
    }

    /// Daily index for a document, e.g. `journalbeat-2016.07.29`.
    pub fn index_for(&self, document: &NormalizedDocument) -> String {
        format!(
            "{}-{}",
            self.index_prefix,
            document.timestamp.format("%Y.%m.%d")
        )
    }

    /// Target URL for a document.
    pub fn document_url(&self, document: &NormalizedDocument) -> String {
        format!(
            "{}/{}/_doc/{}",
            self.base_url,
            self.index_for(document),
            document.id
        )
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    async fn send(&self, document: &NormalizedDocument) -> Result<(), SinkError> {
        let id = document.id.clone();
        let body = serde_json::to_string(document).context(SerializeSnafu { id: &id })?;
        let url = self.document_url(document);
        let agent = self.agent.clone();
        let authorization = self.authorization.clone();

        debug!(%url, "Sending document");
        tokio::task::spawn_blocking(move || {
            match put_document(&agent, &url, authorization.as_deref(), &body) {
                Ok(()) => Ok(()),
                Err(ureq::Error::StatusCode(status)) => RejectedSnafu {
                    id,
                    reason: format!("HTTP status {status}"),
                }
                .fail(),
                Err(e) => Err(e).context(RequestSnafu { id, url }),
            }
        })
        .await
        .context(DeliveryTaskSnafu)?
    }

    fn name(&self) -> &str {
        &self.base_url
    }
}

fn put_document(
    agent: &Agent,
    url: &str,
    authorization: Option<&str>,
    body: &str,
) -> Result<(), ureq::Error> {
    let mut request = agent.put(url).header("Content-Type", "application/json");
    if let Some(authorization) = authorization {
        request = request.header("Authorization", authorization);
    }

    let mut response = request.send(body)?;
    // Drain so the connection can be reused.
    response.body_mut().read_to_string()?;
    Ok(())
}
