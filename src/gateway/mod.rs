//! Provider gateway for OpenRouter multimodal chat completions.

pub mod error;
pub mod openrouter;
pub mod pricing;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use openrouter::{ChatProvider, OpenRouterAdapter};
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::ProviderError;
pub use pricing::*;
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Wait the provider's `Retry-After` on 429 instead of the backoff.
    pub honor_retry_after: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            honor_retry_after: true,
        }
    }
}

pub struct ProviderGateway<U: UsageSinkTrait> {
    openrouter: OpenRouterAdapter,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let openrouter = OpenRouterAdapter::from_env()?;
        Ok(Self {
            openrouter,
            usage_sink,
            config: GatewayConfig::default(),
        })
    }

    pub fn with_config(
        openrouter: OpenRouterAdapter,
        usage_sink: Arc<U>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            openrouter,
            usage_sink,
            config,
        }
    }

    /// Send `req`, retrying retryable failures up to `max_retries` times.
    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            let err = match self.openrouter.chat(&req).await {
                Ok(resp) => {
                    self.record_usage(&req, Some(&resp), None).await;
                    return Ok(resp);
                }
                Err(err) => err,
            };
            self.record_usage(&req, None, Some(err.code())).await;

            if !err.is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            let delay = match &err {
                ProviderError::RateLimited { retry_after, .. } if self.config.honor_retry_after => {
                    *retry_after
                }
                _ => backoff_delay(self.config.retry_base_delay, attempt),
            };
            warn!(
                attempt,
                code = err.code(),
                request_id = err.request_id().unwrap_or("-"),
                delay_ms = delay.as_millis() as u64,
                "retrying provider call"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: Option<&ChatResponse>,
        error_code: Option<&str>,
    ) {
        let images: usize = req.messages.iter().map(Message::image_count).sum();
        let mut record = ProviderCallRecord::new(
            req.model.provider(),
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .session(req.attribution.session_id)
        .images(images as u32);

        if let Some(resp) = resp {
            record = record
                .tokens(resp.input_tokens as i32, resp.output_tokens as i32)
                .cost(resp.cost_nanodollars)
                .upstream_cost(resp.upstream_cost_nanodollars)
                .latency(resp.latency.as_millis() as i32);
        }

        let record = match error_code {
            Some(code) => record.error(code),
            None => record,
        };
        self.usage_sink.record(record).await;
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}
