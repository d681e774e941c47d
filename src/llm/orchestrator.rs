//! Drives one request/response exchange with the model.
//!
//! The orchestrator owns no conversation state: it validates the input, shapes
//! the request, races the call against the timeout and the caller's cancellation
//! token, and reduces every failure to an [`ExchangeError`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::conversation::config::ChatConfig;
use crate::conversation::errors::StoreError;
use crate::llm::client::{GenerateRequest, ModelClient, ModelVariant};
use crate::llm::error::{ExchangeError, MISSING_CREDENTIAL_MESSAGE};
use crate::llm::payload::ImageAttachment;
use crate::llm::persona::PersonaTemplate;

/// Single-flight exchange driver. Callers gate concurrency upstream.
#[derive(Clone)]
pub struct ResponseOrchestrator {
    client: Arc<dyn ModelClient>,
    persona: PersonaTemplate,
    timeout: Duration,
    max_prompt_chars: usize,
}

impl ResponseOrchestrator {
    /// Build from a model client and configuration.
    #[must_use]
    pub fn new(client: Arc<dyn ModelClient>, config: &ChatConfig) -> Self {
        Self {
            client,
            persona: PersonaTemplate::new(config.model.persona_template.clone()),
            timeout: config.api.request_timeout,
            max_prompt_chars: config.limits.max_prompt_chars,
        }
    }

    /// Per-exchange timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `prompt` (and `image`, if any) and return the raw reply text.
    ///
    /// Text-only prompts are wrapped in the persona template and routed to the
    /// text model; prompts with an image go verbatim to the vision model.
    ///
    /// # Errors
    /// - [`ExchangeError::Configuration`] if no credential is configured; nothing is sent.
    /// - [`ExchangeError::Validation`] if the prompt is blank or too long.
    /// - [`ExchangeError::Upstream`] with the provider message on network/API failure.
    /// - [`ExchangeError::Timeout`] / [`ExchangeError::Cancelled`] when the call is cut short.
    /// - [`ExchangeError::Unknown`] if the call fails without a usable message.
    pub async fn exchange(
        &self,
        prompt: &str,
        image: Option<&ImageAttachment>,
        cancel: &CancellationToken,
    ) -> Result<String, ExchangeError> {
        let variant = if image.is_some() {
            ModelVariant::Vision
        } else {
            ModelVariant::Text
        };
        let span = info_span!("exchange", variant = variant.as_str());

        async move {
            if !self.client.has_credential() {
                warn!("no API credential configured");
                return Err(ExchangeError::Configuration(
                    MISSING_CREDENTIAL_MESSAGE.to_string(),
                ));
            }

            let request = self.build_request(prompt, image)?;
            let result = self.dispatch(request, cancel).await;
            match &result {
                Ok(reply) => debug!(reply_chars = reply.chars().count(), "exchange succeeded"),
                Err(err) => warn!(kind = err.kind(), "exchange failed: {err}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn build_request(
        &self,
        prompt: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<GenerateRequest, ExchangeError> {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return Err(ExchangeError::Validation(StoreError::EmptyPrompt.to_string()));
        }
        let chars = trimmed.chars().count();
        if chars > self.max_prompt_chars {
            return Err(ExchangeError::Validation(format!(
                "Message is too long ({chars} characters, limit {})",
                self.max_prompt_chars
            )));
        }

        Ok(match image {
            Some(image) => GenerateRequest::vision(prompt, image.to_inline_payload()),
            None => GenerateRequest::text(self.persona.wrap(prompt)),
        })
    }

    async fn dispatch(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ExchangeError> {
        let client = Arc::clone(&self.client);
        let mut task = tokio::spawn(async move { client.generate(request).await });

        tokio::select! {
            () = cancel.cancelled() => {
                task.abort();
                Err(ExchangeError::Cancelled)
            }
            () = tokio::time::sleep(self.timeout) => {
                task.abort();
                Err(ExchangeError::Timeout(self.timeout))
            }
            joined = &mut task => match joined {
                Ok(result) => result.map_err(ExchangeError::from),
                Err(join_err) => {
                    warn!("model call aborted: {join_err}");
                    Err(ExchangeError::unknown())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::ModelFuture;
    use crate::llm::error::ModelError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Reply(&'static str),
        Fail(u16, &'static str),
        Hang,
        Panic,
    }

    struct FakeClient {
        credential: bool,
        behaviour: Behaviour,
        calls: AtomicUsize,
        last_request: Mutex<Option<GenerateRequest>>,
    }

    impl FakeClient {
        fn new(credential: bool, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                credential,
                behaviour,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> GenerateRequest {
            self.last_request.lock().unwrap().clone().unwrap()
        }
    }

    impl ModelClient for FakeClient {
        fn generate(
            &self,
            request: GenerateRequest,
        ) -> ModelFuture<'_, Result<String, ModelError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            Box::pin(async move {
                match self.behaviour {
                    Behaviour::Reply(text) => Ok(text.to_string()),
                    Behaviour::Fail(status, message) => Err(ModelError::Api {
                        status,
                        message: message.to_string(),
                    }),
                    Behaviour::Hang => {
                        std::future::pending::<()>().await;
                        Ok(String::new())
                    }
                    Behaviour::Panic => panic!("client bug"),
                }
            })
        }

        fn has_credential(&self) -> bool {
            self.credential
        }
    }

    fn orchestrator(client: Arc<FakeClient>) -> ResponseOrchestrator {
        let config = ChatConfig::default().with_request_timeout(Duration::from_millis(200));
        ResponseOrchestrator::new(client, &config)
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_call() {
        let client = FakeClient::new(false, Behaviour::Reply("never"));
        let err = orchestrator(Arc::clone(&client))
            .exchange("hello", None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Configuration(ref m) if m.contains("Missing")));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected_before_call() {
        let client = FakeClient::new(true, Behaviour::Reply("never"));
        let err = orchestrator(Arc::clone(&client))
            .exchange("  \t ", None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, ExchangeError::Validation("Message cannot be empty".to_string()));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlong_prompt_is_rejected() {
        let client = FakeClient::new(true, Behaviour::Reply("never"));
        let config = {
            let mut config = ChatConfig::default();
            config.limits.max_prompt_chars = 5;
            config
        };
        let orchestrator = ResponseOrchestrator::new(client.clone(), &config);
        let err = orchestrator
            .exchange("héllo!", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(client.calls(), 0);

        assert!(
            orchestrator
                .exchange("héllo", None, &CancellationToken::new())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_text_prompt_is_wrapped_in_persona() {
        let client = FakeClient::new(true, Behaviour::Reply("literally hi"));
        let reply = orchestrator(Arc::clone(&client))
            .exchange("what is rust?", None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, "literally hi");
        let request = client.last_request();
        assert_eq!(request.variant, ModelVariant::Text);
        assert!(request.image.is_none());
        assert!(request.prompt.starts_with("Hey bestie!"));
        assert!(request.prompt.ends_with("Here's what they asked: what is rust?"));
    }

    #[tokio::test]
    async fn test_prompt_is_sent_untrimmed() {
        let client = FakeClient::new(true, Behaviour::Reply("nice loop"));
        let image = ImageAttachment::new("image/png", b"hello".to_vec(), 1024).unwrap();
        let prompt = "    for x in xs {\n        dbg!(x);\n    }\n";
        orchestrator(Arc::clone(&client))
            .exchange(prompt, Some(&image), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.last_request().prompt, prompt);
    }

    #[tokio::test]
    async fn test_image_prompt_goes_to_vision_unwrapped() {
        let client = FakeClient::new(true, Behaviour::Reply("a cat"));
        let image = ImageAttachment::new("image/png", b"hello".to_vec(), 1024).unwrap();
        orchestrator(Arc::clone(&client))
            .exchange("what is this?", Some(&image), &CancellationToken::new())
            .await
            .unwrap();

        let request = client.last_request();
        assert_eq!(request.variant, ModelVariant::Vision);
        assert_eq!(request.prompt, "what is this?");
        let payload = request.image.unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.data, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_upstream_message_is_preserved() {
        let client = FakeClient::new(true, Behaviour::Fail(429, "RESOURCE_EXHAUSTED: quota"));
        let err = orchestrator(client)
            .exchange("hello", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Upstream("RESOURCE_EXHAUSTED: quota".to_string())
        );
    }

    #[tokio::test]
    async fn test_hung_call_times_out() {
        let client = FakeClient::new(true, Behaviour::Hang);
        let err = orchestrator(client)
            .exchange("hello", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_cancellation_ends_exchange() {
        let client = FakeClient::new(true, Behaviour::Hang);
        let config = ChatConfig::default().with_request_timeout(Duration::from_secs(30));
        let orchestrator = ResponseOrchestrator::new(client, &config);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = orchestrator.exchange("hello", None, &token).await.unwrap_err();
        assert_eq!(err, ExchangeError::Cancelled);
    }

    #[tokio::test]
    async fn test_panicking_client_is_unknown_error() {
        let client = FakeClient::new(true, Behaviour::Panic);
        let err = orchestrator(client)
            .exchange("hello", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::unknown());
    }
}
