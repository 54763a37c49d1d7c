//! Fallback chain: tries backends in order within one shared time budget.
//!
//! Each attempt may use an even share of whatever budget is left, so a hung
//! primary cannot starve the entries behind it and a fast failure leaves more
//! time for the rest. The whole chain finishes within the budget, which lets
//! callers put the same ceiling around it.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

pub struct FallbackProvider {
    name: String,
    budget: Duration,
    chain: Vec<Attempt>,
}

struct Attempt {
    provider: Arc<dyn Provider>,
    /// Sent as `GenerationRequest::model` when set.
    model: Option<String>,
}

impl Attempt {
    fn label(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.provider.name())
    }
}

impl FallbackProvider {
    /// An empty chain whose attempts together never run longer than `budget`.
    pub fn new(name: impl Into<String>, budget: Duration) -> Self {
        Self {
            name: name.into(),
            budget,
            chain: Vec::new(),
        }
    }

    /// Append a backend asked with the request's own model.
    pub fn then(mut self, provider: Arc<dyn Provider>) -> Self {
        self.chain.push(Attempt { provider, model: None });
        self
    }

    /// Append a backend asked for `model` instead.
    pub fn then_model(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.chain.push(Attempt {
            provider,
            model: Some(model.into()),
        });
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Even share of `remaining` for the next of `left` attempts.
fn slice(remaining: Duration, left: usize) -> Duration {
    remaining / left.max(1) as u32
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        if self.chain.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "fallback chain '{}' has no backends",
                self.name
            )));
        }

        let deadline = Instant::now() + self.budget;
        let mut last_error = None;

        for (i, attempt) in self.chain.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let allowance = slice(remaining, self.chain.len() - i);
            debug!(
                backend = attempt.label(),
                attempt = i + 1,
                allowance_ms = allowance.as_millis() as u64,
                "Trying backend"
            );

            let mut req = request.clone();
            if attempt.model.is_some() {
                req.model = attempt.model.clone();
            }

            let error = match tokio::time::timeout(allowance, attempt.provider.generate(req)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "'{}' gave no reply within {}ms",
                    attempt.label(),
                    allowance.as_millis()
                )),
            };
            warn!(backend = attempt.label(), error = %error, "Backend failed, moving down the chain");
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::Timeout(format!("budget of {}ms exhausted", self.budget.as_millis()))
        }))
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        for attempt in &self.chain {
            if let Ok(true) = attempt.provider.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replies `text` (or fails) after `delay`, recording requested models.
    struct Backend {
        reply: Option<&'static str>,
        delay: Duration,
        models: Mutex<Vec<Option<String>>>,
    }

    impl Backend {
        fn ok(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                delay: Duration::ZERO,
                models: Mutex::new(Vec::new()),
            }
        }

        fn down() -> Self {
            Self { reply: None, ..Self::ok("") }
        }

        fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.models.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for Backend {
        fn name(&self) -> &str {
            "backend"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, ProviderError> {
            self.models.lock().unwrap().push(request.model.clone());
            tokio::time::sleep(self.delay).await;
            match self.reply {
                Some(text) => Ok(GenerationResponse {
                    text: text.into(),
                    model: request.model.unwrap_or_else(|| "default".into()),
                    usage: None,
                }),
                None => Err(ProviderError::Network("connection refused".into())),
            }
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("User: hello\nAssistant:", SamplingParams::default())
    }

    const BUDGET: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn first_healthy_backend_answers() {
        let primary = Arc::new(Backend::ok("primary"));
        let backup = Arc::new(Backend::ok("backup"));
        let chain = FallbackProvider::new("test", BUDGET)
            .then(primary.clone())
            .then(backup.clone());

        assert_eq!(chain.generate(request()).await.unwrap().text, "primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test]
    async fn error_moves_to_next_model() {
        let primary = Arc::new(Backend::down());
        let backup = Arc::new(Backend::ok("backup"));
        let chain = FallbackProvider::new("test", BUDGET)
            .then(primary.clone())
            .then_model(backup.clone(), "phi3");

        let response = chain.generate(request()).await.unwrap();
        assert_eq!(response.model, "phi3");
        assert_eq!(backup.models.lock().unwrap()[0].as_deref(), Some("phi3"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_primary_leaves_time_for_slow_backup() {
        let backup = Arc::new(Backend::ok("backup").after(Duration::from_secs(10)));
        let chain = FallbackProvider::new("test", BUDGET)
            .then(Arc::new(Backend::ok("late").after(Duration::from_secs(3600))))
            .then(backup.clone());

        let started = Instant::now();
        let response = chain.generate(request()).await.unwrap();
        assert_eq!(response.text, "backup");
        assert!(started.elapsed() <= BUDGET);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_failure_hands_its_share_on() {
        // 30s over three attempts: the instant failure leaves 15s each.
        let backup = Arc::new(Backend::ok("backup").after(Duration::from_secs(12)));
        let chain = FallbackProvider::new("test", BUDGET)
            .then(Arc::new(Backend::down()))
            .then(backup.clone())
            .then(Arc::new(Backend::ok("third")));

        assert_eq!(chain.generate(request()).await.unwrap().text, "backup");
    }

    #[tokio::test(start_paused = true)]
    async fn whole_chain_stays_within_budget() {
        let chain = FallbackProvider::new("test", BUDGET)
            .then(Arc::new(Backend::ok("late").after(Duration::from_secs(3600))))
            .then(Arc::new(Backend::ok("late").after(Duration::from_secs(3600))));

        let started = Instant::now();
        let err = chain.generate(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(started.elapsed() <= BUDGET);
    }

    #[tokio::test]
    async fn all_failing_returns_last_error() {
        let chain = FallbackProvider::new("test", BUDGET)
            .then(Arc::new(Backend::down()))
            .then(Arc::new(Backend::down()));
        assert!(matches!(
            chain.generate(request()).await.unwrap_err(),
            ProviderError::Network(_)
        ));
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let err = FallbackProvider::new("empty", BUDGET)
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn slices_split_what_is_left() {
        assert_eq!(slice(BUDGET, 2), Duration::from_secs(15));
        assert_eq!(slice(BUDGET, 0), BUDGET);
    }
}
