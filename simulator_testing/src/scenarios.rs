//! Canned scenarios exercising the dispatcher's outcomes.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use scenario_simulator::{
    Message,
    Scenario,
    ScenarioContext,
    ScenarioError,
    scenario::ScenarioResult,
};

/// Replies to the first message with its own payload, optionally prefixed.
#[derive(Clone, Debug, Default)]
pub struct EchoScenario {
    prefix: String,
}

impl EchoScenario {
    /// Echo with `prefix` prepended to the payload.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Scenario for EchoScenario {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult {
        let request = ctx.expect_message().await?;
        ctx.send(Message::new(format!("{}{}", self.prefix, request.payload())))?;
        Ok(())
    }
}

/// Consumes the first message, then stays alive without replying.
#[derive(Clone, Copy, Debug)]
pub struct SilentScenario {
    /// How long the script keeps running after receiving.
    pub linger: Duration,
}

impl Default for SilentScenario {
    fn default() -> Self {
        Self {
            linger: Duration::from_secs(60),
        }
    }
}

#[async_trait]
impl Scenario for SilentScenario {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult {
        ctx.receive().await;
        tokio::time::sleep(self.linger).await;
        Ok(())
    }
}

/// Fails with an assertion error after receiving its message.
#[derive(Clone, Debug)]
pub struct FailingScenario {
    reason: String,
}

impl FailingScenario {
    /// Fail with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Scenario for FailingScenario {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult {
        ctx.receive().await;
        Err(ScenarioError::assertion(self.reason.clone()))
    }
}

/// Panics while a request is pending.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanickingScenario;

#[async_trait]
impl Scenario for PanickingScenario {
    async fn run(&self, _ctx: &mut ScenarioContext) -> ScenarioResult {
        panic!("scenario blew up")
    }
}

/// Echo scenario counting how many times it ran.
#[derive(Clone, Debug, Default)]
pub struct CountingScenario {
    runs: Arc<AtomicUsize>,
}

impl CountingScenario {
    /// Create a counter starting at zero.
    pub fn new() -> Self { Self::default() }

    /// Shared handle to the run counter.
    pub fn runs(&self) -> Arc<AtomicUsize> { Arc::clone(&self.runs) }
}

#[async_trait]
impl Scenario for CountingScenario {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(request) = ctx.receive().await {
            ctx.send(Message::new(request.payload()))?;
        }
        Ok(())
    }
}
