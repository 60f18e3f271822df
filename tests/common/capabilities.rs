use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use botmark::message::Message;
use botmark::traversal::{
    Capability, CapabilityError, CapabilityOutput, NextOption, RouteReply, Router, RouterError,
};

/// Replies with its input unchanged.
#[derive(Debug, Clone, Copy)]
pub struct EchoCapability;

#[async_trait]
impl Capability for EchoCapability {
    async fn invoke(
        &self,
        input: &str,
        _history: &[Message],
    ) -> Result<CapabilityOutput, CapabilityError> {
        Ok(CapabilityOutput::exchange(input, input.to_string()))
    }
}

/// Appends a fixed suffix to its input, so walks leave a readable trace.
#[derive(Debug, Clone)]
pub struct SuffixCapability {
    pub suffix: String,
}

impl SuffixCapability {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

#[async_trait]
impl Capability for SuffixCapability {
    async fn invoke(
        &self,
        input: &str,
        _history: &[Message],
    ) -> Result<CapabilityOutput, CapabilityError> {
        Ok(CapabilityOutput::exchange(
            input,
            format!("{input}{}", self.suffix),
        ))
    }
}

/// Counts invocations; useful for asserting that nothing ran.
#[derive(Debug, Clone, Default)]
pub struct CountingCapability {
    pub calls: Arc<AtomicUsize>,
}

impl CountingCapability {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for CountingCapability {
    async fn invoke(
        &self,
        input: &str,
        _history: &[Message],
    ) -> Result<CapabilityOutput, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CapabilityOutput::exchange(input, input.to_string()))
    }
}

/// Always fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingCapability;

#[async_trait]
impl Capability for FailingCapability {
    async fn invoke(
        &self,
        _input: &str,
        _history: &[Message],
    ) -> Result<CapabilityOutput, CapabilityError> {
        Err(CapabilityError::new("deliberate failure"))
    }
}

/// Replays a fixed sequence of choices, then repeats the last one.
#[derive(Debug)]
pub struct ScriptedRouter {
    pub choices: Vec<&'static str>,
    next: AtomicUsize,
}

impl ScriptedRouter {
    pub fn new(choices: Vec<&'static str>) -> Self {
        Self {
            choices,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Router for ScriptedRouter {
    async fn choose(
        &self,
        _transcript: &[String],
        _history: &[Message],
        _last_output: &str,
        _options: &[NextOption],
    ) -> Result<RouteReply, RouterError> {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        let choice = self
            .choices
            .get(i)
            .or_else(|| self.choices.last())
            .ok_or_else(|| RouterError::new("empty script"))?;
        Ok(RouteReply::new(*choice))
    }
}
