//! Tool invocation with isolation and cancellation.
//!
//! Capabilities run on a dedicated task so a slow or blocking capability
//! never stalls the request loop, and a panicking capability is contained
//! to its own task. The invoker's public contract never raises: unknown
//! names, panics, and cancellations all come back as envelopes.

use lingxi_core::envelope::ToolEnvelope;
use lingxi_core::tool::{CapabilityRegistry, ParamMap, ToolKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Cooperative cancellation signal: flips to `true` when the owning
/// request is cancelled.
pub type CancelSignal = watch::Receiver<bool>;

pub struct ToolInvoker {
    registry: Arc<CapabilityRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Invoke a capability by raw name.
    pub async fn invoke(&self, tool_name: &str, params: ParamMap) -> ToolEnvelope {
        self.invoke_with_cancel(tool_name, params, None).await
    }

    /// Invoke a capability by raw name, optionally cancellable.
    pub async fn invoke_with_cancel(
        &self,
        tool_name: &str,
        params: ParamMap,
        cancel: Option<CancelSignal>,
    ) -> ToolEnvelope {
        let started = Instant::now();
        let Some(kind) = ToolKind::parse(tool_name) else {
            return ToolEnvelope::failure(
                tool_name,
                format!("capability not found: {tool_name}"),
                started,
            );
        };
        self.invoke_kind(kind, params, cancel).await
    }

    /// Invoke a capability by kind, optionally cancellable.
    pub async fn invoke_kind(
        &self,
        kind: ToolKind,
        params: ParamMap,
        cancel: Option<CancelSignal>,
    ) -> ToolEnvelope {
        let started = Instant::now();
        let Some(capability) = self.registry.get(kind) else {
            return ToolEnvelope::failure(
                kind.as_str(),
                format!("capability not registered: {kind}"),
                started,
            );
        };

        debug!(tool = %kind, "Invoking capability");
        let mut handle = tokio::spawn(async move { capability.invoke(params).await });

        match cancel {
            Some(mut signal) => {
                tokio::select! {
                    result = &mut handle => finish(kind, result, started),
                    _ = wait_cancelled(&mut signal) => {
                        warn!(tool = %kind, "Invocation cancelled by owning request");
                        handle.abort();
                        ToolEnvelope::cancelled(kind.as_str(), started)
                    }
                }
            }
            None => finish(kind, handle.await, started),
        }
    }
}

fn finish(
    kind: ToolKind,
    result: Result<ToolEnvelope, tokio::task::JoinError>,
    started: Instant,
) -> ToolEnvelope {
    match result {
        Ok(envelope) => envelope,
        Err(e) if e.is_panic() => {
            warn!(tool = %kind, "Capability panicked");
            ToolEnvelope::failure(kind.as_str(), format!("capability panicked: {e}"), started)
        }
        Err(_) => ToolEnvelope::cancelled(kind.as_str(), started),
    }
}

/// Resolve when the cancel flag flips to true. If the sender is dropped
/// without signalling, cancellation can never arrive — wait forever and
/// let the capability branch win the select.
async fn wait_cancelled(signal: &mut CancelSignal) {
    loop {
        if *signal.borrow() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lingxi_core::tool::Capability;
    use serde_json::json;
    use std::time::Duration;

    struct InstantCapability;

    #[async_trait]
    impl Capability for InstantCapability {
        fn kind(&self) -> ToolKind {
            ToolKind::Calculate
        }
        fn description(&self) -> &str {
            "instant"
        }
        fn required_params(&self) -> &'static [&'static str] {
            &[]
        }
        fn optional_params(&self) -> &'static [&'static str] {
            &[]
        }
        async fn invoke(&self, _params: ParamMap) -> ToolEnvelope {
            ToolEnvelope::ok(ToolKind::Calculate, json!({"result": 1}), Instant::now())
        }
    }

    struct SlowCapability;

    #[async_trait]
    impl Capability for SlowCapability {
        fn kind(&self) -> ToolKind {
            ToolKind::Weather
        }
        fn description(&self) -> &str {
            "slow"
        }
        fn required_params(&self) -> &'static [&'static str] {
            &[]
        }
        fn optional_params(&self) -> &'static [&'static str] {
            &[]
        }
        async fn invoke(&self, _params: ParamMap) -> ToolEnvelope {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    struct PanickingCapability;

    #[async_trait]
    impl Capability for PanickingCapability {
        fn kind(&self) -> ToolKind {
            ToolKind::News
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn required_params(&self) -> &'static [&'static str] {
            &[]
        }
        fn optional_params(&self) -> &'static [&'static str] {
            &[]
        }
        async fn invoke(&self, _params: ParamMap) -> ToolEnvelope {
            panic!("deliberate test panic");
        }
    }

    fn invoker() -> ToolInvoker {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(InstantCapability));
        registry.register(Arc::new(SlowCapability));
        registry.register(Arc::new(PanickingCapability));
        ToolInvoker::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let envelope = invoker().invoke("translate", ParamMap::new()).await;
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.error.unwrap().contains("capability not found"));
    }

    #[tokio::test]
    async fn unregistered_kind_fails() {
        let invoker = ToolInvoker::new(Arc::new(CapabilityRegistry::new()));
        let envelope = invoker
            .invoke_kind(ToolKind::Weather, ParamMap::new(), None)
            .await;
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn successful_invocation_passes_envelope_through() {
        let envelope = invoker().invoke("calculate", ParamMap::new()).await;
        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap()["result"], 1);
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let envelope = invoker().invoke("news", ParamMap::new()).await;
        assert!(!envelope.success);
        assert!(envelope.error.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn cancellation_yields_distinct_envelope() {
        let invoker = invoker();
        let (tx, rx) = watch::channel(false);

        let invocation = invoker.invoke_with_cancel("weather", ParamMap::new(), Some(rx));
        tokio::pin!(invocation);

        // Give the capability a moment to start, then cancel.
        tokio::select! {
            _ = &mut invocation => panic!("slow capability finished unexpectedly"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        tx.send(true).expect("receiver alive");

        let envelope = invocation.await;
        assert!(!envelope.success);
        assert!(envelope.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_cancel_sender_does_not_cancel() {
        let invoker = invoker();
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let envelope = invoker
            .invoke_with_cancel("calculate", ParamMap::new(), Some(rx))
            .await;
        assert!(envelope.success);
    }
}
