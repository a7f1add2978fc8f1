use async_trait::async_trait;

/// Status shown on the physical ticker display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Syncing,
    Error,
    Idle,
}

/// Optional display sink. When no hardware is attached the no-op sink is
/// wired in and status lighting is simply absent.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn set_indicator(&self, state: IndicatorState);
    async fn update_ticker(&self);
}

pub struct NoopDisplay;

#[async_trait]
impl DisplaySink for NoopDisplay {
    async fn set_indicator(&self, _state: IndicatorState) {}
    async fn update_ticker(&self) {}
}
