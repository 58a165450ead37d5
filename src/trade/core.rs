use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    event::MergedEvent,
    order::{OrderError, OrderLifecycleManager, OrderState},
    risk::{RiskDecision, RiskFilter, SuppressReason},
    strategy::{SignalIntent, StrategyStateMachine},
};

/// What one merged event produced downstream of the strategy.
pub(crate) enum PipelineOutcome {
    Submitted {
        client_order_id: Uuid,
        state: OrderState,
    },
    Suppressed {
        intent: SignalIntent,
        reason: SuppressReason,
    },
}

/// The mode-agnostic event path: strategy, risk filter, order manager.
///
/// Both the backtest replay loop and the live loop drive this exact struct,
/// which is what makes backtested results trustworthy.
pub(crate) struct TradePipeline {
    strategy: StrategyStateMachine,
    risk: RiskFilter,
    manager: Arc<OrderLifecycleManager>,
}

impl TradePipeline {
    pub fn new(
        strategy: StrategyStateMachine,
        risk: RiskFilter,
        manager: Arc<OrderLifecycleManager>,
    ) -> Self {
        Self {
            strategy,
            risk,
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<OrderLifecycleManager> {
        &self.manager
    }

    /// Runs one merged event through strategy, risk, and order submission.
    ///
    /// A halted symbol absorbs the event with a log line instead of stopping
    /// the stream; every other order failure propagates.
    pub async fn handle_event(
        &mut self,
        event: &MergedEvent,
    ) -> Result<Option<PipelineOutcome>, OrderError> {
        let Some(intent) = self.strategy.on_event(event) else {
            return Ok(None);
        };

        let positions = self.manager.positions().await;

        match self.risk.evaluate(&intent, &positions) {
            RiskDecision::Approved(request) => {
                let client_order_id = request.client_order_id;

                match self.manager.submit(request, intent.time).await {
                    Ok(state) => {
                        // An order that failed terminally opened no position,
                        // so the same intent may be retried later.
                        if matches!(state, OrderState::Rejected | OrderState::Error) {
                            self.risk.order_failed(&intent.symbol);
                        }

                        Ok(Some(PipelineOutcome::Submitted {
                            client_order_id,
                            state,
                        }))
                    }
                    Err(
                        e @ (OrderError::SubmissionHalted { .. }
                        | OrderError::ReconcileExhausted { .. }),
                    ) => {
                        warn!(error = %e, "order dropped, symbol halted pending reconciliation");
                        self.risk.order_failed(&intent.symbol);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            RiskDecision::Suppressed { reason } => {
                info!(intent = %intent, %reason, "intent suppressed");
                Ok(Some(PipelineOutcome::Suppressed { intent, reason }))
            }
        }
    }
}
