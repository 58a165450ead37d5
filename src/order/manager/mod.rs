use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::{
    sync::{Mutex, MutexGuard, broadcast},
    time,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::{
        models::{OrderEventKind, OrderEventRow, OrderRow},
        repositories::OrderLedgerRepository,
    },
    shared::Symbol,
    util::backoff_delay,
};

mod config;

pub use config::OrderManagerConfig;

use super::{
    Broker, BrokerError, BrokerOrderStatus, FillNotice, OrderRequest, OrderState, Position,
    PositionBook,
    error::{OrderError, Result},
};

/// One order state transition or fill, published on the update feed.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub client_order_id: Uuid,
    pub symbol: Symbol,
    pub state: OrderState,
    pub filled_quantity: u64,
    pub position: Position,
}

#[derive(Debug, Clone)]
struct OrderEntry {
    request: OrderRequest,
    state: OrderState,
    filled_quantity: u64,
}

#[derive(Default)]
struct ManagerState {
    orders: HashMap<Uuid, OrderEntry>,
    positions: PositionBook,
    halted: HashSet<Symbol>,
}

/// Outcome of reconciling an ambiguous submission with the broker.
enum Reconciled {
    /// The broker has no record of the order; resubmission is safe.
    Resubmit,
    /// The broker's authoritative state was adopted.
    Settled(OrderState),
}

/// The central order state machine.
///
/// Owns every order's lifecycle state and the position book, and serializes
/// all mutations to both behind one lock; broker calls happen outside it.
/// A submission failure with unknown broker truth parks the order in
/// [`OrderState::Error`], and a mandatory status query decides between
/// resubmission and adopting the broker's state; blind resubmission never
/// occurs. If the broker stays unreachable for reconciliation beyond the
/// configured attempt bound, new submissions for that symbol are halted until
/// an operator resolves it.
pub struct OrderLifecycleManager {
    broker: Arc<dyn Broker>,
    ledger: Arc<dyn OrderLedgerRepository>,
    config: OrderManagerConfig,
    state: Mutex<ManagerState>,
    updates_tx: broadcast::Sender<OrderUpdate>,
}

impl OrderLifecycleManager {
    pub fn new(
        broker: Arc<dyn Broker>,
        ledger: Arc<dyn OrderLedgerRepository>,
        config: OrderManagerConfig,
    ) -> Self {
        let (updates_tx, _) = broadcast::channel(config.update_capacity());

        Self {
            broker,
            ledger,
            config,
            state: Mutex::new(ManagerState::default()),
            updates_tx,
        }
    }

    /// Subscribes to order state transitions and fills.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderUpdate> {
        self.updates_tx.subscribe()
    }

    /// Snapshot of the position book.
    pub async fn positions(&self) -> PositionBook {
        self.state.lock().await.positions.clone()
    }

    /// Current position for one symbol, flat if never traded.
    pub async fn position(&self, symbol: &Symbol) -> Position {
        self.state.lock().await.positions.get(symbol)
    }

    /// Symbols currently halted pending reconciliation.
    pub async fn halted_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.state.lock().await.halted.iter().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Operator action: lifts the submission halt for a symbol.
    pub async fn resume_symbol(&self, symbol: &Symbol) {
        if self.state.lock().await.halted.remove(symbol) {
            info!(%symbol, "submission halt lifted");
        }
    }

    async fn with_deadline<T, F>(&self, call: F) -> std::result::Result<T, BrokerError>
    where
        F: Future<Output = std::result::Result<T, BrokerError>>,
    {
        let deadline = self.config.broker_deadline();

        match time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Transient(format!(
                "broker call exceeded {} ms deadline",
                deadline.as_millis()
            ))),
        }
    }

    /// Submits a risk-approved request, driving it to `Submitted` or a
    /// terminal state.
    ///
    /// Submitting a request whose client order id was already seen is a
    /// no-op returning the existing state. Returns the state the order
    /// reached; `Error` means the broker confirmed it has no record but
    /// submission kept failing transiently, and the order stays parked for
    /// recovery.
    pub async fn submit(&self, request: OrderRequest, now: DateTime<Utc>) -> Result<OrderState> {
        let id = request.client_order_id;

        {
            let mut state = self.state.lock().await;

            if state.halted.contains(&request.symbol) {
                return Err(OrderError::SubmissionHalted {
                    symbol: request.symbol.clone(),
                });
            }

            if let Some(entry) = state.orders.get(&id) {
                warn!(client_order_id = %id, state = %entry.state,
                    "duplicate client order id refused");
                return Ok(entry.state);
            }

            let row = OrderRow::new(request.clone(), now);
            self.ledger.insert_order(&row).await?;
            self.ledger
                .append_event(&OrderEventRow::new(
                    id,
                    now,
                    OrderEventKind::Created,
                    json!({
                        "symbol": request.symbol.as_str(),
                        "side": request.side.to_string(),
                        "quantity": request.quantity.as_u64(),
                    }),
                ))
                .await?;

            state.orders.insert(
                id,
                OrderEntry {
                    request: request.clone(),
                    state: OrderState::Pending,
                    filled_quantity: 0,
                },
            );
        }

        self.drive_submission(&request, now).await
    }

    async fn drive_submission(
        &self,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderState> {
        let id = request.client_order_id;

        for attempt in 0..self.config.max_submit_attempts() {
            if attempt > 0 {
                time::sleep(backoff_delay(
                    self.config.backoff_base(),
                    attempt - 1,
                    self.config.backoff_cap(),
                ))
                .await;
            }

            match self.with_deadline(self.broker.submit(request)).await {
                Ok(ack) => {
                    info!(client_order_id = %id, broker_order_id = ?ack.broker_order_id,
                        "order accepted by broker");
                    self.transition(id, OrderState::Submitted, now, json!({ "attempt": attempt }))
                        .await?;
                    return Ok(OrderState::Submitted);
                }
                Err(BrokerError::Permanent(reason)) => {
                    warn!(client_order_id = %id, %reason, "order rejected by broker");
                    self.transition(id, OrderState::Rejected, now, json!({ "reason": reason }))
                        .await?;
                    return Ok(OrderState::Rejected);
                }
                Err(BrokerError::Transient(reason)) => {
                    warn!(client_order_id = %id, %reason, attempt,
                        "submission outcome unknown, reconciling before any retry");
                    self.transition(id, OrderState::Error, now, json!({ "reason": reason }))
                        .await?;

                    match self.reconcile(request, now).await? {
                        Reconciled::Resubmit => continue,
                        Reconciled::Settled(state) => return Ok(state),
                    }
                }
            }
        }

        // The broker kept answering status queries with no record of the
        // order while every submission attempt failed transiently. Leave the
        // order parked for recovery rather than halting the symbol.
        warn!(client_order_id = %id, "submission attempts exhausted, order left in error state");

        Ok(OrderState::Error)
    }

    /// Mandatory status query after an ambiguous submission failure.
    async fn reconcile(&self, request: &OrderRequest, now: DateTime<Utc>) -> Result<Reconciled> {
        let id = request.client_order_id;

        for attempt in 0..self.config.max_reconcile_attempts() {
            if attempt > 0 {
                time::sleep(backoff_delay(
                    self.config.backoff_base(),
                    attempt - 1,
                    self.config.backoff_cap(),
                ))
                .await;
            }

            let status = match self.with_deadline(self.broker.query_status(id)).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(client_order_id = %id, error = %e, attempt, "status query failed");
                    continue;
                }
            };

            self.ledger
                .append_event(&OrderEventRow::new(
                    id,
                    now,
                    OrderEventKind::ReconcileQuery,
                    json!({ "status": format!("{status:?}") }),
                ))
                .await?;

            return match status {
                BrokerOrderStatus::Unknown => Ok(Reconciled::Resubmit),
                BrokerOrderStatus::Accepted { filled_quantity } => {
                    info!(client_order_id = %id,
                        "broker holds the order, adopting its state instead of resubmitting");
                    self.transition(id, OrderState::Submitted, now, json!({ "adopted": true }))
                        .await?;

                    if filled_quantity > 0 {
                        self.sync_fills(id).await?;
                    }

                    Ok(Reconciled::Settled(OrderState::Submitted))
                }
                BrokerOrderStatus::Filled { .. } => {
                    self.transition(id, OrderState::Submitted, now, json!({ "adopted": true }))
                        .await?;
                    self.sync_fills(id).await?;

                    Ok(Reconciled::Settled(OrderState::Filled))
                }
                BrokerOrderStatus::Cancelled { filled_quantity } => {
                    if filled_quantity > 0 {
                        self.sync_fills(id).await?;
                    }
                    self.transition(id, OrderState::Cancelled, now, json!({ "adopted": true }))
                        .await?;

                    Ok(Reconciled::Settled(OrderState::Cancelled))
                }
                BrokerOrderStatus::Rejected => {
                    self.transition(id, OrderState::Rejected, now, json!({ "adopted": true }))
                        .await?;

                    Ok(Reconciled::Settled(OrderState::Rejected))
                }
            };
        }

        // Broker unreachable for reconciliation beyond the bound: fail-safe,
        // not fail-open.
        let symbol = request.symbol.clone();
        warn!(client_order_id = %id, %symbol,
            "reconciliation attempts exhausted, halting submissions for symbol");
        self.state.lock().await.halted.insert(symbol.clone());

        Err(OrderError::ReconcileExhausted {
            client_order_id: id,
            symbol,
        })
    }

    /// Requests cancellation of a working order. Terminal orders refuse; a
    /// cancelled order's partial fills still count toward the position.
    pub async fn cancel(&self, client_order_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        {
            let state = self.state.lock().await;
            let entry = state
                .orders
                .get(&client_order_id)
                .ok_or(OrderError::UnknownOrder { client_order_id })?;

            if entry.state.is_terminal() {
                return Err(OrderError::InvalidTransition {
                    client_order_id,
                    state: entry.state,
                    action: "cancel",
                });
            }

            if entry.state == OrderState::Pending {
                // Never reached the broker; cancel is purely local.
                drop(state);
                self.transition(client_order_id, OrderState::Cancelled, now, json!({}))
                    .await?;
                return Ok(());
            }
        }

        self.with_deadline(self.broker.cancel(client_order_id))
            .await
            .map_err(OrderError::Broker)?;

        self.transition(client_order_id, OrderState::Cancelled, now, json!({}))
            .await?;

        Ok(())
    }

    /// Applies one broker fill notification: order state and position update
    /// in a single critical section, persisted as one ledger transaction.
    pub async fn apply_fill(&self, notice: &FillNotice) -> Result<()> {
        let mut state = self.state.lock().await;
        self.apply_fill_locked(&mut state, notice, true).await
    }

    async fn apply_fill_locked(
        &self,
        state: &mut MutexGuard<'_, ManagerState>,
        notice: &FillNotice,
        persist: bool,
    ) -> Result<()> {
        let id = notice.client_order_id;

        let entry = state.orders.get_mut(&id).ok_or(OrderError::UnknownOrder {
            client_order_id: id,
        })?;

        let remaining = entry
            .request
            .quantity
            .as_u64()
            .saturating_sub(entry.filled_quantity);
        let quantity = notice.quantity.min(remaining);

        if quantity == 0 {
            warn!(client_order_id = %id, "fill notice exceeds order quantity, ignored");
            return Ok(());
        }

        entry.filled_quantity += quantity;

        // A cancelled order's late partial fills count toward the position
        // without reviving its state.
        if entry.state != OrderState::Cancelled {
            entry.state = if entry.filled_quantity >= entry.request.quantity.as_u64() {
                OrderState::Filled
            } else {
                OrderState::PartiallyFilled
            };
        }

        let new_state = entry.state;
        let filled_quantity = entry.filled_quantity;
        let symbol = entry.request.symbol.clone();
        let side = entry.request.side;

        let position = state
            .positions
            .apply_fill(&symbol, side, quantity, notice.price);

        if persist {
            self.ledger
                .update_order(
                    id,
                    new_state,
                    filled_quantity,
                    &OrderEventRow::new(
                        id,
                        notice.time,
                        OrderEventKind::Fill,
                        json!({ "quantity": quantity, "price": notice.price }),
                    ),
                )
                .await?;
        }

        let _ = self.updates_tx.send(OrderUpdate {
            client_order_id: id,
            symbol,
            state: new_state,
            filled_quantity,
            position,
        });

        Ok(())
    }

    /// Fetches the broker's fill history for one order and applies every
    /// fill not yet reflected in the ledger.
    async fn sync_fills(&self, client_order_id: Uuid) -> Result<()> {
        let history = self
            .with_deadline(self.broker.fill_history(client_order_id))
            .await
            .map_err(OrderError::Broker)?;

        let mut state = self.state.lock().await;

        let applied = state
            .orders
            .get(&client_order_id)
            .map(|entry| entry.filled_quantity)
            .unwrap_or(0);

        let mut seen = 0u64;

        for notice in history {
            let new_portion = (seen + notice.quantity).saturating_sub(applied.max(seen));
            seen += notice.quantity;

            if new_portion == 0 {
                continue;
            }

            let notice = FillNotice {
                quantity: new_portion,
                ..notice
            };

            self.apply_fill_locked(&mut state, &notice, true).await?;
        }

        Ok(())
    }

    async fn transition(
        &self,
        client_order_id: Uuid,
        new_state: OrderState,
        now: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let entry = state
            .orders
            .get_mut(&client_order_id)
            .ok_or(OrderError::UnknownOrder { client_order_id })?;

        entry.state = new_state;
        let filled_quantity = entry.filled_quantity;
        let symbol = entry.request.symbol.clone();

        self.ledger
            .update_order(
                client_order_id,
                new_state,
                filled_quantity,
                &OrderEventRow::new(client_order_id, now, OrderEventKind::Transition, details),
            )
            .await?;

        let position = state.positions.get(&symbol);

        let _ = self.updates_tx.send(OrderUpdate {
            client_order_id,
            symbol,
            state: new_state,
            filled_quantity,
            position,
        });

        Ok(())
    }

    /// Crash recovery: reload every non-terminal order from the ledger,
    /// replay the broker's fill history into the position book, and refresh
    /// lifecycle state from a status query. Must complete before the event
    /// stream resumes.
    pub async fn recover(&self, now: DateTime<Utc>) -> Result<()> {
        let rows = self.ledger.non_terminal_orders().await?;

        if rows.is_empty() {
            return Ok(());
        }

        info!(orders = rows.len(), "recovering non-terminal orders");

        for row in rows {
            let id = row.client_order_id;
            let persisted_fills = row.filled_quantity;

            {
                let mut state = self.state.lock().await;
                state.orders.insert(
                    id,
                    OrderEntry {
                        request: row.request.clone(),
                        state: row.state,
                        filled_quantity: 0,
                    },
                );
            }

            let history = match self.with_deadline(self.broker.fill_history(id)).await {
                Ok(history) => history,
                Err(e) => {
                    warn!(client_order_id = %id, error = %e,
                        "fill history unavailable during recovery, halting symbol");
                    self.state.lock().await.halted.insert(row.symbol.clone());
                    continue;
                }
            };

            {
                let mut state = self.state.lock().await;
                let mut seen = 0u64;

                for notice in history {
                    // Fills the ledger already holds rebuild the in-memory
                    // position only; anything beyond them is persisted too.
                    let persist = seen + notice.quantity > persisted_fills;
                    seen += notice.quantity;

                    self.apply_fill_locked(&mut state, &notice, persist).await?;
                }
            }

            match self.with_deadline(self.broker.query_status(id)).await {
                Ok(BrokerOrderStatus::Cancelled { .. }) => {
                    self.transition(id, OrderState::Cancelled, now, json!({ "recovered": true }))
                        .await?;
                }
                Ok(BrokerOrderStatus::Rejected) => {
                    self.transition(id, OrderState::Rejected, now, json!({ "recovered": true }))
                        .await?;
                }
                Ok(BrokerOrderStatus::Accepted { .. }) => {
                    if row.state != OrderState::PartiallyFilled {
                        self.transition(
                            id,
                            OrderState::Submitted,
                            now,
                            json!({ "recovered": true }),
                        )
                        .await?;
                    }
                }
                Ok(BrokerOrderStatus::Filled { .. }) | Ok(BrokerOrderStatus::Unknown) => {
                    // Filled state lands via the replayed fills; an unknown
                    // order stays parked for the operator.
                }
                Err(e) => {
                    warn!(client_order_id = %id, error = %e,
                        "status query failed during recovery, halting symbol");
                    self.state.lock().await.halted.insert(row.symbol.clone());
                }
            }
        }

        Ok(())
    }
}
