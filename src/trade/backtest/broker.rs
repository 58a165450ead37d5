use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    event::MarketBar,
    order::{
        Broker, BrokerAck, BrokerError, BrokerOrderStatus, FillNotice, OrderRequest, OrderSide,
    },
};

#[derive(Debug, Clone)]
struct SimOrder {
    request: OrderRequest,
    filled_quantity: u64,
    cancelled: bool,
}

#[derive(Default)]
struct SimState {
    orders: HashMap<Uuid, SimOrder>,
    /// Client order ids in submission order; fills replay in this order.
    submissions: Vec<Uuid>,
    history: HashMap<Uuid, Vec<FillNotice>>,
}

/// Deterministic simulated broker for backtests.
///
/// Working orders fill in full at the next bar's open for their symbol,
/// shifted by the configured slippage (adverse: buys fill higher, sells
/// lower). No network, no failures; order bookkeeping behaves exactly like
/// a well-behaved live broker.
pub struct SimulatedBroker {
    slippage_bps: f64,
    state: Mutex<SimState>,
    fills_tx: broadcast::Sender<FillNotice>,
}

impl SimulatedBroker {
    pub fn new(slippage_bps: f64) -> Self {
        let (fills_tx, _) = broadcast::channel(1_024);

        Self {
            slippage_bps,
            state: Mutex::new(SimState::default()),
            fills_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state
            .lock()
            .expect("`SimulatedBroker` mutex can't be poisoned")
    }

    fn fill_price(&self, side: OrderSide, open: f64) -> f64 {
        let shift = open * self.slippage_bps / 10_000.0;

        match side {
            OrderSide::Buy => open + shift,
            OrderSide::Sell => open - shift,
        }
    }

    /// Fills every working order for the bar's symbol at the bar open, in
    /// submission order, returning the generated fills paired with their
    /// order side.
    pub(super) fn on_bar(&self, bar: &MarketBar) -> Vec<(OrderSide, FillNotice)> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut fills = Vec::new();

        for id in &state.submissions {
            let Some(order) = state.orders.get_mut(id) else {
                continue;
            };

            if order.cancelled
                || order.request.symbol != bar.symbol
                || order.filled_quantity >= order.request.quantity.as_u64()
            {
                continue;
            }

            let quantity = order.request.quantity.as_u64() - order.filled_quantity;
            order.filled_quantity = order.request.quantity.as_u64();

            let notice = FillNotice {
                client_order_id: order.request.client_order_id,
                time: bar.time,
                quantity,
                price: self.fill_price(order.request.side, bar.open),
            };

            fills.push((order.request.side, notice));
        }

        for (_, notice) in &fills {
            state
                .history
                .entry(notice.client_order_id)
                .or_default()
                .push(notice.clone());

            let _ = self.fills_tx.send(notice.clone());
        }

        fills
    }

    fn register(&self, request: &OrderRequest) {
        let mut state = self.lock();

        if state.orders.contains_key(&request.client_order_id) {
            return;
        }

        state.submissions.push(request.client_order_id);
        state.orders.insert(
            request.client_order_id,
            SimOrder {
                request: request.clone(),
                filled_quantity: 0,
                cancelled: false,
            },
        );
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    async fn submit(&self, request: &OrderRequest) -> Result<BrokerAck, BrokerError> {
        self.register(request);

        Ok(BrokerAck {
            client_order_id: request.client_order_id,
            broker_order_id: None,
        })
    }

    async fn query_status(
        &self,
        client_order_id: Uuid,
    ) -> Result<BrokerOrderStatus, BrokerError> {
        let state = self.lock();

        Ok(match state.orders.get(&client_order_id) {
            None => BrokerOrderStatus::Unknown,
            Some(order) if order.cancelled => BrokerOrderStatus::Cancelled {
                filled_quantity: order.filled_quantity,
            },
            Some(order) if order.filled_quantity >= order.request.quantity.as_u64() => {
                BrokerOrderStatus::Filled {
                    filled_quantity: order.filled_quantity,
                }
            }
            Some(order) => BrokerOrderStatus::Accepted {
                filled_quantity: order.filled_quantity,
            },
        })
    }

    async fn cancel(&self, client_order_id: Uuid) -> Result<BrokerAck, BrokerError> {
        let mut state = self.lock();

        match state.orders.get_mut(&client_order_id) {
            Some(order) => {
                order.cancelled = true;

                Ok(BrokerAck {
                    client_order_id,
                    broker_order_id: None,
                })
            }
            None => Err(BrokerError::Permanent(format!(
                "unknown order `{client_order_id}`"
            ))),
        }
    }

    fn fill_notifications(&self) -> broadcast::Receiver<FillNotice> {
        self.fills_tx.subscribe()
    }

    async fn fill_history(&self, client_order_id: Uuid) -> Result<Vec<FillNotice>, BrokerError> {
        Ok(self
            .lock()
            .history
            .get(&client_order_id)
            .cloned()
            .unwrap_or_default())
    }
}
