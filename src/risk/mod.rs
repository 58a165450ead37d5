use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
    order::{OrderRequest, OrderSide, OrderType, PositionBook, TimeInForce},
    shared::{Quantity, Symbol},
    strategy::{Direction, SignalIntent},
};

pub(crate) mod config;
pub(crate) mod error;

pub use config::RiskConfig;

use error::RiskConfigError;

/// Why an intent was suppressed instead of becoming an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SuppressReason {
    LimitExceeded,
    RateLimited,
    DuplicateIntent,
    FlipWithoutFlatten,
}

/// Outcome of risk evaluation for one intent.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Approved(OrderRequest),
    Suppressed { reason: SuppressReason },
}

impl fmt::Display for RiskDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved(request) => write!(f, "approved {request}"),
            Self::Suppressed { reason } => write!(f, "suppressed ({reason})"),
        }
    }
}

/// Token bucket advanced in event time, so backtest and live runs agree on
/// which intents get rate limited.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_interval: chrono::Duration,
    last_refill: Option<DateTime<Utc>>,
}

impl TokenBucket {
    fn new(capacity: u32, refill_interval: chrono::Duration) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_interval,
            last_refill: None,
        }
    }

    fn advance_to(&mut self, time: DateTime<Utc>) {
        if let Some(last) = self.last_refill {
            let elapsed = (time - last).num_milliseconds().max(0) as f64;
            let interval = self.refill_interval.num_milliseconds() as f64;

            self.tokens = (self.tokens + elapsed / interval).min(self.capacity);
        }

        self.last_refill = Some(time);
    }

    fn try_take(&mut self) -> bool {
        if self.tokens < 1.0 {
            return false;
        }

        self.tokens -= 1.0;
        true
    }
}

/// Converts raw intents into bounded order requests, or suppresses them.
///
/// Applies, in order: duplicate detection, the flip-without-flatten rule
/// (unless hedging is enabled), per-symbol and gross exposure caps, and a
/// token bucket rate limit that absorbs order storms from oscillating
/// sentiment.
pub struct RiskFilter {
    config: RiskConfig,
    bucket: TokenBucket,
    last_direction: HashMap<Symbol, Direction>,
}

impl RiskFilter {
    /// Creates a filter, validating the configuration up front.
    pub fn new(config: RiskConfig) -> Result<Self, RiskConfigError> {
        config.validate()?;

        let bucket = TokenBucket::new(config.bucket_capacity(), config.refill_interval());

        Ok(Self {
            config,
            bucket,
            last_direction: HashMap::new(),
        })
    }

    /// Evaluates one intent against current positions and limits.
    pub fn evaluate(&mut self, intent: &SignalIntent, positions: &PositionBook) -> RiskDecision {
        self.bucket.advance_to(intent.time);

        if self.last_direction.get(&intent.symbol) == Some(&intent.direction) {
            return RiskDecision::Suppressed {
                reason: SuppressReason::DuplicateIntent,
            };
        }

        let position = positions.get(&intent.symbol);
        let net = position.net_quantity;

        let (side, quantity) = match intent.direction {
            Direction::Flat => {
                if net == 0 {
                    // Nothing to flatten.
                    return RiskDecision::Suppressed {
                        reason: SuppressReason::DuplicateIntent,
                    };
                }

                let side = if net > 0 {
                    OrderSide::Sell
                } else {
                    OrderSide::Buy
                };

                (side, net.unsigned_abs())
            }
            Direction::Long => {
                if net < 0 && !self.config.hedging_enabled() {
                    return RiskDecision::Suppressed {
                        reason: SuppressReason::FlipWithoutFlatten,
                    };
                }

                match self.entry_quantity(intent, net, positions) {
                    Some(quantity) => (OrderSide::Buy, quantity),
                    None => {
                        return RiskDecision::Suppressed {
                            reason: SuppressReason::LimitExceeded,
                        };
                    }
                }
            }
            Direction::Short => {
                if net > 0 && !self.config.hedging_enabled() {
                    return RiskDecision::Suppressed {
                        reason: SuppressReason::FlipWithoutFlatten,
                    };
                }

                match self.entry_quantity(intent, -net, positions) {
                    Some(quantity) => (OrderSide::Sell, quantity),
                    None => {
                        return RiskDecision::Suppressed {
                            reason: SuppressReason::LimitExceeded,
                        };
                    }
                }
            }
        };

        if !self.bucket.try_take() {
            return RiskDecision::Suppressed {
                reason: SuppressReason::RateLimited,
            };
        }

        self.last_direction
            .insert(intent.symbol.clone(), intent.direction);

        let quantity = Quantity::try_from(quantity)
            .expect("entry sizing is bounded by validated limits");

        let request = OrderRequest {
            client_order_id: Uuid::new_v4(),
            symbol: intent.symbol.clone(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            time_in_force: TimeInForce::GoodTilCancelled,
        };

        debug!(intent = %intent, request = %request, "intent approved");

        RiskDecision::Approved(request)
    }

    /// Clears the duplicate-suppression record for a symbol whose approved
    /// order failed terminally without opening a position, so an identical
    /// re-entry intent is not suppressed.
    pub fn order_failed(&mut self, symbol: &Symbol) {
        if self.last_direction.remove(symbol).is_some() {
            debug!(%symbol, "duplicate-suppression record cleared after failed order");
        }
    }

    /// Sizes an entry by intent strength, bounded by the per-symbol cap and
    /// the remaining gross exposure headroom. `aligned_net` is the current
    /// net quantity measured in the intent's direction.
    fn entry_quantity(
        &self,
        intent: &SignalIntent,
        aligned_net: i64,
        positions: &PositionBook,
    ) -> Option<u64> {
        let max_position = self.config.max_position_per_symbol().as_u64();

        let desired = ((intent.strength * max_position as f64).floor() as u64).max(1);

        let symbol_headroom = (max_position as i64 - aligned_net).max(0) as u64;
        let gross_headroom = self
            .config
            .max_gross_exposure()
            .saturating_sub(positions.gross_exposure());

        let quantity = desired.min(symbol_headroom).min(gross_headroom);

        if quantity == 0 { None } else { Some(quantity) }
    }
}

#[cfg(test)]
mod tests;
