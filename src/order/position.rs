use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::shared::Symbol;

use super::OrderSide;

/// Net exposure for one symbol, derived exclusively from fills.
///
/// Invariant: `net_quantity` equals the signed sum of all fill quantities
/// applied for the symbol. Intents never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub net_quantity: i64,
    pub average_entry_price: f64,
    pub realized_pnl: f64,
}

impl Position {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            net_quantity: 0,
            average_entry_price: 0.0,
            realized_pnl: 0.0,
        }
    }

    fn apply_fill(&mut self, side: OrderSide, quantity: u64, price: f64) {
        let signed = match side {
            OrderSide::Buy => quantity as i64,
            OrderSide::Sell => -(quantity as i64),
        };

        if self.net_quantity == 0 || self.net_quantity.signum() == signed.signum() {
            // Opening or adding: average in the new fill.
            let held = self.net_quantity.unsigned_abs() as f64;
            let added = quantity as f64;

            self.average_entry_price =
                (self.average_entry_price * held + price * added) / (held + added);
            self.net_quantity += signed;

            return;
        }

        // Reducing or crossing through flat.
        let closing = self.net_quantity.unsigned_abs().min(quantity);
        let direction = self.net_quantity.signum() as f64;

        self.realized_pnl += (price - self.average_entry_price) * closing as f64 * direction;
        self.net_quantity += signed;

        if self.net_quantity == 0 {
            self.average_entry_price = 0.0;
        } else if self.net_quantity.signum() == signed.signum() {
            // Crossed through flat: the remainder opened at the fill price.
            self.average_entry_price = price;
        }
    }
}

/// Position ledger across symbols, single-writer behind the order manager's
/// lock.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<Symbol, Position>,
}

impl PositionBook {
    /// Applies one fill, returning the updated position.
    pub(crate) fn apply_fill(
        &mut self,
        symbol: &Symbol,
        side: OrderSide,
        quantity: u64,
        price: f64,
    ) -> Position {
        let position = self
            .positions
            .entry(symbol.clone())
            .or_insert_with(|| Position::new(symbol.clone()));

        position.apply_fill(side, quantity, price);
        position.clone()
    }

    /// Returns the position for a symbol, flat if never traded.
    pub fn get(&self, symbol: &Symbol) -> Position {
        self.positions
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Position::new(symbol.clone()))
    }

    /// Total realized profit and loss across all symbols, including symbols
    /// that have since gone flat.
    pub fn realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    /// Sum of absolute net quantities across all symbols.
    pub fn gross_exposure(&self) -> u64 {
        self.positions
            .values()
            .map(|p| p.net_quantity.unsigned_abs())
            .sum()
    }

    /// Snapshot of all non-flat positions, ordered by symbol.
    pub fn snapshot(&self) -> Vec<Position> {
        let mut rows: Vec<_> = self
            .positions
            .values()
            .filter(|p| p.net_quantity != 0)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        rows
    }
}
