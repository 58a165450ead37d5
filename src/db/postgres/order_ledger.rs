use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::order::{OrderRequest, OrderState};

use super::super::{
    error::{DbError, Result},
    models::{OrderEventKind, OrderEventRow, OrderRow},
    repositories::OrderLedgerRepository,
};

pub(crate) struct PgOrderLedgerRepo {
    pool: Arc<Pool<Postgres>>,
}

impl PgOrderLedgerRepo {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &Pool<Postgres> {
        self.pool.as_ref()
    }

    fn decode_order(row: PgRow) -> Result<OrderRow> {
        let request_json: String = row.try_get("request").map_err(DbError::Query)?;
        let request: OrderRequest =
            serde_json::from_str(&request_json).map_err(|e| DbError::Decode {
                column: "request",
                reason: e.to_string(),
            })?;

        let state_str: String = row.try_get("state").map_err(DbError::Query)?;
        let state = OrderState::from_str(&state_str).map_err(|e| DbError::Decode {
            column: "state",
            reason: e.to_string(),
        })?;

        let filled_quantity: i64 = row.try_get("filled_quantity").map_err(DbError::Query)?;

        Ok(OrderRow {
            client_order_id: row.try_get("client_order_id").map_err(DbError::Query)?,
            symbol: request.symbol.clone(),
            request,
            state,
            filled_quantity: filled_quantity.max(0) as u64,
            created_at: row.try_get("created_at").map_err(DbError::Query)?,
            updated_at: row.try_get("updated_at").map_err(DbError::Query)?,
        })
    }

    fn decode_event(row: PgRow) -> Result<OrderEventRow> {
        let kind_str: String = row.try_get("kind").map_err(DbError::Query)?;
        let kind = OrderEventKind::from_str(&kind_str).map_err(|e| DbError::Decode {
            column: "kind",
            reason: e.to_string(),
        })?;

        let details_json: String = row.try_get("details").map_err(DbError::Query)?;
        let details = serde_json::from_str(&details_json).map_err(|e| DbError::Decode {
            column: "details",
            reason: e.to_string(),
        })?;

        Ok(OrderEventRow {
            event_id: row.try_get("event_id").map_err(DbError::Query)?,
            client_order_id: row.try_get("client_order_id").map_err(DbError::Query)?,
            time: row.try_get("time").map_err(DbError::Query)?,
            kind,
            details,
        })
    }

    fn encode_event(
        event: &OrderEventRow,
    ) -> (Uuid, Uuid, DateTime<Utc>, String, String) {
        (
            event.event_id,
            event.client_order_id,
            event.time,
            event.kind.to_string(),
            event.details.to_string(),
        )
    }
}

#[async_trait]
impl OrderLedgerRepository for PgOrderLedgerRepo {
    async fn insert_order(&self, order: &OrderRow) -> Result<()> {
        let request_json = serde_json::to_string(&order.request).map_err(|e| DbError::Decode {
            column: "request",
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
                INSERT INTO orders
                    (client_order_id, symbol, request, state, filled_quantity,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (client_order_id) DO NOTHING
            "#,
        )
        .bind(order.client_order_id)
        .bind(order.symbol.as_str())
        .bind(request_json)
        .bind(order.state.to_string())
        .bind(order.filled_quantity as i64)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(self.pool())
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn update_order(
        &self,
        client_order_id: Uuid,
        state: OrderState,
        filled_quantity: u64,
        event: &OrderEventRow,
    ) -> Result<()> {
        // State update and event append are one transaction so a crash
        // between them is never observable.
        let mut tx = self.pool().begin().await.map_err(DbError::Query)?;

        let updated = sqlx::query(
            r#"
                UPDATE orders
                SET state = $2, filled_quantity = $3, updated_at = $4
                WHERE client_order_id = $1
            "#,
        )
        .bind(client_order_id)
        .bind(state.to_string())
        .bind(filled_quantity as i64)
        .bind(event.time)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        if updated.rows_affected() == 0 {
            return Err(DbError::OrderNotFound { client_order_id });
        }

        let (event_id, order_id, time, kind, details) = Self::encode_event(event);

        sqlx::query(
            r#"
                INSERT INTO order_events (event_id, client_order_id, time, kind, details)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event_id)
        .bind(order_id)
        .bind(time)
        .bind(kind)
        .bind(details)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        tx.commit().await.map_err(DbError::Query)?;

        Ok(())
    }

    async fn append_event(&self, event: &OrderEventRow) -> Result<()> {
        let (event_id, order_id, time, kind, details) = Self::encode_event(event);

        sqlx::query(
            r#"
                INSERT INTO order_events (event_id, client_order_id, time, kind, details)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event_id)
        .bind(order_id)
        .bind(time)
        .bind(kind)
        .bind(details)
        .execute(self.pool())
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn get_order(&self, client_order_id: Uuid) -> Result<Option<OrderRow>> {
        let row = sqlx::query(
            r#"
                SELECT client_order_id, symbol, request, state, filled_quantity,
                       created_at, updated_at
                FROM orders
                WHERE client_order_id = $1
            "#,
        )
        .bind(client_order_id)
        .fetch_optional(self.pool())
        .await
        .map_err(DbError::Query)?;

        row.map(Self::decode_order).transpose()
    }

    async fn non_terminal_orders(&self) -> Result<Vec<OrderRow>> {
        let rows = sqlx::query(
            r#"
                SELECT client_order_id, symbol, request, state, filled_quantity,
                       created_at, updated_at
                FROM orders
                WHERE state NOT IN ('filled', 'cancelled', 'rejected')
                ORDER BY created_at
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(DbError::Query)?;

        rows.into_iter().map(Self::decode_order).collect()
    }

    async fn events(&self, client_order_id: Uuid) -> Result<Vec<OrderEventRow>> {
        let rows = sqlx::query(
            r#"
                SELECT event_id, client_order_id, time, kind, details
                FROM order_events
                WHERE client_order_id = $1
                ORDER BY time, event_id
            "#,
        )
        .bind(client_order_id)
        .fetch_all(self.pool())
        .await
        .map_err(DbError::Query)?;

        rows.into_iter().map(Self::decode_event).collect()
    }
}
