use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Failed to decode stored value for column `{column}`: {reason}")]
    Decode { column: &'static str, reason: String },

    #[error("Order {client_order_id} not found in ledger")]
    OrderNotFound { client_order_id: uuid::Uuid },
}

pub(crate) type Result<T> = std::result::Result<T, DbError>;
