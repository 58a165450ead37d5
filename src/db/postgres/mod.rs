pub(crate) mod order_ledger;
pub(crate) mod watermarks;
