use chrono::{DateTime, Utc};
use core_types::{OrderSide, OrderStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

/// One submitted (or paper-filled) order, kept for status polling and audit.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub record_id: Uuid,
    /// Brokerage order id. `None` for paper fills, which never hit a broker.
    pub order_id: Option<String>,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Append-only store of order records.
#[derive(Debug, Default)]
pub struct OrderStore {
    records: Vec<OrderRecord>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        order_id: Option<String>,
        ticker: &str,
        side: OrderSide,
        quantity: u64,
        price: Decimal,
        timestamp: DateTime<Utc>,
        status: OrderStatus,
    ) -> Uuid {
        let record_id = Uuid::new_v4();
        self.records.push(OrderRecord {
            record_id,
            order_id,
            ticker: ticker.to_string(),
            side,
            quantity,
            price,
            timestamp,
            status,
        });
        record_id
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    /// Records that still need a status refresh: non-terminal, with a real
    /// brokerage order id.
    pub fn pollable_mut(&mut self) -> impl Iterator<Item = &mut OrderRecord> {
        self.records
            .iter_mut()
            .filter(|r| !r.status.is_terminal() && r.order_id.is_some())
    }

    /// Marks every non-terminal record cancelled. Used after a successful
    /// account-wide cancel.
    pub fn cancel_open(&mut self) {
        for record in self.records.iter_mut() {
            if !record.status.is_terminal() {
                record.status = OrderStatus::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    #[test]
    fn only_submitted_live_orders_are_pollable() {
        let mut store = OrderStore::new();
        store.push(
            Some("123".to_string()),
            "TQQQ",
            OrderSide::Buy,
            10,
            dec!(50),
            ts(),
            OrderStatus::Submitted,
        );
        store.push(None, "SPY", OrderSide::Buy, 1, dec!(400), ts(), OrderStatus::Filled);
        store.push(
            Some("456".to_string()),
            "QQQ",
            OrderSide::Sell,
            2,
            dec!(300),
            ts(),
            OrderStatus::Rejected,
        );

        let pollable: Vec<_> = store.pollable_mut().map(|r| r.ticker.clone()).collect();
        assert_eq!(pollable, vec!["TQQQ".to_string()]);
    }

    #[test]
    fn cancel_open_leaves_terminal_records_alone() {
        let mut store = OrderStore::new();
        store.push(
            Some("123".to_string()),
            "TQQQ",
            OrderSide::Buy,
            10,
            dec!(50),
            ts(),
            OrderStatus::Submitted,
        );
        store.push(None, "SPY", OrderSide::Buy, 1, dec!(400), ts(), OrderStatus::Filled);

        store.cancel_open();

        assert_eq!(store.records()[0].status, OrderStatus::Cancelled);
        assert_eq!(store.records()[1].status, OrderStatus::Filled);
    }
}
