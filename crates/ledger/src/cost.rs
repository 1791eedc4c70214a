use configuration::CostConfig;
use core_types::OrderSide;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Per-order cap on the TAF fee, in dollars.
const TAF_FEE_CAP: Decimal = dec!(7.27);

const HUNDRED: Decimal = dec!(100);

/// Pure calculator for commission, slippage and regulatory fees.
///
/// Percent-valued config fields are percents (0.05 means 0.05%), so every
/// percentage term is divided by 100 here and nowhere else.
#[derive(Debug, Clone)]
pub struct CostModel {
    config: CostConfig,
}

impl CostModel {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    /// Commission for an order of the given notional value.
    pub fn commission(&self, notional: Decimal) -> Decimal {
        self.config.commission_fixed + notional * self.config.commission_pct / HUNDRED
    }

    /// Modeled slippage cost for an order of the given notional value.
    /// Applied on both buys and sells.
    pub fn slippage(&self, notional: Decimal) -> Decimal {
        notional * self.config.slippage_pct / HUNDRED
    }

    /// Modeled slippage per share at the given price. Stamped onto `Trade`
    /// records so `Trade::total_cost` reproduces the notional-based figure.
    pub fn slippage_per_share(&self, price: Decimal) -> Decimal {
        price * self.config.slippage_pct / HUNDRED
    }

    /// SEC + TAF fees. Charged only on sells; the TAF component is capped.
    pub fn regulatory_fees(&self, notional: Decimal, shares: u64, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => Decimal::ZERO,
            OrderSide::Sell => {
                let sec_fee = notional * self.config.sec_fee_rate;
                let taf_fee =
                    (Decimal::from(shares) * self.config.taf_fee_per_share).min(TAF_FEE_CAP);
                sec_fee + taf_fee
            }
        }
    }

    /// Total transaction cost for a prospective trade, in dollars.
    /// Never negative for positive inputs.
    pub fn total_cost(&self, notional: Decimal, shares: u64, side: OrderSide) -> Decimal {
        self.commission(notional) + self.slippage(notional) + self.regulatory_fees(notional, shares, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::Settings;

    fn model() -> CostModel {
        CostModel::new(Settings::default().costs)
    }

    #[test]
    fn buys_carry_no_regulatory_fees() {
        let model = model();
        assert_eq!(
            model.regulatory_fees(dec!(5000), 100, OrderSide::Buy),
            Decimal::ZERO
        );
    }

    #[test]
    fn sell_cost_includes_sec_and_taf() {
        let model = model();
        let notional = dec!(5500);
        // 5 bps slippage + SEC on notional + TAF per share.
        let expected = dec!(5500) * dec!(0.0005)
            + notional * dec!(0.0000278)
            + dec!(100) * dec!(0.000166);
        assert_eq!(model.total_cost(notional, 100, OrderSide::Sell), expected);
    }

    #[test]
    fn taf_fee_is_capped() {
        let model = model();
        // 100k shares would be $16.60 uncapped.
        let fees = model.regulatory_fees(dec!(100000), 100_000, OrderSide::Sell);
        let sec = dec!(100000) * dec!(0.0000278);
        assert_eq!(fees, sec + TAF_FEE_CAP);
    }

    #[test]
    fn cost_is_never_negative() {
        let model = model();
        assert!(model.total_cost(dec!(0.01), 1, OrderSide::Buy) >= Decimal::ZERO);
        assert!(model.total_cost(dec!(0.01), 1, OrderSide::Sell) >= Decimal::ZERO);
    }
}
