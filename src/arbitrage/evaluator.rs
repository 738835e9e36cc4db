//! Go/no-go decision on a detected spread

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SkipReason {
    BelowThreshold { spread: Decimal, threshold: Decimal },
    NothingToTrade { tradable: Decimal },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Decision {
    Go { tradable: Decimal, expected_profit: Decimal },
    Skip(SkipReason),
}

impl Decision {
    pub fn is_go(&self) -> bool {
        matches!(self, Decision::Go { .. })
    }
}

/// Profit on `tradable` base at the given spread, net of slippage.
pub fn expected_profit(tradable: Decimal, spread: Decimal, slippage: Decimal) -> Decimal {
    tradable * (spread / dec!(100)) - tradable * (slippage / dec!(100))
}

pub fn evaluate(
    spread: Decimal,
    threshold: Decimal,
    base_balance: Decimal,
    gas_reserve: Decimal,
    slippage: Decimal,
) -> Decision {
    if spread < threshold {
        return Decision::Skip(SkipReason::BelowThreshold { spread, threshold });
    }

    let tradable = base_balance - gas_reserve;
    if tradable <= Decimal::ZERO {
        return Decision::Skip(SkipReason::NothingToTrade { tradable });
    }

    Decision::Go {
        tradable,
        expected_profit: expected_profit(tradable, spread, slippage),
    }
}

/// `spread - diff - slippage`; negative means the leg is not worth sending.
pub fn margin(spread: Decimal, diff_percentage: Decimal, slippage: Decimal) -> Decimal {
    spread - diff_percentage - slippage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_above_threshold_with_tradable_balance() {
        let decision = evaluate(dec!(3), dec!(2), dec!(10.2), dec!(0.2), dec!(0.5));
        assert_eq!(
            decision,
            Decision::Go { tradable: dec!(10.0), expected_profit: dec!(0.25) }
        );
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(evaluate(dec!(2), dec!(2), dec!(5), dec!(0.2), dec!(0.5)).is_go());
    }

    #[test]
    fn skips_below_threshold() {
        assert!(matches!(
            evaluate(dec!(1.99), dec!(2), dec!(5), dec!(0.2), dec!(0.5)),
            Decision::Skip(SkipReason::BelowThreshold { .. })
        ));
    }

    #[test]
    fn skips_when_gas_reserve_eats_balance() {
        assert!(matches!(
            evaluate(dec!(5), dec!(2), dec!(0.2), dec!(0.2), dec!(0.5)),
            Decision::Skip(SkipReason::NothingToTrade { .. })
        ));
    }

    #[test]
    fn margin_matches_worked_example() {
        let spread = dec!(7.14);
        assert!(margin(spread, dec!(5.0), dec!(0.5)) >= Decimal::ZERO);
        assert!(margin(spread, dec!(8.0), dec!(0.6)) < Decimal::ZERO);
    }
}
