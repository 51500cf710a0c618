use crate::core::finance::Money;
use crate::core::installment::{Amounted, total_of};

use rust_decimal::Decimal;
use serde::Serialize;

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Balance {
    Balanced,
    /// Платежей больше, чем сумма договора
    Surplus,
    /// Платежей не хватает до суммы договора
    Deficit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reconciliation {
    pub total_installments: Money,
    /// Сумма договора минус сумма платежей
    pub difference: Money,
    pub status: Balance,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.status == Balance::Balanced
    }
}

impl Display for Reconciliation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Balance::Balanced => write!(f, "✅ Сходится: {}", self.total_installments),
            Balance::Surplus => write!(
                f,
                "⚠️ Платежи превышают сумму договора на {}",
                self.difference.abs()
            ),
            Balance::Deficit => write!(
                f,
                "⚠️ До суммы договора не хватает {}",
                self.difference
            ),
        }
    }
}

/// Единственная проверка перед сохранением графика.
/// Расхождение меньше одной единицы считается сошедшимся
pub fn reconcile<T: Amounted>(installments: &[T], total: Money) -> Reconciliation {
    let total_installments = total_of(installments);
    let difference = total - total_installments;
    let status = if difference.abs().value() < Decimal::ONE {
        Balance::Balanced
    } else if difference < Money::ZERO {
        Balance::Surplus
    } else {
        Balance::Deficit
    };
    Reconciliation {
        total_installments,
        difference,
        status,
    }
}

#[cfg(test)]
mod test_reconcile {
    use chrono::NaiveDate;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::core::installment::{Installment, PaymentType};

    fn installments(amounts: &[Decimal]) -> Vec<Installment> {
        amounts
            .iter()
            .map(|a| {
                Installment::new(
                    Money::new(*a),
                    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    PaymentType::default(),
                )
            })
            .collect()
    }

    #[rstest]
    #[case::exact(&[dec!(500), dec!(500)], Balance::Balanced)]
    #[case::within_tolerance(&[dec!(500), dec!(499.5)], Balance::Balanced)]
    #[case::deficit(&[dec!(500), dec!(150)], Balance::Deficit)]
    #[case::surplus(&[dec!(500), dec!(501)], Balance::Surplus)]
    #[case::empty(&[], Balance::Deficit)]
    fn status(#[case] amounts: &[Decimal], #[case] expected: Balance) {
        let r = reconcile(&installments(amounts), Money::new(dec!(1000)));
        assert_eq!(r.status, expected);
        assert_eq!(r.is_balanced(), expected == Balance::Balanced);
    }

    #[test]
    fn difference_is_reported() {
        let r = reconcile(&installments(&[dec!(500), dec!(150)]), Money::new(dec!(1000)));
        assert_eq!(r.total_installments, Money::new(dec!(650)));
        assert_eq!(r.difference, Money::new(dec!(350)));
    }

    #[test]
    fn zero_total_is_balanced() {
        let r = reconcile(&installments(&[dec!(0), dec!(0)]), Money::ZERO);
        assert!(r.is_balanced());
    }

    #[test]
    fn idempotent() {
        let items = installments(&[dec!(333.33), dec!(333.33)]);
        let total = Money::new(dec!(1000));
        assert_eq!(reconcile(&items, total), reconcile(&items, total));
    }
}
