use crate::core::allocate::allocate;
use crate::core::finance::Money;
use crate::core::installment::{Amounted, Installment, PaymentType, total_of};
use crate::core::interval::shift;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_INTERVAL_MONTHS: u32 = 1;

const TOLERANCE: Decimal = dec!(0.01);

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("entry #{index} has no due date")]
    MissingDueDate { index: usize },
    #[error("entry #{index} has negative amount")]
    NegativeAmount { index: usize },
}

/// Строка ручного распределения, пока пользователь её редактирует
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualEntry {
    pub amount: Money,
    pub due_date: Option<NaiveDate>,
    pub description: String,
    pub payment_type: PaymentType,
}

impl ManualEntry {
    #[must_use]
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

impl Amounted for ManualEntry {
    fn amount(&self) -> Money {
        self.amount
    }

    fn set_amount(&mut self, amount: Money) {
        self.amount = amount;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    pub balanced: bool,
    /// Сумма договора минус сумма строк
    pub difference: Money,
}

/// Превращает ручные строки в платежи. Суммы не пересчитываются
///
/// # Errors
/// `MissingDueDate` - у строки нет даты
/// `NegativeAmount` - отрицательная сумма
pub fn build_manual(entries: &[ManualEntry]) -> Result<Vec<Installment>, ValidationError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, e)| {
            if e.amount < Money::ZERO {
                return Err(ValidationError::NegativeAmount { index });
            }
            let due_date = e.due_date.ok_or(ValidationError::MissingDueDate { index })?;
            Ok(Installment {
                amount: e.amount,
                due_date,
                description: e.description.clone(),
                payment_type: e.payment_type.clone(),
                pinned: false,
            })
        })
        .collect()
}

/// Сверка строк с суммой договора с точностью до копейки.
/// Ничего не блокирует, только сообщает
pub fn validate<T: Amounted>(entries: &[T], total: Money) -> Validation {
    let difference = total - total_of(entries);
    Validation {
        balanced: difference.abs().value() < TOLERANCE,
        difference,
    }
}

/// Пропорционально масштабирует суммы под новую сумму договора
///
/// Доли считаются от текущих сумм, последняя строка забирает погрешность.
/// Если текущая сумма нулевая, строки возвращаются без изменений
///
/// # Arguments
///
/// * `entries`: Текущие строки
/// * `new_total`: Новая сумма договора
///
/// returns: Vec<T>
///
pub fn renormalize<T: Amounted + Clone>(entries: &[T], new_total: Money) -> Vec<T> {
    let current = total_of(entries);
    if current.value().is_zero() {
        warn!(%new_total, "нечего масштабировать: сумма строк нулевая");
        return entries.to_vec();
    }

    let weights: Vec<Decimal> = entries.iter().map(|e| e.amount().value()).collect();
    match allocate(new_total, &weights) {
        Ok(amounts) => entries
            .iter()
            .zip(amounts)
            .map(|(e, amount)| {
                let mut e = e.clone();
                e.set_amount(amount);
                e
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "масштабирование невозможно");
            entries.to_vec()
        }
    }
}

/// Проставляет даты строкам без даты: `start + i * interval_months`.
/// Уже заданные даты не трогает
pub fn auto_fill_dates(
    entries: &[ManualEntry],
    start: NaiveDate,
    interval_months: u32,
) -> Vec<ManualEntry> {
    (0u32..)
        .zip(entries)
        .map(|(i, e)| {
            let mut e = e.clone();
            if e.due_date.is_none() {
                e.due_date = Some(shift(start, i.saturating_mul(interval_months)));
            }
            e
        })
        .collect()
}

#[cfg(test)]
mod test_manual {
    use rust_decimal_macros::dec;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entries(amounts: &[Decimal]) -> Vec<ManualEntry> {
        amounts
            .iter()
            .map(|a| ManualEntry::new(Money::new(*a)).on(date(2025, 1, 1)))
            .collect()
    }

    #[test]
    fn balanced_manual_distribution() {
        let e = entries(&[dec!(500), dec!(300), dec!(200)]);
        let installments = build_manual(&e).unwrap();
        assert_eq!(installments.len(), 3);
        assert_eq!(
            validate(&installments, Money::new(dec!(1000))),
            Validation {
                balanced: true,
                difference: Money::ZERO
            }
        );
    }

    #[test]
    fn unbalanced_reports_difference() {
        let e = entries(&[dec!(500), dec!(150)]);
        assert_eq!(
            validate(&e, Money::new(dec!(1000))),
            Validation {
                balanced: false,
                difference: Money::new(dec!(350))
            }
        );
        assert_eq!(
            validate(&e, Money::new(dec!(600))).difference,
            Money::new(dec!(-50))
        );
    }

    #[test]
    fn build_requires_dates() {
        let mut e = entries(&[dec!(1), dec!(2)]);
        e[1].due_date = None;
        assert_eq!(build_manual(&e), Err(ValidationError::MissingDueDate { index: 1 }));
    }

    #[test]
    fn build_rejects_negative_amount() {
        let e = entries(&[dec!(-1)]);
        assert_eq!(build_manual(&e), Err(ValidationError::NegativeAmount { index: 0 }));
    }

    #[test]
    fn renormalize_keeps_ratios() {
        let e = entries(&[dec!(500), dec!(300), dec!(200)]);
        let result = renormalize(&e, Money::new(dec!(2000)));
        let amounts: Vec<_> = result.iter().map(|e| e.amount).collect();
        assert_eq!(
            amounts,
            vec![
                Money::new(dec!(1000)),
                Money::new(dec!(600)),
                Money::new(dec!(400))
            ]
        );
    }

    #[test]
    fn renormalize_last_absorbs_drift() {
        let e = entries(&[dec!(1), dec!(1), dec!(1)]);
        let result = renormalize(&e, Money::new(dec!(100)));
        assert_eq!(result[2].amount, Money::new(dec!(33.34)));
        assert_eq!(total_of(&result), Money::new(dec!(100)));
        assert_eq!(result[0].due_date, e[0].due_date);
    }

    #[test]
    fn renormalize_zero_sum_is_noop() {
        let e = entries(&[dec!(0), dec!(0)]);
        assert_eq!(renormalize(&e, Money::new(dec!(100))), e);
    }

    #[test]
    fn renormalize_large_amounts() {
        let e = entries(&[dec!(100000000000000), dec!(100000000000000)]);
        let scaled = renormalize(&e, Money::new(dec!(1000000000000000)));
        assert_eq!(total_of(&scaled), Money::new(dec!(1000000000000000)));
        assert_eq!(scaled[0].amount, Money::new(dec!(500000000000000)));
    }

    #[test]
    fn auto_fill_keeps_existing_dates() {
        let e = vec![
            ManualEntry::new(Money::new(dec!(1))),
            ManualEntry::new(Money::new(dec!(1))).on(date(2030, 5, 5)),
            ManualEntry::new(Money::new(dec!(1))),
        ];
        let filled = auto_fill_dates(&e, date(2025, 1, 31), 2);
        assert_eq!(
            filled.iter().map(|e| e.due_date).collect::<Vec<_>>(),
            vec![
                Some(date(2025, 1, 31)),
                Some(date(2030, 5, 5)),
                Some(date(2025, 5, 31))
            ]
        );
    }

    #[test]
    fn auto_fill_default_interval() {
        let e = vec![ManualEntry::default(), ManualEntry::default()];
        let filled = auto_fill_dates(&e, date(2025, 1, 31), DEFAULT_INTERVAL_MONTHS);
        assert_eq!(filled[1].due_date, Some(date(2025, 2, 28)));
    }
}
