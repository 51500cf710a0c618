use crate::core::finance::Money;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("nothing to allocate into")]
    Empty,
    #[error("weight #{index} is negative")]
    NegativeWeight { index: usize },
    #[error("all weights are zero")]
    ZeroWeights,
    #[error("total or weight is not a finite number")]
    NonFinite,
    #[error("total or weights are too large")]
    Overflow,
}

/// Делит сумму по весам так, чтобы части в сумме давали ровно `total`
///
/// Каждая часть, кроме последней, округляется до копеек. Последняя получает
/// `total - сумма остальных` и забирает на себя всю погрешность округления.
/// Если из-за округления вверх последняя часть ушла бы в минус (доли меньше
/// пары копеек), остальные части округляются вниз.
///
/// # Arguments
///
/// * `total`: Распределяемая сумма
/// * `weights`: Веса частей, неотрицательные
///
/// # Errors
/// `Empty` - нет ни одной части
/// `NegativeWeight` - среди весов есть отрицательный
/// `ZeroWeights` - все веса нулевые при числе частей больше одной
/// `Overflow` - сумма весов или доля не помещается в `Decimal`
///
/// returns: Result<Vec<Money>, `AllocationError`>
///
pub fn allocate(total: Money, weights: &[Decimal]) -> Result<Vec<Money>, AllocationError> {
    if weights.is_empty() {
        return Err(AllocationError::Empty);
    }
    if let Some(index) = weights.iter().position(|w| *w < Decimal::ZERO) {
        return Err(AllocationError::NegativeWeight { index });
    }
    if weights.len() == 1 {
        return Ok(vec![total]);
    }

    let weight_sum = weights
        .iter()
        .try_fold(Decimal::ZERO, |acc, w| acc.checked_add(*w))
        .ok_or(AllocationError::Overflow)?;
    if weight_sum.is_zero() {
        return Err(AllocationError::ZeroWeights);
    }

    let (_, head) = weights.split_last().ok_or(AllocationError::Empty)?;
    let exact: Vec<Decimal> = head
        .iter()
        .map(|w| exact_share(total.value(), *w, weight_sum))
        .collect::<Result<_, _>>()?;

    let mut shares: Vec<Money> = exact.iter().map(|e| Money::new(*e)).collect();
    let mut sink = total - shares.iter().sum::<Money>();

    if sink < Money::ZERO && total >= Money::ZERO {
        debug!(%total, %sink, "доли меньше копейки, округляю вниз");
        shares = exact
            .iter()
            .map(|e| Money::new(e.round_dp_with_strategy(2, RoundingStrategy::ToZero)))
            .collect();
        sink = total - shares.iter().sum::<Money>();
    }

    shares.push(sink);
    Ok(shares)
}

/// `total * weight / weight_sum`. Если произведение не помещается в `Decimal`,
/// сначала считается доля веса
fn exact_share(
    total: Decimal,
    weight: Decimal,
    weight_sum: Decimal,
) -> Result<Decimal, AllocationError> {
    total
        .checked_mul(weight)
        .and_then(|v| v.checked_div(weight_sum))
        .or_else(|| {
            weight
                .checked_div(weight_sum)
                .and_then(|ratio| total.checked_mul(ratio))
        })
        .ok_or(AllocationError::Overflow)
}

/// Равные части: `allocate` с единичными весами
///
/// # Errors
/// `Empty` - `count == 0`
pub fn allocate_evenly(total: Money, count: usize) -> Result<Vec<Money>, AllocationError> {
    allocate(total, &vec![Decimal::ONE; count])
}

#[cfg(test)]
mod test_allocate {
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn money(v: Decimal) -> Money {
        Money::new(v)
    }

    #[test]
    fn three_equal_parts() {
        let parts = allocate(money(dec!(100.00)), &[dec!(1), dec!(1), dec!(1)]).unwrap();
        assert_eq!(
            parts,
            vec![money(dec!(33.33)), money(dec!(33.33)), money(dec!(33.34))]
        );
        assert_eq!(parts.iter().sum::<Money>(), money(dec!(100)));
    }

    #[test]
    fn single_part_ignores_weights() {
        assert_eq!(
            allocate(money(dec!(42.42)), &[dec!(0)]),
            Ok(vec![money(dec!(42.42))])
        );
    }

    #[test]
    fn proportional_weights() {
        let parts = allocate(money(dec!(1000)), &[dec!(500), dec!(300), dec!(200)]).unwrap();
        assert_eq!(
            parts,
            vec![money(dec!(500)), money(dec!(300)), money(dec!(200))]
        );
    }

    #[test]
    fn zero_weight_gets_nothing() {
        let parts = allocate(money(dec!(10)), &[dec!(0), dec!(1)]).unwrap();
        assert_eq!(parts, vec![Money::ZERO, money(dec!(10))]);
    }

    #[rstest]
    #[case::empty(&[], AllocationError::Empty)]
    #[case::negative(&[dec!(1), dec!(-1)], AllocationError::NegativeWeight { index: 1 })]
    #[case::all_zero(&[dec!(0), dec!(0)], AllocationError::ZeroWeights)]
    fn invalid_allocation(#[case] weights: &[Decimal], #[case] expected: AllocationError) {
        assert_eq!(allocate(money(dec!(100)), weights), Err(expected));
    }

    #[test]
    fn huge_weights_split_without_overflow() {
        let weights = [dec!(1000000000000000), dec!(1000000000000000)];
        let parts = allocate(money(dec!(1000000000000000)), &weights).unwrap();
        let half = money(dec!(500000000000000));
        assert_eq!(parts, vec![half, half]);
    }

    #[test]
    fn weight_sum_overflow_is_an_error() {
        assert_eq!(
            allocate(money(dec!(1)), &[Decimal::MAX, Decimal::MAX]),
            Err(AllocationError::Overflow)
        );
    }

    #[test]
    fn zero_total() {
        let parts = allocate_evenly(Money::ZERO, 4).unwrap();
        assert!(parts.iter().all(|p| *p == Money::ZERO));
    }

    #[test]
    fn sub_cent_shares_never_go_negative() {
        let parts = allocate_evenly(money(dec!(0.02)), 4).unwrap();
        assert_eq!(parts.iter().sum::<Money>(), money(dec!(0.02)));
        assert!(parts.iter().all(|p| *p >= Money::ZERO));
    }

    #[rstest]
    fn even_split_sums_exactly(
        #[values(dec!(0.01), dec!(1), dec!(999.99), dec!(1000), dec!(12345.67), dec!(9999999.99))]
        total: Decimal,
        #[values(1, 2, 3, 7, 11, 24)] count: usize,
    ) {
        let parts = allocate_evenly(money(total), count).unwrap();
        assert_eq!(parts.len(), count);
        assert_eq!(parts.iter().sum::<Money>(), money(total));
    }
}
