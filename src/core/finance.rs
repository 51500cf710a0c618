use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt::{Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("value is not a finite number")]
    NotFinite,
    #[error("cant parse amount: {0}")]
    CantParse(String),
}

/// Округление до копеек, половина - от нуля
pub fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Default)]
#[derive(Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);
    pub const ONE_HUNDRED: Percentage = Percentage(Decimal::ONE_HUNDRED);

    /// Процент, зажатый в границы 0..=100
    pub fn clamped(v: Decimal) -> Self {
        Self(v.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    pub fn from_int(d: i64) -> Self {
        Percentage::clamped(Decimal::new(d, 0))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Доля от суммы, округлённая до копеек
    pub fn apply_to(&self, total: Money) -> Money {
        Money::new(total.value() * self.0 / dec!(100))
    }
}

impl From<Decimal> for Percentage {
    fn from(v: Decimal) -> Self {
        Percentage::clamped(v)
    }
}

impl From<Percentage> for Decimal {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

impl FromStr for Percentage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().trim_end_matches('%').trim();
        Decimal::from_str(raw)
            .map(Percentage::clamped)
            .map_err(|_| Error::CantParse(s.to_string()))
    }
}

/// Сумма в единой абстрактной валюте, всегда с точностью до копейки
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Copy, Clone, Default)]
#[derive(Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(round2(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Граница с нетипизированными вызывающими: NaN и бесконечности отвергаются
    ///
    /// # Errors
    /// `NotFinite` - значение не является конечным числом
    pub fn try_from_f64(v: f64) -> Result<Self, Error> {
        if !v.is_finite() {
            return Err(Error::NotFinite);
        }
        Decimal::from_f64(v).map(Self::new).ok_or(Error::NotFinite)
    }

    pub fn clamp_to(self, min: Money, max: Money) -> Self {
        if max < min {
            return min;
        }
        Ord::clamp(self, min, max)
    }
}

impl From<Decimal> for Money {
    fn from(v: Decimal) -> Self {
        Money::new(v)
    }
}

impl From<Money> for Decimal {
    fn from(m: Money) -> Self {
        m.0
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: String = s.trim().chars().filter(|c| *c != '_' && *c != ' ').collect();
        Decimal::from_str(&raw)
            .map(Money::new)
            .map_err(|_| Error::CantParse(s.to_string()))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

#[cfg(test)]
mod percentage {
    use rust_decimal_macros::dec;

    use crate::core::finance::{Money, Percentage};

    #[test]
    fn clamped() {
        assert_eq!(Percentage::clamped(dec!(150)), Percentage::ONE_HUNDRED);
        assert_eq!(Percentage::clamped(dec!(-5)), Percentage::ZERO);
        assert_eq!(Percentage::clamped(dec!(12.5)).value(), dec!(12.5));
    }

    #[test]
    fn apply_to() {
        assert_eq!(
            Percentage::from_int(20).apply_to(Money::new(dec!(12000))),
            Money::new(dec!(2400))
        );
        assert_eq!(
            Percentage::from_int(1).apply_to(Money::new(dec!(1))),
            Money::new(dec!(0.01))
        );
        assert_eq!(
            Percentage::from_int(33).apply_to(Money::new(dec!(0.5))),
            Money::new(dec!(0.17))
        );
    }

    #[test]
    fn from_str() {
        assert_eq!("20%".parse::<Percentage>(), Ok(Percentage::from_int(20)));
        assert_eq!("120".parse::<Percentage>(), Ok(Percentage::ONE_HUNDRED));
        assert!("двадцать".parse::<Percentage>().is_err());
    }
}

#[cfg(test)]
mod money {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use crate::core::finance::{Error, Money, round2};

    #[rstest]
    #[case(dec!(0.005), dec!(0.01))]
    #[case(dec!(0.004), dec!(0.00))]
    #[case(dec!(333.335), dec!(333.34))]
    #[case(dec!(1920), dec!(1920))]
    fn rounds_to_cents(#[case] raw: rust_decimal::Decimal, #[case] expected: rust_decimal::Decimal) {
        assert_eq!(round2(raw), expected);
        assert_eq!(Money::new(raw).value(), expected);
    }

    #[test]
    fn rejects_non_finite() {
        assert_eq!(Money::try_from_f64(f64::NAN), Err(Error::NotFinite));
        assert_eq!(Money::try_from_f64(f64::INFINITY), Err(Error::NotFinite));
        assert_eq!(Money::try_from_f64(100.0), Ok(Money::new(dec!(100))));
    }

    #[test]
    fn parses_and_displays() {
        let m: Money = "12_000.5".parse().unwrap();
        assert_eq!(m, Money::new(dec!(12000.50)));
        assert_eq!(m.to_string(), "12000.50");
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn clamp_to() {
        let total = Money::new(dec!(100));
        assert_eq!(Money::new(dec!(150)).clamp_to(Money::ZERO, total), total);
        assert_eq!(Money::new(dec!(-1)).clamp_to(Money::ZERO, total), Money::ZERO);
        assert_eq!(Money::new(dec!(40)).clamp_to(Money::ZERO, total), Money::new(dec!(40)));
    }

    #[test]
    fn sums() {
        let items = [Money::new(dec!(0.1)), Money::new(dec!(0.2))];
        assert_eq!(items.iter().sum::<Money>(), Money::new(dec!(0.3)));
    }
}
