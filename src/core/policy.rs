use crate::core::finance::{Money, Percentage};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("interval must be at least one month")]
    ZeroInterval,
    #[error("both count and last payment date are set")]
    AmbiguousLength,
    #[error("neither count nor last payment date is set")]
    MissingLength,
    #[error("first payment override has no value")]
    MissingFirstPayment,
    #[error("too many installments: {count}")]
    TooManyInstallments { count: u32 },
}

/// Сто лет ежемесячных платежей
pub const MAX_INSTALLMENTS: u32 = 1200;

/// # Errors
/// `TooManyInstallments` - больше `MAX_INSTALLMENTS`
pub fn checked_count(count: u32) -> Result<u32, Error> {
    if count > MAX_INSTALLMENTS {
        return Err(Error::TooManyInstallments { count });
    }
    Ok(count)
}

/// Первый платёж, рассчитанный отдельно от шага графика
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FirstPayment {
    Amount(Money),
    Percent(Percentage),
}

impl FirstPayment {
    /// Сумма первого платежа, не больше всей суммы договора
    pub fn resolve(&self, total: Money) -> Money {
        match self {
            FirstPayment::Amount(amount) => amount.clamp_to(Money::ZERO, total),
            FirstPayment::Percent(rate) => rate.apply_to(total).clamp_to(Money::ZERO, total),
        }
    }
}

/// Длина графика: либо число платежей, либо дата последнего
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleLength {
    Count(u32),
    Until(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalPolicy {
    pub first_payment: Option<FirstPayment>,
    pub interval_months: NonZeroU32,
    pub length: ScheduleLength,
    /// Первый платёж в день подписания, иначе через один интервал
    pub first_at_signing: bool,
}

impl IntervalPolicy {
    /// Ежемесячный график из `count` платежей без отдельного первого
    pub fn monthly(count: u32) -> Self {
        Self {
            first_payment: None,
            interval_months: NonZeroU32::MIN,
            length: ScheduleLength::Count(count),
            first_at_signing: true,
        }
    }

    #[must_use]
    pub fn every(mut self, months: NonZeroU32) -> Self {
        self.interval_months = months;
        self
    }

    #[must_use]
    pub fn with_first_payment(mut self, first: FirstPayment) -> Self {
        self.first_payment = Some(first);
        self
    }

    #[must_use]
    pub fn until(mut self, last_payment_date: NaiveDate) -> Self {
        self.length = ScheduleLength::Until(last_payment_date);
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.length = ScheduleLength::Count(count);
        self
    }

    #[must_use]
    pub fn first_after_interval(mut self) -> Self {
        self.first_at_signing = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistributionPolicy {
    Single,
    IntervalDriven(IntervalPolicy),
    ManualUnequal,
}

impl Display for DistributionPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionPolicy::Single => write!(f, "одним платежом"),
            DistributionPolicy::ManualUnequal => write!(f, "ручное распределение"),
            DistributionPolicy::IntervalDriven(p) => {
                write!(f, "каждые {} мес.", p.interval_months)?;
                match p.length {
                    ScheduleLength::Count(n) => write!(f, ", {n} платежей")?,
                    ScheduleLength::Until(d) => write!(f, ", до {d}")?,
                }
                match p.first_payment {
                    Some(FirstPayment::Amount(a)) => write!(f, ", первый {a}"),
                    Some(FirstPayment::Percent(r)) => write!(f, ", первый {r}"),
                    None => Ok(()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Single,
    #[default]
    Multiple,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstPaymentType {
    #[default]
    Amount,
    Percent,
}

/// Политика в том виде, в каком она хранится рядом с платежами
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDraft {
    pub mode: Mode,
    pub has_override_first_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_payment_amount: Option<Decimal>,
    pub first_payment_type: FirstPaymentType,
    pub interval_months: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<NaiveDate>,
    pub first_at_signing: bool,
}

impl Default for PolicyDraft {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            has_override_first_payment: false,
            first_payment_amount: None,
            first_payment_type: FirstPaymentType::default(),
            interval_months: 1,
            count: None,
            last_payment_date: None,
            first_at_signing: true,
        }
    }
}

impl TryFrom<PolicyDraft> for DistributionPolicy {
    type Error = Error;

    /// Проверяет черновик политики
    ///
    /// # Errors
    /// `ZeroInterval`: Интервал не может быть нулевым
    /// `AmbiguousLength`: Указаны и количество платежей, и дата последнего
    /// `MissingLength`: Не указано ни то, ни другое
    /// `MissingFirstPayment`: Первый платёж отмечен особым, но сумма не задана
    /// `TooManyInstallments`: Платежей больше `MAX_INSTALLMENTS`
    ///
    /// returns: Result<DistributionPolicy, Error>
    ///
    fn try_from(draft: PolicyDraft) -> Result<Self, Self::Error> {
        match draft.mode {
            Mode::Single => return Ok(DistributionPolicy::Single),
            Mode::Manual => return Ok(DistributionPolicy::ManualUnequal),
            Mode::Multiple => {}
        }

        let interval_months = NonZeroU32::new(draft.interval_months).ok_or(Error::ZeroInterval)?;

        let length = match (draft.count, draft.last_payment_date) {
            (Some(_), Some(_)) => return Err(Error::AmbiguousLength),
            (Some(count), None) => ScheduleLength::Count(checked_count(count)?),
            (None, Some(date)) => ScheduleLength::Until(date),
            (None, None) => return Err(Error::MissingLength),
        };

        let first_payment = if draft.has_override_first_payment {
            let value = draft.first_payment_amount.ok_or(Error::MissingFirstPayment)?;
            Some(match draft.first_payment_type {
                FirstPaymentType::Amount => FirstPayment::Amount(Money::new(value)),
                FirstPaymentType::Percent => FirstPayment::Percent(Percentage::clamped(value)),
            })
        } else {
            None
        };

        Ok(DistributionPolicy::IntervalDriven(IntervalPolicy {
            first_payment,
            interval_months,
            length,
            first_at_signing: draft.first_at_signing,
        }))
    }
}

impl From<&DistributionPolicy> for PolicyDraft {
    fn from(policy: &DistributionPolicy) -> Self {
        match policy {
            DistributionPolicy::Single => PolicyDraft {
                mode: Mode::Single,
                ..PolicyDraft::default()
            },
            DistributionPolicy::ManualUnequal => PolicyDraft {
                mode: Mode::Manual,
                ..PolicyDraft::default()
            },
            DistributionPolicy::IntervalDriven(p) => {
                let (first_payment_amount, first_payment_type) = match p.first_payment {
                    Some(FirstPayment::Amount(a)) => (Some(a.value()), FirstPaymentType::Amount),
                    Some(FirstPayment::Percent(r)) => (Some(r.value()), FirstPaymentType::Percent),
                    None => (None, FirstPaymentType::default()),
                };
                let (count, last_payment_date) = match p.length {
                    ScheduleLength::Count(n) => (Some(n), None),
                    ScheduleLength::Until(d) => (None, Some(d)),
                };
                PolicyDraft {
                    mode: Mode::Multiple,
                    has_override_first_payment: p.first_payment.is_some(),
                    first_payment_amount,
                    first_payment_type,
                    interval_months: p.interval_months.get(),
                    count,
                    last_payment_date,
                    first_at_signing: p.first_at_signing,
                }
            }
        }
    }
}

#[cfg(test)]
mod test_policy {
    use rust_decimal_macros::dec;

    use super::*;

    fn multiple() -> PolicyDraft {
        PolicyDraft {
            count: Some(5),
            ..PolicyDraft::default()
        }
    }

    #[test]
    fn absurd_count_rejected() {
        let draft = PolicyDraft {
            count: Some(4_000_000_000),
            ..PolicyDraft::default()
        };
        assert_eq!(
            DistributionPolicy::try_from(draft),
            Err(Error::TooManyInstallments {
                count: 4_000_000_000
            })
        );
        assert_eq!(checked_count(MAX_INSTALLMENTS), Ok(MAX_INSTALLMENTS));
    }

    #[test]
    fn single_ignores_other_fields() {
        let draft = PolicyDraft {
            mode: Mode::Single,
            interval_months: 0,
            ..PolicyDraft::default()
        };
        assert_eq!(DistributionPolicy::try_from(draft), Ok(DistributionPolicy::Single));
    }

    #[test]
    fn manual_mode() {
        let draft = PolicyDraft {
            mode: Mode::Manual,
            ..PolicyDraft::default()
        };
        assert_eq!(
            DistributionPolicy::try_from(draft),
            Ok(DistributionPolicy::ManualUnequal)
        );
    }

    #[test]
    fn percent_first_payment() {
        let draft = PolicyDraft {
            has_override_first_payment: true,
            first_payment_amount: Some(dec!(20)),
            first_payment_type: FirstPaymentType::Percent,
            ..multiple()
        };
        let expected = IntervalPolicy::monthly(5)
            .with_first_payment(FirstPayment::Percent(Percentage::from_int(20)));
        assert_eq!(
            DistributionPolicy::try_from(draft),
            Ok(DistributionPolicy::IntervalDriven(expected))
        );
    }

    #[test]
    fn zero_interval() {
        let draft = PolicyDraft {
            interval_months: 0,
            ..multiple()
        };
        assert_eq!(DistributionPolicy::try_from(draft), Err(Error::ZeroInterval));
    }

    #[test]
    fn length_must_be_exactly_one() {
        let both = PolicyDraft {
            last_payment_date: NaiveDate::from_ymd_opt(2025, 12, 1),
            ..multiple()
        };
        assert_eq!(DistributionPolicy::try_from(both), Err(Error::AmbiguousLength));
        assert_eq!(
            DistributionPolicy::try_from(PolicyDraft::default()),
            Err(Error::MissingLength)
        );
    }

    #[test]
    fn override_without_value() {
        let draft = PolicyDraft {
            has_override_first_payment: true,
            ..multiple()
        };
        assert_eq!(
            DistributionPolicy::try_from(draft),
            Err(Error::MissingFirstPayment)
        );
    }

    #[test]
    fn draft_round_trip() {
        let policy = DistributionPolicy::IntervalDriven(
            IntervalPolicy::monthly(0)
                .every(NonZeroU32::new(3).unwrap())
                .until(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
                .with_first_payment(FirstPayment::Amount(Money::new(dec!(5000))))
                .first_after_interval(),
        );
        let draft = PolicyDraft::from(&policy);
        assert_eq!(draft.interval_months, 3);
        assert_eq!(draft.count, None);
        assert_eq!(DistributionPolicy::try_from(draft), Ok(policy));
    }

    #[test]
    fn draft_from_yaml() {
        let yaml = "mode: multiple\ncount: 12\ninterval_months: 2\nfirst_at_signing: false\n";
        let draft: PolicyDraft = serde_yaml::from_str(yaml).unwrap();
        let policy = DistributionPolicy::try_from(draft).unwrap();
        assert_eq!(
            policy,
            DistributionPolicy::IntervalDriven(
                IntervalPolicy::monthly(12)
                    .every(NonZeroU32::new(2).unwrap())
                    .first_after_interval()
            )
        );
    }

    #[test]
    fn first_payment_is_clamped_to_total() {
        let total = Money::new(dec!(1000));
        assert_eq!(FirstPayment::Amount(Money::new(dec!(1500))).resolve(total), total);
        assert_eq!(
            FirstPayment::Percent(Percentage::ONE_HUNDRED).resolve(total),
            total
        );
        assert_eq!(
            FirstPayment::Amount(Money::new(dec!(-10))).resolve(total),
            Money::ZERO
        );
    }
}
