use crate::core::allocate::{AllocationError, allocate_evenly};
use crate::core::finance::Money;
use crate::core::installment::Installment;
use crate::core::interval::{distribute, distribute_with_interval};
use crate::core::policy::{DistributionPolicy, IntervalPolicy};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

/// Изменения суммы не больше этого порога считаются дрожанием
const JITTER: Decimal = Decimal::ONE;

#[derive(Debug, Error, PartialEq)]
pub enum RedistributeError {
    #[error("installment #{index} does not exist, schedule has {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// Сумма договора изменилась (скидка, доп. услуги и т.п.)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalChanged {
    pub previous: Money,
    pub current: Money,
}

impl TotalChanged {
    pub fn is_significant(&self) -> bool {
        (self.current - self.previous).abs().value() > JITTER
    }
}

/// Хранится у вызывающего: сумма, под которую построен текущий график,
/// и признак приостановки авто-пересчёта (например, сразу после загрузки
/// ручного графика из хранилища). Одно логическое изменение суммы даёт
/// ровно одно событие
#[derive(Debug, Clone, PartialEq)]
pub struct TotalTracker {
    previous: Money,
    suppressed: bool,
}

impl TotalTracker {
    pub fn new(total: Money) -> Self {
        Self {
            previous: total,
            suppressed: false,
        }
    }

    /// Трекер для графика, только что загруженного из хранилища
    pub fn loaded(total: Money) -> Self {
        Self {
            previous: total,
            suppressed: true,
        }
    }

    pub fn previous(&self) -> Money {
        self.previous
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn resume(&mut self) {
        self.suppressed = false;
    }

    /// Сообщает трекеру текущую сумму договора
    ///
    /// returns: событие, если сумма заметно изменилась и пересчёт не приостановлен
    pub fn observe(&mut self, current: Money) -> Option<TotalChanged> {
        if self.suppressed {
            self.previous = current;
            return None;
        }
        let event = TotalChanged {
            previous: self.previous,
            current,
        };
        if !event.is_significant() {
            return None;
        }
        self.previous = current;
        Some(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BelowThreshold,
    NoInstallments,
    NoStartDate,
    /// Ручной график автоматически не переписывается
    ManualDistribution,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Redistribution {
    Redistributed(Vec<Installment>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleContext<'a> {
    pub installments: &'a [Installment],
    pub start_date: Option<NaiveDate>,
    pub policy: &'a DistributionPolicy,
}

/// Единственный обработчик события `TotalChanged`: перестраивает график
/// с прежними параметрами под новую сумму
pub fn on_total_changed(event: &TotalChanged, ctx: &ScheduleContext) -> Redistribution {
    if !event.is_significant() {
        return Redistribution::Skipped(SkipReason::BelowThreshold);
    }
    if ctx.installments.is_empty() {
        return Redistribution::Skipped(SkipReason::NoInstallments);
    }
    let Some(start) = ctx.start_date else {
        warn!("нет даты начала договора, пересчёт пропущен");
        return Redistribution::Skipped(SkipReason::NoStartDate);
    };
    match distribute(event.current, start, ctx.policy) {
        Some(installments) => {
            debug!(previous = %event.previous, current = %event.current, "график пересчитан");
            Redistribution::Redistributed(installments)
        }
        None => Redistribution::Skipped(SkipReason::ManualDistribution),
    }
}

/// Удаляет платёж и раскидывает его сумму поровну на оставшиеся
///
/// Зафиксированные пользователем платежи не меняются. Погрешность уходит
/// последнему незафиксированному платежу, а если таких нет - последнему
/// платежу. В итоге оставшиеся платежи дают ровно `total`
///
/// # Arguments
///
/// * `installments`: Текущий график
/// * `removed_index`: Индекс удаляемого платежа
/// * `total`: Сумма договора
///
/// # Errors
/// `IndexOutOfRange` - такого платежа нет
///
/// returns: Result<Vec<Installment>, `RedistributeError`>
///
pub fn redistribute_after_removal(
    installments: &[Installment],
    removed_index: usize,
    total: Money,
) -> Result<Vec<Installment>, RedistributeError> {
    if removed_index >= installments.len() {
        return Err(RedistributeError::IndexOutOfRange {
            index: removed_index,
            len: installments.len(),
        });
    }

    let mut survivors = installments.to_vec();
    let removed = survivors.remove(removed_index);
    let Some(last) = survivors.len().checked_sub(1) else {
        return Ok(survivors);
    };

    let mut receivers: Vec<usize> = survivors
        .iter()
        .enumerate()
        .filter(|(_, i)| !i.pinned)
        .map(|(idx, _)| idx)
        .collect();
    if receivers.is_empty() {
        receivers.push(last);
    }

    let shares = allocate_evenly(removed.amount, receivers.len())?;
    for (idx, share) in receivers.iter().zip(shares) {
        survivors[*idx].amount += share;
    }

    let sink = receivers.last().copied().unwrap_or(last);
    let others = survivors
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != sink)
        .map(|(_, i)| i.amount)
        .sum::<Money>();
    survivors[sink].amount = total - others;

    debug!(removed = %removed.amount, left = survivors.len(), "платёж удалён");
    Ok(survivors)
}

/// Пересчёт при изменении числа платежей
pub fn redistribute_count(
    total: Money,
    start: NaiveDate,
    policy: &IntervalPolicy,
    new_count: u32,
) -> Vec<Installment> {
    distribute_with_interval(total, start, &policy.clone().with_count(new_count))
}
