use crate::core::finance::Money;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use std::fmt::{Debug, Display, Formatter};

/// Тип платежа. Словарь открытый: пользователь может завести любой ярлык,
/// на суммы и даты он не влияет
#[derive(PartialEq, Eq, Hash, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentType(String);

impl PaymentType {
    pub const ON_SIGNING: &'static str = "on signing";
    pub const MONTHLY: &'static str = "monthly";
    pub const INSTALLMENT: &'static str = "installment";
    pub const END_OF_CONTRACT: &'static str = "end of contract";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn on_signing() -> Self {
        Self::new(Self::ON_SIGNING)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PaymentType {
    fn default() -> Self {
        Self::new(Self::INSTALLMENT)
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Платёж по договору
#[derive(PartialEq, Clone, Serialize, Deserialize)]
pub struct Installment {
    pub amount: Money,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payment_type: PaymentType,
    /// Сумма зафиксирована пользователем и не пересчитывается
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
}

impl Debug for Installment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installment")
            .field("amount", &self.amount.to_string())
            .field("due_date", &self.due_date)
            .field("payment_type", &self.payment_type.as_str())
            .field("pinned", &self.pinned)
            .finish()
    }
}

impl Display for Installment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:>14} {}", self.due_date, self.amount, self.payment_type)?;
        if self.pinned {
            write!(f, " 📌")?;
        }
        if !self.description.is_empty() {
            write!(f, " - {}", self.description)?;
        }
        Ok(())
    }
}

impl Installment {
    #[must_use]
    pub fn new(amount: Money, due_date: NaiveDate, payment_type: PaymentType) -> Self {
        Self {
            amount,
            due_date,
            description: String::new(),
            payment_type,
            pinned: false,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// Всё, у чего есть сумма: и готовые платежи, и черновые ручные строки
pub trait Amounted {
    fn amount(&self) -> Money;
    fn set_amount(&mut self, amount: Money);
}

impl Amounted for Installment {
    fn amount(&self) -> Money {
        self.amount
    }

    fn set_amount(&mut self, amount: Money) {
        self.amount = amount;
    }
}

pub fn total_of<T: Amounted>(items: &[T]) -> Money {
    items.iter().map(Amounted::amount).sum()
}
