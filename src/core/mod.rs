pub mod allocate;
pub mod finance;
pub mod installment;
pub mod interval;
pub mod manual;
pub mod policy;
pub mod reconcile;
pub mod redistribute;
