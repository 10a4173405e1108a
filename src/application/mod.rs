pub mod evaluation;
pub mod ope;
pub mod regression;
pub mod reporting;
pub mod simulator;
