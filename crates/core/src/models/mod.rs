pub mod alert;
pub mod history;
pub mod numeric;
pub mod portfolio;
pub mod quote;
pub mod settings;
pub mod symbol;
pub mod valuation;
