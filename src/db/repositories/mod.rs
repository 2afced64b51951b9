pub mod readings;
pub mod risk_records;
