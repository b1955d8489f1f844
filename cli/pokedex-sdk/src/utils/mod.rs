pub mod errors;
pub mod single_flight;
