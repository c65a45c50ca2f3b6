pub mod errors;
pub mod filter;
pub mod order;
pub mod ports;
