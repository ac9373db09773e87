pub mod comtrade;

pub use comtrade::{ComtradeClient, ComtradeConfig};
