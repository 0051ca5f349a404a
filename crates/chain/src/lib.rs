pub mod client;
pub mod scanner;
pub mod source;

pub use client::NodeClient;
pub use scanner::ChainScanner;
pub use source::{ChainSource, RpcChainSource, TxRef};
