pub mod config;
pub mod decoder;
pub mod detection;
pub mod filter;
pub mod matcher;
pub mod message;
pub mod milter;
pub mod mime;
pub mod search;

pub use config::Config;
pub use filter::{HitPolicy, ScanOrchestrator, ScanResult};
pub use message::{MessageNode, PartPath, TransferEncoding};
pub use milter::Milter;
