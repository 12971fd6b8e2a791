pub mod ledger_mem;
pub mod orchestrator;
pub mod reaper;
pub mod relay_mem;

pub use ledger_mem::MemoryLedger;
pub use orchestrator::{BookingOrchestrator, BookingRequest, Disposition};
pub use reaper::Reaper;
pub use relay_mem::{MemoryRelay, RelayedMessage};
