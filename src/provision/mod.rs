mod phase;
mod record;

pub use phase::Phase;
pub use record::{ProvisionRecord, ProvisionRun};
