pub mod manager;
pub mod selector;

pub use manager::{InstanceManager, InstanceStatus, RuntimeState};
pub use selector::select_account;
