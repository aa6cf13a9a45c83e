pub mod base;
pub mod http;
pub mod simulated;

pub use base::{split_hardware_id, FunctionInfo, Hub, HubInventory, HubNotification, ModuleInfo};
pub use http::HttpHub;
pub use simulated::SimulatedHub;
