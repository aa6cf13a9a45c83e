use crate::error::Result;
use crate::sensor::Measure;
use serde_json::{Map, Value};
use yocto_types::FunctionClass;

/// The transport behind a [`crate::YoctoApi`]. A hub lists the modules it can reach, and
/// brokers attribute reads, attribute writes and file downloads for them.
///
/// Hubs are only ever driven from the thread owning the API context, and only from inside an
/// API call, so implementations don't need any locking.
pub trait Hub {
    /// The address this hub was registered with.
    fn url(&self) -> &str;

    /// Lists every module currently reachable through this hub, and their functions.
    fn inventory(&mut self) -> Result<HubInventory>;

    /// Reads the full attribute set of a single function.
    fn load_function(&mut self, serial: &str, function_id: &str) -> Result<Map<String, Value>>;

    fn set_attribute(
        &mut self,
        serial: &str,
        function_id: &str,
        attribute: &str,
        value: &str,
    ) -> Result<()>;

    /// Fetches a file from the module's file space, `path` may carry a query string.
    fn download(&mut self, serial: &str, path: &str) -> Result<Vec<u8>>;

    /// Drains the value changes and timed reports noticed since the last call.
    fn poll_notifications(&mut self) -> Result<Vec<HubNotification>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubInventory {
    pub modules: Vec<ModuleInfo>,
    pub functions: Vec<FunctionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub serial_number: String,
    pub logical_name: String,
    pub product_name: String,
    pub product_id: u16,
    pub beacon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub class: FunctionClass,
    pub serial_number: String,
    pub function_id: String,
    pub logical_name: String,
    pub advertised_value: String,
}

impl FunctionInfo {
    pub fn hardware_id(&self) -> String {
        format!("{}.{}", self.serial_number, self.function_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubNotification {
    ValueChanged {
        serial_number: String,
        function_id: String,
        value: String,
    },
    TimedReport {
        serial_number: String,
        function_id: String,
        measure: Measure,
    },
}

/// Splits a hardware id ("SERIAL.functionId") into its two halves.
pub fn split_hardware_id(hardware_id: &str) -> Option<(&str, &str)> {
    let (serial, function_id) = hardware_id.split_once('.')?;
    if serial.is_empty() || function_id.is_empty() {
        return None;
    }
    Some((serial, function_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_ids_split_on_first_dot() {
        assert_eq!(
            split_hardware_id("YWBRIDG1-1234.weighScale1"),
            Some(("YWBRIDG1-1234", "weighScale1"))
        );
        assert_eq!(split_hardware_id("nodot"), None);
        assert_eq!(split_hardware_id(".weighScale1"), None);
    }
}
