use crate::context::{FunctionRef, YoctoApi};
use crate::error::{Result, YoctoError};
use crate::function::Function;
use yocto_types::{Beacon, FunctionClass};

/// A physical Yoctopuce module, identified by serial number or logical name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Module(FunctionRef);

impl Function for Module {
    const CLASS: FunctionClass = FunctionClass::Module;

    fn from_ref(function: FunctionRef) -> Self {
        Module(function)
    }

    fn function_ref(&self) -> FunctionRef {
        self.0
    }
}

impl Module {
    pub(crate) fn from_serial(api: &mut YoctoApi, serial: &str) -> Module {
        <Module as Function>::find(api, serial)
    }

    pub fn get_product_name(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.0, "productName")
    }

    /// USB device identifier of the product.
    pub fn get_product_id(&self, api: &mut YoctoApi) -> Result<u16> {
        let id = api.integer_attribute(self.0, "productId")?;
        u16::try_from(id).map_err(|_| YoctoError::UnexpectedValue {
            attribute: String::from("productId"),
            value: id.to_string(),
        })
    }

    pub fn get_firmware_release(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.0, "firmwareRelease")
    }

    pub fn get_beacon(&self, api: &mut YoctoApi) -> Result<Beacon> {
        let state = api.integer_attribute(self.0, "beacon")?;
        i32::try_from(state)
            .ok()
            .and_then(Beacon::from_repr)
            .ok_or_else(|| YoctoError::UnexpectedValue {
                attribute: String::from("beacon"),
                value: state.to_string(),
            })
    }

    /// Turns the localization beacon on or off.
    pub fn set_beacon(&self, api: &mut YoctoApi, beacon: Beacon) -> Result<()> {
        api.set_attribute(self.0, "beacon", &(beacon as i32).to_string())
    }

    /// Saves the current settings (logical names, configuration) in the module's flash memory.
    pub fn save_to_flash(&self, api: &mut YoctoApi) -> Result<()> {
        api.set_attribute(self.0, "persistentSettings", "1")
    }

    /// Reloads the settings stored in flash, discarding unsaved changes.
    pub fn revert_from_flash(&self, api: &mut YoctoApi) -> Result<()> {
        api.set_attribute(self.0, "persistentSettings", "0")
    }

    /// Schedules a reboot in `seconds`.
    pub fn reboot(&self, api: &mut YoctoApi, seconds: u32) -> Result<()> {
        if seconds == 0 {
            return Err(YoctoError::InvalidArgument(String::from(
                "reboot delay must be at least one second",
            )));
        }
        api.set_attribute(self.0, "rebootCountdown", &seconds.to_string())
    }

    pub fn find_module(api: &mut YoctoApi, identifier: &str) -> Module {
        <Module as Function>::find(api, identifier)
    }

    pub fn first_module(api: &mut YoctoApi) -> Result<Option<Module>> {
        <Module as Function>::first(api)
    }

    pub fn next_module(&self, api: &mut YoctoApi) -> Result<Option<Module>> {
        Function::next(self, api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SimulatedHub;
    use serde_json::json;

    fn modules() -> (YoctoApi, SimulatedHub) {
        let hub = SimulatedHub::new("sim");
        hub.add_module("YWBRIDG1-0001", "Yocto-Bridge", 0x4d);
        hub.add_module("YHUBWLN1-0002", "YoctoHub-Wireless", 0x49);

        let mut api = YoctoApi::default();
        api.register_hub_instance(Box::new(hub.clone())).unwrap();
        (api, hub)
    }

    #[test]
    fn enumerates_modules_in_hub_order() {
        let (mut api, _) = modules();
        let first = Module::first_module(&mut api).unwrap().unwrap();
        assert_eq!(first.get_product_name(&mut api).unwrap(), "Yocto-Bridge");
        assert_eq!(first.get_product_id(&mut api).unwrap(), 0x4d);

        let second = first.next_module(&mut api).unwrap().unwrap();
        assert_eq!(second.get_serial_number(&mut api).unwrap(), "YHUBWLN1-0002");
        assert!(second.next_module(&mut api).unwrap().is_none());
    }

    #[test]
    fn logical_names_are_validated_then_written() {
        let (mut api, hub) = modules();
        let module = Module::find_module(&mut api, "YWBRIDG1-0001");

        assert!(module.set_logical_name(&mut api, "not a valid name").is_err());
        module.set_logical_name(&mut api, "bench").unwrap();
        module.save_to_flash(&mut api).unwrap();
        assert_eq!(module.get_logical_name(&mut api).unwrap(), "bench");

        // Once the device list is refreshed, the new name resolves too.
        api.update_device_list().unwrap();
        let renamed = Module::find_module(&mut api, "bench");
        assert!(renamed.is_online(&mut api));
        assert_eq!(
            hub.attribute("YWBRIDG1-0001", "module", "persistentSettings"),
            Some(json!(1))
        );
    }

    #[test]
    fn beacon_and_reboot() {
        let (mut api, hub) = modules();
        let module = Module::find_module(&mut api, "YHUBWLN1-0002");
        assert_eq!(module.get_beacon(&mut api).unwrap(), Beacon::Off);
        module.set_beacon(&mut api, Beacon::On).unwrap();
        assert_eq!(module.get_beacon(&mut api).unwrap(), Beacon::On);

        assert!(module.reboot(&mut api, 0).is_err());
        module.reboot(&mut api, 2).unwrap();
        assert_eq!(
            hub.attribute("YHUBWLN1-0002", "module", "rebootCountdown"),
            Some(json!(2))
        );
    }
}
