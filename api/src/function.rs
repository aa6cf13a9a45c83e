use crate::context::{check_logical_name, FunctionRef, YoctoApi};
use crate::error::{Result, YoctoError};
use yocto_types::FunctionClass;

/// Operations shared by every function object. Implementors only need to say which class they
/// are and how to wrap a table slot, everything else is provided.
///
/// Handles are small `Copy` values pointing into the API's function table, so every operation
/// takes the [`YoctoApi`] it was obtained from.
pub trait Function: Copy + Sized + 'static {
    const CLASS: FunctionClass;

    fn from_ref(function: FunctionRef) -> Self;
    fn function_ref(&self) -> FunctionRef;

    /// Retrieves a function object for an identifier, in any of the forms `FunctionLogicalName`,
    /// `Serial.FunctionId`, `Serial.FunctionLogicalName`, `ModuleLogicalName.FunctionId` or
    /// `ModuleLogicalName.FunctionLogicalName`.
    ///
    /// The function doesn't need to be online, use [`Function::is_online`] to find out. Asking
    /// twice for the same identifier returns the same object.
    fn find(api: &mut YoctoApi, identifier: &str) -> Self {
        Self::from_ref(api.find_function(Self::CLASS, identifier))
    }

    /// Starts an enumeration of the functions of this class currently reachable.
    fn first(api: &mut YoctoApi) -> Result<Option<Self>> {
        Ok(api.first_function(Self::CLASS)?.map(Self::from_ref))
    }

    /// Continues an enumeration started with [`Function::first`].
    fn next(&self, api: &mut YoctoApi) -> Result<Option<Self>> {
        Ok(api.next_function(self.function_ref())?.map(Self::from_ref))
    }

    fn is_online(&self, api: &mut YoctoApi) -> bool {
        api.is_online(self.function_ref())
    }

    /// Reloads the attribute cache from the device, whatever its age.
    fn load(&self, api: &mut YoctoApi) -> Result<()> {
        api.load(self.function_ref())
    }

    fn get_logical_name(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.function_ref(), "logicalName")
    }

    /// Changes the logical name. Call `save_to_flash` on the module to keep it across reboots.
    fn set_logical_name(&self, api: &mut YoctoApi, name: &str) -> Result<()> {
        if !check_logical_name(name) {
            return Err(YoctoError::InvalidArgument(format!("Invalid name: {}", name)));
        }
        api.set_attribute(self.function_ref(), "logicalName", name)
    }

    /// The short value the function advertises to its hub (6 characters at most).
    fn get_advertised_value(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.function_ref(), "advertisedValue")
    }

    fn get_hardware_id(&self, api: &mut YoctoApi) -> Result<String> {
        Ok(api.resolve(self.function_ref())?.hardware_id())
    }

    fn get_function_id(&self, api: &mut YoctoApi) -> Result<String> {
        Ok(api.resolve(self.function_ref())?.function_id)
    }

    fn get_serial_number(&self, api: &mut YoctoApi) -> Result<String> {
        Ok(api.resolve(self.function_ref())?.serial_number)
    }

    /// A short human readable description, such as `WeighScale(kitchen)=YWBRIDG1-1234.weighScale1`.
    fn describe(&self, api: &mut YoctoApi) -> String {
        let function = self.function_ref();
        let identifier = api
            .identifier_of(function)
            .map(String::from)
            .unwrap_or_default();
        let resolved = match api.resolve(function) {
            Ok(resolved) => resolved.hardware_id(),
            Err(_) => String::from("unresolved"),
        };
        format!("{}({})={}", Self::CLASS, identifier, resolved)
    }

    /// Registers a callback run on every change of advertised value. The callback only ever
    /// runs from [`YoctoApi::handle_events`] or [`YoctoApi::sleep`], and gets the current value
    /// once right after registration when the function is online.
    fn register_value_callback<F>(&self, api: &mut YoctoApi, mut callback: F)
    where
        F: FnMut(&mut YoctoApi, Self, &str) + 'static,
    {
        api.set_value_callback(
            self.function_ref(),
            Some(Box::new(move |api, function, value| {
                callback(api, Self::from_ref(function), value)
            })),
        );
    }

    fn unregister_value_callback(&self, api: &mut YoctoApi) {
        api.set_value_callback(self.function_ref(), None);
    }
}
