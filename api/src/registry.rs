// Keeps the hubs, and the merged inventory of what they can reach, and answers the question
// "which physical function does this identifier point at?".
use crate::error::{Result, YoctoError};
use crate::hub::{FunctionInfo, Hub, ModuleInfo};
use log::{debug, warn};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use yocto_types::FunctionClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedFunction {
    pub hub: usize,
    pub serial_number: String,
    pub function_id: String,
}

impl ResolvedFunction {
    pub fn hardware_id(&self) -> String {
        format!("{}.{}", self.serial_number, self.function_id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct DeviceListChanges {
    pub arrived: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Default)]
pub(crate) struct DeviceRegistry {
    hubs: Vec<Box<dyn Hub>>,
    modules: Vec<(usize, ModuleInfo)>,
    functions: Vec<(usize, FunctionInfo)>,
    refreshed_at: Option<Instant>,
}

impl DeviceRegistry {
    pub fn has_hubs(&self) -> bool {
        !self.hubs.is_empty()
    }

    pub fn has_hub(&self, url: &str) -> bool {
        self.hubs.iter().any(|hub| hub.url() == url)
    }

    pub fn add_hub(&mut self, hub: Box<dyn Hub>) {
        self.hubs.push(hub);
        self.refreshed_at = None;
    }

    pub fn remove_hub(&mut self, url: &str) -> bool {
        let Some(index) = self.hubs.iter().position(|hub| hub.url() == url) else {
            return false;
        };
        self.hubs.remove(index);

        // The hub's modules are kept until the next refresh, so they get reported as removed.
        self.functions.retain(|(hub, _)| *hub != index);
        for (hub, _) in &mut self.functions {
            if *hub > index {
                *hub -= 1;
            }
        }
        for (hub, _) in &mut self.modules {
            if *hub > index {
                *hub -= 1;
            }
        }
        self.refreshed_at = None;
        true
    }

    pub fn clear(&mut self) {
        self.hubs.clear();
        self.modules.clear();
        self.functions.clear();
        self.refreshed_at = None;
    }

    pub fn hub_mut(&mut self, index: usize) -> Result<&mut Box<dyn Hub>> {
        self.hubs
            .get_mut(index)
            .ok_or_else(|| YoctoError::DeviceNotFound(String::from("hub no longer registered")))
    }

    pub fn hubs_mut(&mut self) -> impl Iterator<Item = (usize, &mut Box<dyn Hub>)> {
        self.hubs.iter_mut().enumerate()
    }

    pub fn is_stale(&self, validity: Duration) -> bool {
        self.refreshed_at
            .is_none_or(|refreshed| refreshed.elapsed() >= validity)
    }

    /// Asks every hub for its inventory. A hub that fails to answer is logged and contributes
    /// nothing, so its devices show up as removed.
    pub fn refresh(&mut self) -> DeviceListChanges {
        let previous: HashSet<String> = self
            .modules
            .iter()
            .map(|(_, module)| module.serial_number.clone())
            .collect();

        let mut modules = Vec::new();
        let mut functions = Vec::new();
        for (index, hub) in self.hubs.iter_mut().enumerate() {
            match hub.inventory() {
                Ok(inventory) => {
                    debug!(
                        "Hub {} lists {} modules, {} functions",
                        hub.url(),
                        inventory.modules.len(),
                        inventory.functions.len()
                    );
                    modules.extend(inventory.modules.into_iter().map(|m| (index, m)));
                    functions.extend(inventory.functions.into_iter().map(|f| (index, f)));
                }
                Err(e) => warn!("Unable to refresh device list from {}: {}", hub.url(), e),
            }
        }

        let current: HashSet<String> = modules
            .iter()
            .map(|(_, module): &(usize, ModuleInfo)| module.serial_number.clone())
            .collect();

        let changes = DeviceListChanges {
            arrived: modules
                .iter()
                .map(|(_, module)| module.serial_number.clone())
                .filter(|serial| !previous.contains(serial))
                .collect(),
            removed: self
                .modules
                .iter()
                .map(|(_, module)| module.serial_number.clone())
                .filter(|serial| !current.contains(serial))
                .collect(),
        };

        self.modules = modules;
        self.functions = functions;
        self.refreshed_at = Some(Instant::now());
        changes
    }

    pub fn module(&self, serial: &str) -> Option<&ModuleInfo> {
        self.modules
            .iter()
            .map(|(_, module)| module)
            .find(|module| module.serial_number == serial)
    }

    pub fn functions_of(&self, class: FunctionClass) -> impl Iterator<Item = &FunctionInfo> {
        self.functions
            .iter()
            .map(|(_, function)| function)
            .filter(move |function| function.class == class)
    }

    pub fn set_advertised_value(&mut self, serial: &str, function_id: &str, value: &str) {
        if let Some((_, function)) = self
            .functions
            .iter_mut()
            .find(|(_, f)| f.serial_number == serial && f.function_id == function_id)
        {
            function.advertised_value = value.to_string();
        }
    }

    /// Resolves an identifier to a single function of the given class.
    ///
    /// Accepted forms are `FunctionLogicalName`, `Serial.FunctionId`, `Serial.FunctionLogicalName`,
    /// `ModuleLogicalName.FunctionId` and `ModuleLogicalName.FunctionLogicalName`. Hardware
    /// names are tried before logical names, and the first match wins. Modules are identified
    /// by serial number or module logical name.
    pub fn resolve(&self, class: FunctionClass, identifier: &str) -> Option<ResolvedFunction> {
        if identifier.is_empty() {
            return None;
        }
        let candidates = || {
            self.functions
                .iter()
                .filter(move |(_, function)| function.class == class)
        };

        let found = if class == FunctionClass::Module {
            let name = identifier.strip_suffix(".module").unwrap_or(identifier);
            candidates()
                .find(|(_, f)| f.serial_number == name)
                .or_else(|| candidates().find(|(_, f)| f.logical_name == name))
        } else if let Some((device, function)) = identifier.split_once('.') {
            if function.is_empty() {
                return None;
            }
            let module_logical = |serial: &str| {
                self.module(serial)
                    .is_some_and(|module| !device.is_empty() && module.logical_name == device)
            };

            candidates()
                .find(|(_, f)| f.serial_number == device && f.function_id == function)
                .or_else(|| {
                    candidates()
                        .find(|(_, f)| f.serial_number == device && f.logical_name == function)
                })
                .or_else(|| {
                    candidates().find(|(_, f)| {
                        module_logical(&f.serial_number) && f.function_id == function
                    })
                })
                .or_else(|| {
                    candidates().find(|(_, f)| {
                        module_logical(&f.serial_number) && f.logical_name == function
                    })
                })
        } else {
            candidates().find(|(_, f)| f.logical_name == identifier)
        };

        found.map(|(hub, function)| ResolvedFunction {
            hub: *hub,
            serial_number: function.serial_number.clone(),
            function_id: function.function_id.clone(),
        })
    }
}
