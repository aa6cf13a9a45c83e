// An in-memory hub. It holds a set of virtual modules whose functions answer with whatever
// attributes they were given, acknowledges every write straight away, and lets the owner push
// value changes. Cloning the hub gives another handle onto the same state, so a test (or the
// demo's --simulate mode) can keep driving the devices after the hub was handed to the API.
use crate::codec::attribute_from_text;
use crate::error::{Result, YoctoError};
use crate::hub::base::{FunctionInfo, Hub, HubInventory, HubNotification, ModuleInfo};
use crate::sensor::Measure;
use log::debug;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use yocto_types::FunctionClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeWrite {
    pub serial_number: String,
    pub function_id: String,
    pub attribute: String,
    pub value: String,
}

#[derive(Debug)]
struct SimulatedFunction {
    class: FunctionClass,
    function_id: String,
    attributes: Map<String, Value>,
}

#[derive(Debug)]
struct SimulatedModule {
    serial_number: String,
    product_name: String,
    product_id: u16,
    functions: Vec<SimulatedFunction>,
    files: HashMap<String, Vec<u8>>,
}

impl SimulatedModule {
    fn function_mut(&mut self, function_id: &str) -> Option<&mut SimulatedFunction> {
        self.functions
            .iter_mut()
            .find(|function| function.function_id == function_id)
    }

    fn module_attributes(&self) -> Option<&Map<String, Value>> {
        self.functions
            .iter()
            .find(|function| function.class == FunctionClass::Module)
            .map(|function| &function.attributes)
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    modules: Vec<SimulatedModule>,
    notifications: VecDeque<HubNotification>,
    writes: Vec<AttributeWrite>,
    reachable: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedHub {
    url: String,
    state: Rc<RefCell<SimulatedState>>,
}

impl SimulatedHub {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: Rc::new(RefCell::new(SimulatedState {
                reachable: true,
                ..Default::default()
            })),
        }
    }

    /// Plugs a module in. Its 'module' function is created from the given details.
    pub fn add_module(&self, serial: &str, product_name: &str, product_id: u16) {
        let mut attributes = Map::new();
        attributes.insert("productName".into(), Value::from(product_name));
        attributes.insert("serialNumber".into(), Value::from(serial));
        attributes.insert("logicalName".into(), Value::from(""));
        attributes.insert("productId".into(), Value::from(product_id));
        attributes.insert("productRelease".into(), Value::from(1));
        attributes.insert("firmwareRelease".into(), Value::from("30000"));
        attributes.insert("persistentSettings".into(), Value::from(0));
        attributes.insert("beacon".into(), Value::from(0));
        attributes.insert("rebootCountdown".into(), Value::from(0));

        let mut state = self.state.borrow_mut();
        state
            .modules
            .retain(|module| module.serial_number != serial);
        state.modules.push(SimulatedModule {
            serial_number: serial.to_string(),
            product_name: product_name.to_string(),
            product_id,
            functions: vec![SimulatedFunction {
                class: FunctionClass::Module,
                function_id: String::from("module"),
                attributes,
            }],
            files: HashMap::new(),
        });
    }

    /// Unplugs a module, along with all of its functions.
    pub fn remove_module(&self, serial: &str) {
        self.state
            .borrow_mut()
            .modules
            .retain(|module| module.serial_number != serial);
    }

    /// Adds a function to a module. `attributes` must be a JSON object, as the device would
    /// report it (decimals in 16.16 fixed point).
    pub fn add_function(
        &self,
        serial: &str,
        class: FunctionClass,
        function_id: &str,
        attributes: Value,
    ) -> Result<()> {
        let Value::Object(mut attributes) = attributes else {
            return Err(YoctoError::InvalidArgument(String::from(
                "function attributes must be a JSON object",
            )));
        };
        attributes
            .entry("logicalName")
            .or_insert_with(|| Value::from(""));
        attributes
            .entry("advertisedValue")
            .or_insert_with(|| Value::from(""));

        let mut state = self.state.borrow_mut();
        let module = find_module(&mut state, serial)?;
        module
            .functions
            .retain(|function| function.function_id != function_id);
        module.functions.push(SimulatedFunction {
            class,
            function_id: function_id.to_string(),
            attributes,
        });
        Ok(())
    }

    /// Stores a file served by [`Hub::download`], `path` includes any query string.
    pub fn set_file(&self, serial: &str, path: &str, content: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        find_module(&mut state, serial)?
            .files
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    /// Changes a function's advertised value, and queues the matching notification.
    pub fn push_value(&self, serial: &str, function_id: &str, value: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let function = find_function(&mut state, serial, function_id)?;
        function
            .attributes
            .insert("advertisedValue".into(), Value::from(value));
        state.notifications.push_back(HubNotification::ValueChanged {
            serial_number: serial.to_string(),
            function_id: function_id.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Queues a timed report for a sensor function.
    pub fn push_timed_report(
        &self,
        serial: &str,
        function_id: &str,
        measure: Measure,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        find_function(&mut state, serial, function_id)?;
        state.notifications.push_back(HubNotification::TimedReport {
            serial_number: serial.to_string(),
            function_id: function_id.to_string(),
            measure,
        });
        Ok(())
    }

    /// Changes a single attribute behind the API's back, as the device itself would.
    pub fn update_attribute(
        &self,
        serial: &str,
        function_id: &str,
        attribute: &str,
        value: Value,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        find_function(&mut state, serial, function_id)?
            .attributes
            .insert(attribute.to_string(), value);
        Ok(())
    }

    pub fn attribute(&self, serial: &str, function_id: &str, attribute: &str) -> Option<Value> {
        let mut state = self.state.borrow_mut();
        let function = find_function(&mut state, serial, function_id).ok()?;
        function.attributes.get(attribute).cloned()
    }

    /// Every write received so far, oldest first.
    pub fn writes(&self) -> Vec<AttributeWrite> {
        self.state.borrow().writes.clone()
    }

    /// Makes the whole hub unreachable (or reachable again), as if the link went down.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.borrow_mut().reachable = reachable;
    }

    fn ensure_reachable(&self) -> Result<()> {
        match self.state.borrow().reachable {
            true => Ok(()),
            false => Err(YoctoError::IoError(format!("hub {} is not reachable", self.url))),
        }
    }
}

fn find_module<'a>(state: &'a mut SimulatedState, serial: &str) -> Result<&'a mut SimulatedModule> {
    state
        .modules
        .iter_mut()
        .find(|module| module.serial_number == serial)
        .ok_or_else(|| YoctoError::DeviceNotFound(serial.to_string()))
}

fn find_function<'a>(
    state: &'a mut SimulatedState,
    serial: &str,
    function_id: &str,
) -> Result<&'a mut SimulatedFunction> {
    find_module(state, serial)?
        .function_mut(function_id)
        .ok_or_else(|| YoctoError::DeviceNotFound(format!("{}.{}", serial, function_id)))
}

// Weigh scales keep their thermal compensation tables in 'extra' pages, which are edited
// through the command attribute: "<t>Z" clears table t, "<t>m<temp>:<comp>" appends a point.
fn apply_table_command(module: &mut SimulatedModule, function_id: &str, command: &str) {
    let index: u32 = function_id
        .trim_start_matches(FunctionClass::WeighScale.base_function_id())
        .parse()
        .unwrap_or(0);

    let Some(table) = command.chars().next().and_then(|c| c.to_digit(10)) else {
        return;
    };
    let page = format!("extra.json?page={}", 4 * index + table);
    let rest = &command[1..];

    let mut values: Vec<Value> = module
        .files
        .get(&page)
        .and_then(|content| serde_json::from_slice(content).ok())
        .unwrap_or_default();

    if rest == "Z" {
        values.clear();
    } else if let Some(point) = rest.strip_prefix('m') {
        let Some((temperature, compensation)) = point.split_once(':') else {
            return;
        };
        values.push(Value::from(temperature));
        values.push(Value::from(compensation));
    } else {
        return;
    }

    if let Ok(content) = serde_json::to_vec(&values) {
        module.files.insert(page, content);
    }
}

impl Hub for SimulatedHub {
    fn url(&self) -> &str {
        &self.url
    }

    fn inventory(&mut self) -> Result<HubInventory> {
        self.ensure_reachable()?;
        let state = self.state.borrow();
        let mut inventory = HubInventory::default();

        for module in &state.modules {
            let attributes = module.module_attributes();
            let text = |name: &str| {
                attributes
                    .and_then(|a| a.get(name))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            inventory.modules.push(ModuleInfo {
                serial_number: module.serial_number.clone(),
                logical_name: text("logicalName"),
                product_name: module.product_name.clone(),
                product_id: module.product_id,
                beacon: attributes
                    .and_then(|a| a.get("beacon"))
                    .and_then(Value::as_i64)
                    .is_some_and(|beacon| beacon != 0),
            });

            for function in &module.functions {
                let text = |name: &str| {
                    function
                        .attributes
                        .get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                inventory.functions.push(FunctionInfo {
                    class: function.class,
                    serial_number: module.serial_number.clone(),
                    function_id: function.function_id.clone(),
                    logical_name: text("logicalName"),
                    advertised_value: text("advertisedValue"),
                });
            }
        }

        Ok(inventory)
    }

    fn load_function(&mut self, serial: &str, function_id: &str) -> Result<Map<String, Value>> {
        self.ensure_reachable()?;
        let mut state = self.state.borrow_mut();
        Ok(find_function(&mut state, serial, function_id)?
            .attributes
            .clone())
    }

    fn set_attribute(
        &mut self,
        serial: &str,
        function_id: &str,
        attribute: &str,
        value: &str,
    ) -> Result<()> {
        self.ensure_reachable()?;
        debug!("Simulated write {}.{}.{} = {}", serial, function_id, attribute, value);

        let mut state = self.state.borrow_mut();
        let module = find_module(&mut state, serial)?;
        let function = module
            .function_mut(function_id)
            .ok_or_else(|| YoctoError::DeviceNotFound(format!("{}.{}", serial, function_id)))?;

        // Text attributes stay text, even when the new value looks like a number.
        let typed = match function.attributes.get(attribute) {
            Some(Value::String(_)) => Value::from(value),
            _ => attribute_from_text(value),
        };
        function.attributes.insert(attribute.to_string(), typed);
        let class = function.class;

        if class == FunctionClass::WeighScale && attribute == "command" {
            apply_table_command(module, function_id, value);
        }

        state.writes.push(AttributeWrite {
            serial_number: serial.to_string(),
            function_id: function_id.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn download(&mut self, serial: &str, path: &str) -> Result<Vec<u8>> {
        self.ensure_reachable()?;
        let mut state = self.state.borrow_mut();
        find_module(&mut state, serial)?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| YoctoError::FileNotFound(format!("{}/{}", serial, path)))
    }

    fn poll_notifications(&mut self) -> Result<Vec<HubNotification>> {
        self.ensure_reachable()?;
        Ok(self.state.borrow_mut().notifications.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bridge() -> SimulatedHub {
        let hub = SimulatedHub::new("sim");
        hub.add_module("YWBRIDG1-1234", "Yocto-Bridge", 0x4d);
        hub.add_function(
            "YWBRIDG1-1234",
            FunctionClass::WeighScale,
            "weighScale1",
            json!({"unit": "g", "excitation": 0}),
        )
        .unwrap();
        hub
    }

    #[test]
    fn inventory_lists_module_and_functions() {
        let mut hub = bridge();
        let inventory = hub.inventory().unwrap();
        assert_eq!(inventory.modules.len(), 1);
        assert_eq!(inventory.modules[0].product_name, "Yocto-Bridge");

        let classes: Vec<FunctionClass> = inventory.functions.iter().map(|f| f.class).collect();
        assert_eq!(classes, vec![FunctionClass::Module, FunctionClass::WeighScale]);
    }

    #[test]
    fn writes_are_acknowledged_and_logged() {
        let mut hub = bridge();
        hub.set_attribute("YWBRIDG1-1234", "weighScale1", "excitation", "2")
            .unwrap();

        let attributes = hub.load_function("YWBRIDG1-1234", "weighScale1").unwrap();
        assert_eq!(attributes["excitation"], json!(2));
        assert_eq!(hub.writes().len(), 1);
        assert_eq!(hub.writes()[0].value, "2");
    }

    #[test]
    fn table_commands_fill_extra_pages() {
        let mut hub = bridge();
        for command in ["1Z", "1m-10000:500", "1m25000:0"] {
            hub.set_attribute("YWBRIDG1-1234", "weighScale1", "command", command)
                .unwrap();
        }
        let page = hub.download("YWBRIDG1-1234", "extra.json?page=5").unwrap();
        let values: Vec<String> = serde_json::from_slice(&page).unwrap();
        assert_eq!(values, vec!["-10000", "500", "25000", "0"]);
    }

    #[test]
    fn unreachable_hub_fails_every_call() {
        let mut hub = bridge();
        hub.set_reachable(false);
        assert!(hub.inventory().is_err());
        assert!(hub.load_function("YWBRIDG1-1234", "weighScale1").is_err());
    }

    #[test]
    fn numeric_text_keeps_its_type() {
        let mut hub = bridge();
        hub.set_attribute("YWBRIDG1-1234", "weighScale1", "logicalName", "42")
            .unwrap();
        hub.set_attribute("YWBRIDG1-1234", "weighScale1", "excitation", "1")
            .unwrap();

        let attributes = hub.load_function("YWBRIDG1-1234", "weighScale1").unwrap();
        assert_eq!(attributes["logicalName"], json!("42"));
        assert_eq!(attributes["excitation"], json!(1));

        let inventory = hub.inventory().unwrap();
        let scale = inventory
            .functions
            .iter()
            .find(|f| f.class == FunctionClass::WeighScale)
            .unwrap();
        assert_eq!(scale.logical_name, "42");
    }

    #[test]
    fn timed_reports_need_an_existing_function() {
        let mut hub = bridge();
        let measure = Measure {
            start_utc: 1_700_000_000.0,
            end_utc: 1_700_000_001.0,
            min: 249.5,
            average: 250.0,
            max: 250.5,
        };
        assert!(hub.push_timed_report("YWBRIDG1-1234", "weighScale9", measure).is_err());
        hub.push_timed_report("YWBRIDG1-1234", "weighScale1", measure)
            .unwrap();

        let notifications = hub.poll_notifications().unwrap();
        assert!(matches!(
            notifications.as_slice(),
            [HubNotification::TimedReport { measure: m, .. }] if m.average == 250.0
        ));
    }

    #[test]
    fn pushed_values_are_drained_once() {
        let mut hub = bridge();
        hub.push_value("YWBRIDG1-1234", "weighScale1", "12.5").unwrap();
        assert_eq!(hub.poll_notifications().unwrap().len(), 1);
        assert!(hub.poll_notifications().unwrap().is_empty());
        assert_eq!(
            hub.attribute("YWBRIDG1-1234", "weighScale1", "advertisedValue"),
            Some(json!("12.5"))
        );
    }
}
