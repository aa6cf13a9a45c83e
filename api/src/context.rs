use crate::codec::decode_fixed;
use crate::error::{Result, YoctoError};
use crate::hub::{Hub, HttpHub, HubNotification};
use crate::module::Module;
use crate::sensor::Measure;
use crate::registry::{DeviceRegistry, ResolvedFunction};
use crate::settings::ApiSettings;
use fancy_regex::Regex;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use yocto_types::FunctionClass;

lazy_static! {
    static ref LOGICAL_NAME: Option<Regex> = Regex::new(r"^[A-Za-z0-9_.\-]{0,19}$").ok();
}

/// Checks that a string is usable as a module or function logical name: up to 19 characters
/// among letters, digits, `_`, `.` and `-`. The empty string (no name) is valid.
pub fn check_logical_name(name: &str) -> bool {
    match &*LOGICAL_NAME {
        Some(regex) => regex.is_match(name).unwrap_or(false),
        None => false,
    }
}

/// A slot in the API's function table. Handles such as [`crate::WeighScale`] wrap one of these.
///
/// A handle remembers the class it was created for and the context generation it belongs to,
/// so it stops working after [`YoctoApi::free_api`] instead of reaching whatever took its slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    index: usize,
    generation: u32,
    class: FunctionClass,
}

pub(crate) type ValueCallback = Box<dyn FnMut(&mut YoctoApi, FunctionRef, &str)>;
pub(crate) type TimedReportCallback = Box<dyn FnMut(&mut YoctoApi, FunctionRef, Measure)>;
type ModuleCallback = Box<dyn FnMut(&mut YoctoApi, Module)>;

struct CachedAttributes {
    values: Map<String, Value>,
    expires: Instant,
}

struct FunctionEntry {
    class: FunctionClass,
    identifier: String,
    cache: Option<CachedAttributes>,
    value_callback: Option<ValueCallback>,
    timed_report_callback: Option<TimedReportCallback>,

    // Bumped on every (un)registration, so a callback which replaced or removed itself while
    // running isn't put back afterwards.
    value_registration: u64,
    timed_report_registration: u64,
}

enum PendingEvent {
    Arrival(String),
    Removal(String),
    Value {
        serial_number: String,
        function_id: String,
        value: String,
    },
    TimedReport {
        serial_number: String,
        function_id: String,
        measure: Measure,
    },
    InitialValue(FunctionRef, String),
}

/// The API context: registered hubs, the device inventory and the table of function objects.
///
/// Everything is driven from the caller's thread. Device I/O only happens inside API calls,
/// and callbacks only run inside [`YoctoApi::handle_events`] and [`YoctoApi::sleep`].
pub struct YoctoApi {
    settings: ApiSettings,
    registry: DeviceRegistry,
    functions: Vec<FunctionEntry>,
    pending: VecDeque<PendingEvent>,
    generation: u32,
    arrival_callback: Option<ModuleCallback>,
    removal_callback: Option<ModuleCallback>,
    arrival_registration: u64,
    removal_registration: u64,
}

impl Default for YoctoApi {
    fn default() -> Self {
        Self::new(ApiSettings::default())
    }
}

impl YoctoApi {
    pub fn new(settings: ApiSettings) -> Self {
        Self {
            settings,
            registry: DeviceRegistry::default(),
            functions: Vec::new(),
            pending: VecDeque::new(),
            generation: 0,
            arrival_callback: None,
            removal_callback: None,
            arrival_registration: 0,
            removal_registration: 0,
        }
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Registers a network hub (VirtualHub or YoctoHub) by address. The hub must answer,
    /// otherwise the registration fails.
    pub fn register_hub(&mut self, url: &str) -> Result<()> {
        if url == "usb" {
            return Err(YoctoError::NotSupported(String::from(
                "direct USB access is not available, run VirtualHub and register 127.0.0.1",
            )));
        }
        if self.registry.has_hub(url) {
            return Ok(());
        }

        info!("Registering hub {}", url);
        let hub = HttpHub::connect(url, self.settings.network_timeout())?;
        self.register_hub_instance(Box::new(hub))
    }

    /// Registers an already built hub, such as a [`crate::hub::SimulatedHub`].
    pub fn register_hub_instance(&mut self, mut hub: Box<dyn Hub>) -> Result<()> {
        if self.registry.has_hub(hub.url()) {
            return Ok(());
        }
        hub.inventory()?;
        self.registry.add_hub(hub);
        self.update_device_list()
    }

    pub fn unregister_hub(&mut self, url: &str) {
        if self.registry.remove_hub(url) {
            info!("Unregistered hub {}", url);
            self.invalidate_all();
            self.update_device_list_quietly();
        }
    }

    /// Drops every hub and every function object. Handles obtained before are dangling after
    /// this, and report as offline.
    pub fn free_api(&mut self) {
        self.registry.clear();
        self.functions.clear();
        self.pending.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Re-reads the device inventory from every hub. Arrival and removal callbacks are queued,
    /// and run on the next [`YoctoApi::handle_events`].
    pub fn update_device_list(&mut self) -> Result<()> {
        if !self.registry.has_hubs() {
            return Err(YoctoError::NotInitialized);
        }
        self.update_device_list_quietly();
        Ok(())
    }

    fn update_device_list_quietly(&mut self) {
        let changes = self.registry.refresh();
        for serial in changes.arrived {
            info!("Device arrival: {}", serial);
            self.pending.push_back(PendingEvent::Arrival(serial));
        }
        if !changes.removed.is_empty() {
            self.invalidate_all();
        }
        for serial in changes.removed {
            info!("Device removal: {}", serial);
            self.pending.push_back(PendingEvent::Removal(serial));
        }
    }

    pub fn register_device_arrival_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut YoctoApi, Module) + 'static,
    {
        self.arrival_callback = Some(Box::new(callback));
        self.arrival_registration += 1;
    }

    pub fn register_device_removal_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut YoctoApi, Module) + 'static,
    {
        self.removal_callback = Some(Box::new(callback));
        self.removal_registration += 1;
    }

    pub fn unregister_device_callbacks(&mut self) {
        self.arrival_callback = None;
        self.removal_callback = None;
        self.arrival_registration += 1;
        self.removal_registration += 1;
    }

    /// Polls the hubs for value changes and runs every pending callback.
    pub fn handle_events(&mut self) {
        if self.registry.is_stale(self.settings.device_list_validity()) && self.registry.has_hubs()
        {
            self.update_device_list_quietly();
        }

        let mut notifications = Vec::new();
        for (_, hub) in self.registry.hubs_mut() {
            match hub.poll_notifications() {
                Ok(received) => notifications.extend(received),
                Err(e) => warn!("Unable to poll notifications from {}: {}", hub.url(), e),
            }
        }
        for notification in notifications {
            self.pending.push_back(match notification {
                HubNotification::ValueChanged {
                    serial_number,
                    function_id,
                    value,
                } => PendingEvent::Value {
                    serial_number,
                    function_id,
                    value,
                },
                HubNotification::TimedReport {
                    serial_number,
                    function_id,
                    measure,
                } => PendingEvent::TimedReport {
                    serial_number,
                    function_id,
                    measure,
                },
            });
        }

        while let Some(event) = self.pending.pop_front() {
            self.dispatch(event);
        }
    }

    /// Waits for `duration`, handling events the whole time. This is the cooperative yield
    /// point of the API.
    pub fn sleep(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            self.handle_events();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.settings.poll_interval().min(deadline - now));
        }
    }

    fn dispatch(&mut self, event: PendingEvent) {
        match event {
            PendingEvent::Arrival(serial) => {
                let module = Module::from_serial(self, &serial);
                if let Some(mut callback) = self.arrival_callback.take() {
                    let registration = self.arrival_registration;
                    callback(self, module);
                    if self.arrival_registration == registration {
                        self.arrival_callback = Some(callback);
                    }
                }
            }
            PendingEvent::Removal(serial) => {
                let module = Module::from_serial(self, &serial);
                if let Some(mut callback) = self.removal_callback.take() {
                    let registration = self.removal_registration;
                    callback(self, module);
                    if self.removal_registration == registration {
                        self.removal_callback = Some(callback);
                    }
                }
            }
            PendingEvent::Value {
                serial_number,
                function_id,
                value,
            } => {
                self.registry
                    .set_advertised_value(&serial_number, &function_id, &value);

                let targets = self.functions_at(&serial_number, &function_id, |entry| {
                    entry.value_callback.is_some() || entry.cache.is_some()
                });
                for function in targets {
                    if let Ok(entry) = self.entry_mut(function) {
                        entry.cache = None;
                    }
                    self.invoke_value_callback(function, &value);
                }
            }
            PendingEvent::TimedReport {
                serial_number,
                function_id,
                measure,
            } => {
                let targets = self.functions_at(&serial_number, &function_id, |entry| {
                    entry.timed_report_callback.is_some()
                });
                for function in targets {
                    self.invoke_timed_report_callback(function, measure);
                }
            }
            PendingEvent::InitialValue(function, value) => {
                self.invoke_value_callback(function, &value);
            }
        }
    }

    fn handle(&self, index: usize, class: FunctionClass) -> FunctionRef {
        FunctionRef {
            index,
            generation: self.generation,
            class,
        }
    }

    // Every function object currently pointing at serial.function_id, among those accepted
    // by `wanted`.
    fn functions_at(
        &self,
        serial_number: &str,
        function_id: &str,
        wanted: impl Fn(&FunctionEntry) -> bool,
    ) -> Vec<FunctionRef> {
        self.functions
            .iter()
            .enumerate()
            .filter(|(_, entry)| wanted(entry))
            .filter(|(_, entry)| {
                self.registry
                    .resolve(entry.class, &entry.identifier)
                    .is_some_and(|r| {
                        r.serial_number == serial_number && r.function_id == function_id
                    })
            })
            .map(|(index, entry)| self.handle(index, entry.class))
            .collect()
    }

    fn invoke_value_callback(&mut self, function: FunctionRef, value: &str) {
        let Ok(entry) = self.entry_mut(function) else {
            return;
        };
        let Some(mut callback) = entry.value_callback.take() else {
            return;
        };
        let registration = entry.value_registration;
        callback(self, function, value);

        if let Ok(entry) = self.entry_mut(function) {
            if entry.value_registration == registration {
                entry.value_callback = Some(callback);
            }
        }
    }

    fn invoke_timed_report_callback(&mut self, function: FunctionRef, measure: Measure) {
        let Ok(entry) = self.entry_mut(function) else {
            return;
        };
        let Some(mut callback) = entry.timed_report_callback.take() else {
            return;
        };
        let registration = entry.timed_report_registration;
        callback(self, function, measure);

        if let Ok(entry) = self.entry_mut(function) {
            if entry.timed_report_registration == registration {
                entry.timed_report_callback = Some(callback);
            }
        }
    }

    pub(crate) fn set_value_callback(
        &mut self,
        function: FunctionRef,
        callback: Option<ValueCallback>,
    ) {
        let registering = callback.is_some();
        let Ok(entry) = self.entry_mut(function) else {
            return;
        };
        entry.value_callback = callback;
        entry.value_registration += 1;

        // Like every other callback, the initial value is delivered from handle_events.
        if registering && self.is_online(function) {
            if let Ok(value) = self.string_attribute(function, "advertisedValue") {
                if !value.is_empty() {
                    self.pending
                        .push_back(PendingEvent::InitialValue(function, value));
                }
            }
        }
    }

    pub(crate) fn set_timed_report_callback(
        &mut self,
        function: FunctionRef,
        callback: Option<TimedReportCallback>,
    ) {
        if let Ok(entry) = self.entry_mut(function) {
            entry.timed_report_callback = callback;
            entry.timed_report_registration += 1;
        }
    }

    /// Returns the table slot for a class + identifier pair, creating it on first use. No
    /// device access happens here.
    pub(crate) fn find_function(&mut self, class: FunctionClass, identifier: &str) -> FunctionRef {
        if let Some(index) = self
            .functions
            .iter()
            .position(|entry| entry.class == class && entry.identifier == identifier)
        {
            return self.handle(index, class);
        }

        debug!("New {} object for {}", class, identifier);
        self.functions.push(FunctionEntry {
            class,
            identifier: identifier.to_string(),
            cache: None,
            value_callback: None,
            timed_report_callback: None,
            value_registration: 0,
            timed_report_registration: 0,
        });
        self.handle(self.functions.len() - 1, class)
    }

    pub(crate) fn first_function(&mut self, class: FunctionClass) -> Result<Option<FunctionRef>> {
        if self.registry.is_stale(self.settings.device_list_validity()) {
            self.update_device_list()?;
        }
        let first = self
            .registry
            .functions_of(class)
            .next()
            .map(|function| function.hardware_id());
        Ok(first.map(|hardware_id| self.find_function(class, &hardware_id)))
    }

    pub(crate) fn next_function(&mut self, function: FunctionRef) -> Result<Option<FunctionRef>> {
        let class = self.entry(function)?.class;
        let Ok(current) = self.resolve(function) else {
            return Ok(None);
        };
        let current = current.hardware_id();

        let next = self
            .registry
            .functions_of(class)
            .skip_while(|f| f.hardware_id() != current)
            .nth(1)
            .map(|f| f.hardware_id());
        Ok(next.map(|hardware_id| self.find_function(class, &hardware_id)))
    }

    fn entry(&self, function: FunctionRef) -> Result<&FunctionEntry> {
        if function.generation != self.generation {
            return Err(stale_handle());
        }
        self.functions
            .get(function.index)
            .filter(|entry| entry.class == function.class)
            .ok_or_else(stale_handle)
    }

    fn entry_mut(&mut self, function: FunctionRef) -> Result<&mut FunctionEntry> {
        if function.generation != self.generation {
            return Err(stale_handle());
        }
        self.functions
            .get_mut(function.index)
            .filter(|entry| entry.class == function.class)
            .ok_or_else(stale_handle)
    }

    pub(crate) fn identifier_of(&self, function: FunctionRef) -> Result<&str> {
        Ok(&self.entry(function)?.identifier)
    }

    /// Works out which physical function an object points at, refreshing the device list when
    /// it is stale or doesn't know the identifier.
    pub(crate) fn resolve(&mut self, function: FunctionRef) -> Result<ResolvedFunction> {
        if !self.registry.has_hubs() {
            return Err(YoctoError::NotInitialized);
        }

        let (class, identifier) = {
            let entry = self.entry(function)?;
            (entry.class, entry.identifier.clone())
        };

        let stale = self.registry.is_stale(self.settings.device_list_validity());
        if stale {
            self.update_device_list_quietly();
        }
        if let Some(resolved) = self.registry.resolve(class, &identifier) {
            return Ok(resolved);
        }

        if !stale {
            self.update_device_list_quietly();
        }
        self.registry.resolve(class, &identifier).ok_or_else(|| {
            YoctoError::DeviceNotFound(format!("No {} found matching {}", class, identifier))
        })
    }

    /// Forces a fresh attribute snapshot of the function.
    pub(crate) fn load(&mut self, function: FunctionRef) -> Result<()> {
        let target = self.resolve(function)?;
        let validity = self.settings.cache_validity();
        let loaded = self
            .registry
            .hub_mut(target.hub)?
            .load_function(&target.serial_number, &target.function_id);

        let entry = self.entry_mut(function)?;
        match loaded {
            Ok(values) => {
                entry.cache = Some(CachedAttributes {
                    values,
                    expires: Instant::now() + validity,
                });
                Ok(())
            }
            Err(e) => {
                entry.cache = None;
                Err(e)
            }
        }
    }

    pub(crate) fn attributes(&mut self, function: FunctionRef) -> Result<&Map<String, Value>> {
        let fresh = self
            .entry(function)?
            .cache
            .as_ref()
            .is_some_and(|cache| cache.expires > Instant::now());
        if !fresh {
            self.load(function)?;
        }

        match &self.entry(function)?.cache {
            Some(cache) => Ok(&cache.values),
            None => Err(YoctoError::IoError(String::from("attribute cache unavailable"))),
        }
    }

    pub(crate) fn attribute(&mut self, function: FunctionRef, name: &str) -> Result<Value> {
        self.attributes(function)?
            .get(name)
            .cloned()
            .ok_or_else(|| YoctoError::MissingAttribute(name.to_string()))
    }

    pub(crate) fn string_attribute(&mut self, function: FunctionRef, name: &str) -> Result<String> {
        match self.attribute(function, name)? {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            other => Err(unexpected(name, &other)),
        }
    }

    pub(crate) fn integer_attribute(&mut self, function: FunctionRef, name: &str) -> Result<i64> {
        let value = self.attribute(function, name)?;
        let integer = match &value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        integer.ok_or_else(|| unexpected(name, &value))
    }

    /// Reads a 16.16 fixed point attribute as a decimal.
    pub(crate) fn decimal_attribute(&mut self, function: FunctionRef, name: &str) -> Result<f64> {
        let value = self.attribute(function, name)?;
        value
            .as_f64()
            .map(decode_fixed)
            .ok_or_else(|| unexpected(name, &value))
    }

    /// Writes an attribute through to the device. The cached snapshot is dropped, so the next
    /// read reflects what the device acknowledged.
    pub(crate) fn set_attribute(
        &mut self,
        function: FunctionRef,
        name: &str,
        value: &str,
    ) -> Result<()> {
        let target = self.resolve(function)?;
        self.registry.hub_mut(target.hub)?.set_attribute(
            &target.serial_number,
            &target.function_id,
            name,
            value,
        )?;
        self.entry_mut(function)?.cache = None;
        Ok(())
    }

    pub(crate) fn download(&mut self, function: FunctionRef, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(function)?;
        self.registry
            .hub_mut(target.hub)?
            .download(&target.serial_number, path)
    }

    /// True when the function is reachable right now. Never fails: any error simply means
    /// the function is offline.
    pub(crate) fn is_online(&mut self, function: FunctionRef) -> bool {
        let fresh = self.entry(function).is_ok_and(|entry| {
            entry
                .cache
                .as_ref()
                .is_some_and(|cache| cache.expires > Instant::now())
        });
        fresh || self.load(function).is_ok()
    }

    fn invalidate_all(&mut self) {
        for entry in &mut self.functions {
            entry.cache = None;
        }
    }
}

fn stale_handle() -> YoctoError {
    YoctoError::InvalidArgument(String::from(
        "function object is unknown to this API context",
    ))
}

fn unexpected(name: &str, value: &Value) -> YoctoError {
    YoctoError::UnexpectedValue {
        attribute: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SimulatedHub;
    use serde_json::json;
    use crate::function::Function;

    fn api_with_scale() -> (YoctoApi, SimulatedHub) {
        let hub = SimulatedHub::new("sim");
        hub.add_module("YWBRIDG1-1234", "Yocto-Bridge", 0x4d);
        hub.add_function(
            "YWBRIDG1-1234",
            FunctionClass::WeighScale,
            "weighScale1",
            json!({"unit": "g", "currentValue": 655360, "advertisedValue": "10.0"}),
        )
        .unwrap();

        let mut api = YoctoApi::default();
        api.register_hub_instance(Box::new(hub.clone())).unwrap();
        (api, hub)
    }

    #[test]
    fn logical_names_are_checked() {
        assert!(check_logical_name(""));
        assert!(check_logical_name("kitchen_scale-2.a"));
        assert!(!check_logical_name("with space"));
        assert!(!check_logical_name("this-name-is-far-too-long"));
        assert!(!check_logical_name("naïve"));
    }

    #[test]
    fn find_reuses_table_slots() {
        let mut api = YoctoApi::default();
        let a = api.find_function(FunctionClass::WeighScale, "scale");
        let b = api.find_function(FunctionClass::WeighScale, "scale");
        let c = api.find_function(FunctionClass::Wireless, "scale");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nothing_is_online_without_hubs() {
        let mut api = YoctoApi::default();
        let function = api.find_function(FunctionClass::WeighScale, "scale");
        assert!(!api.is_online(function));
        assert!(matches!(api.resolve(function), Err(YoctoError::NotInitialized)));
    }

    #[test]
    fn typed_attribute_readers() {
        let (mut api, _) = api_with_scale();
        let scale = api.find_function(FunctionClass::WeighScale, "YWBRIDG1-1234.weighScale1");
        assert_eq!(api.string_attribute(scale, "unit").unwrap(), "g");
        assert_eq!(api.decimal_attribute(scale, "currentValue").unwrap(), 10.0);
        assert!(matches!(
            api.attribute(scale, "missing"),
            Err(YoctoError::MissingAttribute(_))
        ));
        assert!(api.integer_attribute(scale, "unit").is_err());
    }

    #[test]
    fn writes_drop_the_cache() {
        let (mut api, hub) = api_with_scale();
        let scale = api.find_function(FunctionClass::WeighScale, "YWBRIDG1-1234.weighScale1");
        api.set_attribute(scale, "unit", "kg").unwrap();
        assert_eq!(api.string_attribute(scale, "unit").unwrap(), "kg");
        assert_eq!(hub.writes().len(), 1);
    }

    #[test]
    fn device_callbacks_run_from_handle_events() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let (mut api, hub) = api_with_scale();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let arrivals = seen.clone();
        api.register_device_arrival_callback(move |api, module| {
            let serial = module.get_serial_number(api).unwrap_or_default();
            arrivals.borrow_mut().push(format!("+{}", serial));
        });
        let removals = seen.clone();
        api.register_device_removal_callback(move |_, _| {
            removals.borrow_mut().push(String::from("-"));
        });

        // The initial arrival was queued at registration, before the callback existed.
        api.handle_events();
        assert_eq!(seen.borrow().as_slice(), ["+YWBRIDG1-1234"]);

        hub.remove_module("YWBRIDG1-1234");
        api.update_device_list().unwrap();
        assert_eq!(seen.borrow().len(), 1);
        api.handle_events();
        assert_eq!(seen.borrow().as_slice(), ["+YWBRIDG1-1234", "-"]);
    }

    #[test]
    fn handles_die_with_free_api() {
        let (mut api, hub) = api_with_scale();
        hub.add_function("YWBRIDG1-1234", FunctionClass::Wireless, "wireless", json!({}))
            .unwrap();
        let scale = api.find_function(FunctionClass::WeighScale, "YWBRIDG1-1234.weighScale1");
        assert!(api.is_online(scale));

        api.free_api();
        api.register_hub_instance(Box::new(hub.clone())).unwrap();
        let wireless = api.find_function(FunctionClass::Wireless, "YWBRIDG1-1234.wireless");

        // The new object took the freed slot, the old handle must not reach it.
        assert_eq!(wireless.index, scale.index);
        assert!(!api.is_online(scale));
        assert!(api.set_attribute(scale, "excitation", "2").is_err());
        assert!(hub.writes().is_empty());
        assert!(api.is_online(wireless));
    }

    #[test]
    fn handles_only_reach_their_own_class() {
        let (mut api, _) = api_with_scale();
        let scale = api.find_function(FunctionClass::WeighScale, "YWBRIDG1-1234.weighScale1");
        let forged = FunctionRef {
            class: FunctionClass::Wireless,
            ..scale
        };
        assert!(api.entry(forged).is_err());
        assert!(!api.is_online(forged));
    }

    #[test]
    fn device_callbacks_can_unregister_themselves() {
        use std::cell::Cell;
        use std::rc::Rc;

        let (mut api, hub) = api_with_scale();
        let arrivals = Rc::new(Cell::new(0));

        let counter = arrivals.clone();
        api.register_device_arrival_callback(move |api, _| {
            counter.set(counter.get() + 1);
            api.unregister_device_callbacks();
        });
        api.handle_events();
        assert_eq!(arrivals.get(), 1);

        hub.add_module("YWBRIDG1-5678", "Yocto-Bridge", 0x4d);
        api.update_device_list().unwrap();
        api.handle_events();
        assert_eq!(arrivals.get(), 1);
    }

    #[test]
    fn value_callbacks_can_replace_themselves() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let (mut api, hub) = api_with_scale();
        let scale = api.find_function(FunctionClass::WeighScale, "YWBRIDG1-1234.weighScale1");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = seen.clone();
        api.set_value_callback(
            scale,
            Some(Box::new(move |api, function, value| {
                first.borrow_mut().push(format!("first {}", value));
                let second = first.clone();
                api.set_value_callback(
                    function,
                    Some(Box::new(move |_, _, value| {
                        second.borrow_mut().push(format!("second {}", value));
                    })),
                );
            })),
        );
        // The replacement gets its own initial value, from the same handle_events.
        api.handle_events();
        assert_eq!(seen.borrow().as_slice(), ["first 10.0", "second 10.0"]);

        hub.push_value("YWBRIDG1-1234", "weighScale1", "11.0").unwrap();
        api.handle_events();
        assert_eq!(
            seen.borrow().as_slice(),
            ["first 10.0", "second 10.0", "second 11.0"]
        );
    }
}
