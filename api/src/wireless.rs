use crate::codec::json_array;
use crate::context::{FunctionRef, YoctoApi};
use crate::error::{Result, YoctoError};
use crate::function::Function;
use log::warn;
use serde::Deserialize;
use yocto_types::{FunctionClass, Security};

/// A wireless network seen by the module during its last scan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WlanRecord {
    ssid: String,
    channel: u32,
    sec: String,
    rssi: i32,
}

impl WlanRecord {
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Security algorithm as reported by the scan, e.g. "WPA2" or "OPEN".
    pub fn security(&self) -> &str {
        &self.sec
    }

    /// Link quality, in percents.
    pub fn link_quality(&self) -> i32 {
        self.rssi
    }
}

/// The wireless LAN interface of a networked module.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Wireless(FunctionRef);

impl Function for Wireless {
    const CLASS: FunctionClass = FunctionClass::Wireless;

    fn from_ref(function: FunctionRef) -> Self {
        Wireless(function)
    }

    fn function_ref(&self) -> FunctionRef {
        self.0
    }
}

impl Wireless {
    /// Link quality, in percents.
    pub fn get_link_quality(&self, api: &mut YoctoApi) -> Result<i32> {
        let quality = api.integer_attribute(self.0, "linkQuality")?;
        i32::try_from(quality).map_err(|_| YoctoError::UnexpectedValue {
            attribute: String::from("linkQuality"),
            value: quality.to_string(),
        })
    }

    pub fn get_ssid(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.0, "ssid")
    }

    /// The 802.11 channel in use, or 0 when the selected network has not been found.
    pub fn get_channel(&self, api: &mut YoctoApi) -> Result<u32> {
        let channel = api.integer_attribute(self.0, "channel")?;
        u32::try_from(channel).map_err(|_| YoctoError::UnexpectedValue {
            attribute: String::from("channel"),
            value: channel.to_string(),
        })
    }

    pub fn get_security(&self, api: &mut YoctoApi) -> Result<Security> {
        let code = api.integer_attribute(self.0, "security")?;
        i32::try_from(code)
            .ok()
            .and_then(Security::from_repr)
            .ok_or_else(|| YoctoError::UnexpectedValue {
                attribute: String::from("security"),
                value: code.to_string(),
            })
    }

    /// The last status message from the interface.
    pub fn get_message(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.0, "message")
    }

    pub fn get_wlan_config(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.0, "wlanConfig")
    }

    pub fn set_wlan_config(&self, api: &mut YoctoApi, config: &str) -> Result<()> {
        api.set_attribute(self.0, "wlanConfig", config)
    }

    /// Configures the interface to join an existing access point (infrastructure mode). The
    /// module needs a `save_to_flash` and a reboot for this to apply.
    pub fn join_network(&self, api: &mut YoctoApi, ssid: &str, security_key: &str) -> Result<()> {
        self.set_wlan_config(api, &format!("INFRA:{}\\{}", ssid, security_key))
    }

    /// Configures the interface to create an ad-hoc network. A non-empty key protects it with
    /// WEP128, as WPA is not standardised for ad-hoc networks. Like [`Wireless::join_network`],
    /// this applies after `save_to_flash` and a reboot.
    pub fn adhoc_network(&self, api: &mut YoctoApi, ssid: &str, security_key: &str) -> Result<()> {
        self.set_wlan_config(api, &format!("ADHOC:{}\\{}", ssid, security_key))
    }

    /// Lists the networks found by the last scan. The list isn't refreshed while the module is
    /// connected to an access point, switching to ad-hoc mode forces a new scan.
    pub fn get_detected_wlans(&self, api: &mut YoctoApi) -> Result<Vec<WlanRecord>> {
        let content = api.download(self.0, "wlan.json?by=name")?;
        let records = json_array(&content)?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<WlanRecord>(entry.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed network record {}: {}", entry, e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    pub fn find_wireless(api: &mut YoctoApi, identifier: &str) -> Wireless {
        <Wireless as Function>::find(api, identifier)
    }

    pub fn first_wireless(api: &mut YoctoApi) -> Result<Option<Wireless>> {
        <Wireless as Function>::first(api)
    }

    pub fn next_wireless(&self, api: &mut YoctoApi) -> Result<Option<Wireless>> {
        Function::next(self, api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SimulatedHub;
    use serde_json::json;

    const SERIAL: &str = "YHUBWLN1-5678";

    fn wireless() -> (YoctoApi, SimulatedHub, Wireless) {
        let hub = SimulatedHub::new("sim");
        hub.add_module(SERIAL, "YoctoHub-Wireless", 0x49);
        hub.add_function(
            SERIAL,
            FunctionClass::Wireless,
            "wireless",
            json!({
                "logicalName": "attic",
                "advertisedValue": "74",
                "linkQuality": 74,
                "ssid": "workshop",
                "channel": 6,
                "security": 4,
                "message": "Connected",
                "wlanConfig": "INFRA:workshop\\secret"
            }),
        )
        .unwrap();

        let mut api = YoctoApi::default();
        api.register_hub_instance(Box::new(hub.clone())).unwrap();
        let wireless = Wireless::find_wireless(&mut api, "attic");
        (api, hub, wireless)
    }

    #[test]
    fn reads_link_state() {
        let (mut api, _, wireless) = wireless();
        assert!(wireless.is_online(&mut api));
        assert_eq!(wireless.get_link_quality(&mut api).unwrap(), 74);
        assert_eq!(wireless.get_ssid(&mut api).unwrap(), "workshop");
        assert_eq!(wireless.get_channel(&mut api).unwrap(), 6);
        assert_eq!(wireless.get_security(&mut api).unwrap(), Security::Wpa2);
        assert_eq!(wireless.get_message(&mut api).unwrap(), "Connected");
        assert_eq!(
            wireless.get_hardware_id(&mut api).unwrap(),
            "YHUBWLN1-5678.wireless"
        );
    }

    #[test]
    fn network_configuration_strings() {
        let (mut api, hub, wireless) = wireless();
        wireless.join_network(&mut api, "home", "p4ss").unwrap();
        wireless.adhoc_network(&mut api, "field", "").unwrap();

        let configs: Vec<String> = hub.writes().into_iter().map(|w| w.value).collect();
        assert_eq!(configs, vec!["INFRA:home\\p4ss", "ADHOC:field\\"]);
        assert_eq!(wireless.get_wlan_config(&mut api).unwrap(), "ADHOC:field\\");
    }

    #[test]
    fn detected_networks_skip_malformed_entries() {
        let (mut api, hub, wireless) = wireless();
        let scan = json!([
            {"ssid": "workshop", "channel": 6, "sec": "WPA2", "rssi": 74},
            {"ssid": "broken"},
            {"ssid": "cafe", "channel": 11, "sec": "OPEN", "rssi": 31}
        ]);
        hub.set_file(SERIAL, "wlan.json?by=name", scan.to_string().as_bytes())
            .unwrap();

        let networks = wireless.get_detected_wlans(&mut api).unwrap();
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].ssid(), "workshop");
        assert_eq!(networks[1].channel(), 11);
        assert_eq!(networks[1].security(), "OPEN");
        assert_eq!(networks[1].link_quality(), 31);
    }

    #[test]
    fn missing_scan_is_an_error() {
        let (mut api, _, wireless) = wireless();
        let error = wireless.get_detected_wlans(&mut api).unwrap_err();
        assert_eq!(error.code(), yocto_types::ApiCode::FileNotFound);
    }
}
