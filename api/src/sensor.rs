use crate::codec::encode_fixed;
use crate::context::YoctoApi;
use crate::error::Result;
use crate::function::Function;

/// One period of a sensor's timed report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measure {
    /// Start of the period, in seconds since the UNIX epoch (UTC).
    pub start_utc: f64,
    pub end_utc: f64,
    pub min: f64,
    pub average: f64,
    pub max: f64,
}

/// Measurement attributes common to every sensor function.
pub trait Sensor: Function {
    /// The measuring unit, e.g. "g" or "kg".
    fn get_unit(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.function_ref(), "unit")
    }

    fn get_current_value(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.function_ref(), "currentValue")
    }

    /// The unrounded, uncalibrated value, in the sensor's unit.
    fn get_current_raw_value(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.function_ref(), "currentRawValue")
    }

    fn get_lowest_value(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.function_ref(), "lowestValue")
    }

    fn set_lowest_value(&self, api: &mut YoctoApi, value: f64) -> Result<()> {
        api.set_attribute(self.function_ref(), "lowestValue", &encode_fixed(value))
    }

    fn get_highest_value(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.function_ref(), "highestValue")
    }

    fn set_highest_value(&self, api: &mut YoctoApi, value: f64) -> Result<()> {
        api.set_attribute(self.function_ref(), "highestValue", &encode_fixed(value))
    }

    fn get_resolution(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.function_ref(), "resolution")
    }

    /// Datalogger recording frequency, e.g. "1/s", "15/m", or "OFF".
    fn get_log_frequency(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.function_ref(), "logFrequency")
    }

    fn set_log_frequency(&self, api: &mut YoctoApi, frequency: &str) -> Result<()> {
        api.set_attribute(self.function_ref(), "logFrequency", frequency)
    }

    /// Timed report frequency, e.g. "1/s", "15/m", or "OFF".
    fn get_report_frequency(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.function_ref(), "reportFrequency")
    }

    fn set_report_frequency(&self, api: &mut YoctoApi, frequency: &str) -> Result<()> {
        api.set_attribute(self.function_ref(), "reportFrequency", frequency)
    }

    /// Registers a callback run for each periodic report, at the rate set with
    /// [`Sensor::set_report_frequency`]. Like value callbacks, it only runs from
    /// [`YoctoApi::handle_events`] or [`YoctoApi::sleep`].
    fn register_timed_report_callback<F>(&self, api: &mut YoctoApi, mut callback: F)
    where
        F: FnMut(&mut YoctoApi, Self, Measure) + 'static,
    {
        api.set_timed_report_callback(
            self.function_ref(),
            Some(Box::new(move |api, function, measure| {
                callback(api, Self::from_ref(function), measure)
            })),
        );
    }

    fn unregister_timed_report_callback(&self, api: &mut YoctoApi) {
        api.set_timed_report_callback(self.function_ref(), None);
    }
}
