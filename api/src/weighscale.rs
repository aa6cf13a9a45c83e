use crate::codec::{encode_fixed, json_array, milli, value_as_f64};
use crate::context::{FunctionRef, YoctoApi};
use crate::error::{Result, YoctoError};
use crate::function::Function;
use crate::sensor::Sensor;
use log::debug;
use yocto_types::{Excitation, FunctionClass};

// The compensation temperature update rate can't go above this, in percents.
const MAX_ADAPT_RATIO: f64 = 65.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CompensationTable {
    Offset = 0,
    Span = 1,
}

/// A weight measurement from a ratiometric load cell. Besides the measure itself, it drives the
/// bridge excitation, and can correct the load cell's thermal drift from a compensation
/// temperature, either by zero tracking or through offset/span compensation tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WeighScale(FunctionRef);

impl Function for WeighScale {
    const CLASS: FunctionClass = FunctionClass::WeighScale;

    fn from_ref(function: FunctionRef) -> Self {
        WeighScale(function)
    }

    fn function_ref(&self) -> FunctionRef {
        self.0
    }
}

impl Sensor for WeighScale {}

impl WeighScale {
    pub fn get_excitation(&self, api: &mut YoctoApi) -> Result<Excitation> {
        let code = api.integer_attribute(self.0, "excitation")?;
        i32::try_from(code)
            .ok()
            .and_then(Excitation::from_repr)
            .ok_or_else(|| YoctoError::UnexpectedValue {
                attribute: String::from("excitation"),
                value: code.to_string(),
            })
    }

    pub fn set_excitation(&self, api: &mut YoctoApi, excitation: Excitation) -> Result<()> {
        api.set_attribute(self.0, "excitation", &(excitation as i32).to_string())
    }

    /// Same as [`WeighScale::set_excitation`], from a raw device code. Codes outside the known
    /// set are refused before anything is sent.
    pub fn set_excitation_code(&self, api: &mut YoctoApi, code: i32) -> Result<()> {
        let excitation = Excitation::from_repr(code).ok_or_else(|| {
            YoctoError::InvalidArgument(format!("{} is not a valid excitation method", code))
        })?;
        self.set_excitation(api, excitation)
    }

    /// The compensation temperature update rate, in percents.
    pub fn get_adapt_ratio(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.0, "adaptRatio")
    }

    pub fn set_adapt_ratio(&self, api: &mut YoctoApi, ratio: f64) -> Result<()> {
        if !(0.0..=MAX_ADAPT_RATIO).contains(&ratio) {
            return Err(YoctoError::InvalidArgument(format!(
                "adapt ratio must be between 0 and {}%, got {}",
                MAX_ADAPT_RATIO, ratio
            )));
        }
        api.set_attribute(self.0, "adaptRatio", &encode_fixed(ratio))
    }

    pub fn get_comp_temperature(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.0, "compTemperature")
    }

    /// The thermal compensation currently applied to the measure.
    pub fn get_compensation(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.0, "compensation")
    }

    /// Measures under this threshold are ignored, and used to update the zero compensation.
    pub fn get_zero_tracking(&self, api: &mut YoctoApi) -> Result<f64> {
        api.decimal_attribute(self.0, "zeroTracking")
    }

    pub fn set_zero_tracking(&self, api: &mut YoctoApi, threshold: f64) -> Result<()> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(YoctoError::InvalidArgument(format!(
                "zero tracking threshold must be positive, got {}",
                threshold
            )));
        }
        api.set_attribute(self.0, "zeroTracking", &encode_fixed(threshold))
    }

    pub fn get_command(&self, api: &mut YoctoApi) -> Result<String> {
        api.string_attribute(self.0, "command")
    }

    pub fn set_command(&self, api: &mut YoctoApi, command: &str) -> Result<()> {
        api.set_attribute(self.0, "command", command)
    }

    /// Adapts the load cell signal bias so that the current signal reads as zero weight.
    pub fn tare(&self, api: &mut YoctoApi) -> Result<()> {
        self.set_command(api, "T")
    }

    /// Configures the load cell span so that the current signal reads as `current_weight`,
    /// `max_weight` being the heaviest load expected on the cell.
    pub fn setup_span(
        &self,
        api: &mut YoctoApi,
        current_weight: f64,
        max_weight: f64,
    ) -> Result<()> {
        if !current_weight.is_finite() || !max_weight.is_finite() {
            return Err(YoctoError::InvalidArgument(String::from(
                "span weights must be finite",
            )));
        }
        let command = format!("S{}:{}", milli(current_weight), milli(max_weight));
        self.set_command(api, &command)
    }

    /// Records the weight offset thermal compensation table. Corrections are interpolated
    /// linearly between the given points.
    pub fn set_offset_compensation_table(
        &self,
        api: &mut YoctoApi,
        temperatures: &[f64],
        compensations: &[f64],
    ) -> Result<()> {
        self.set_compensation_table(api, CompensationTable::Offset, temperatures, compensations)
    }

    /// Returns the weight offset thermal compensation table, as (temperatures, offsets).
    pub fn load_offset_compensation_table(
        &self,
        api: &mut YoctoApi,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        self.load_compensation_table(api, CompensationTable::Offset)
    }

    /// Records the weight span thermal compensation table, corrections are in percents.
    pub fn set_span_compensation_table(
        &self,
        api: &mut YoctoApi,
        temperatures: &[f64],
        compensations: &[f64],
    ) -> Result<()> {
        self.set_compensation_table(api, CompensationTable::Span, temperatures, compensations)
    }

    /// Returns the weight span thermal compensation table, as (temperatures, percents).
    pub fn load_span_compensation_table(&self, api: &mut YoctoApi) -> Result<(Vec<f64>, Vec<f64>)> {
        self.load_compensation_table(api, CompensationTable::Span)
    }

    fn set_compensation_table(
        &self,
        api: &mut YoctoApi,
        table: CompensationTable,
        temperatures: &[f64],
        compensations: &[f64],
    ) -> Result<()> {
        if temperatures.len() < 2 {
            return Err(YoctoError::InvalidArgument(String::from(
                "thermal compensation table must have at least two points",
            )));
        }
        if temperatures.len() != compensations.len() {
            return Err(YoctoError::InvalidArgument(String::from(
                "table sizes mismatch",
            )));
        }
        if temperatures.iter().chain(compensations).any(|v| !v.is_finite()) {
            return Err(YoctoError::InvalidArgument(String::from(
                "thermal compensation table values must be finite",
            )));
        }

        // The device expects the points by growing temperature, a duplicated temperature keeps
        // its first compensation.
        let mut points: Vec<(f64, f64)> = temperatures
            .iter()
            .copied()
            .zip(compensations.iter().copied())
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|later, earlier| later.0 == earlier.0);

        let table = table as i32;
        self.set_command(api, &format!("{}Z", table)).map_err(|e| {
            YoctoError::IoError(format!("unable to reset thermal compensation table: {}", e))
        })?;

        for (temperature, compensation) in points {
            let command = format!("{}m{}:{}", table, milli(temperature), milli(compensation));
            debug!("Compensation table point: {}", command);
            self.set_command(api, &command).map_err(|e| {
                YoctoError::IoError(format!("unable to set thermal compensation table: {}", e))
            })?;
        }
        Ok(())
    }

    fn load_compensation_table(
        &self,
        api: &mut YoctoApi,
        table: CompensationTable,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        // Each weigh scale owns four extra pages, indexed from its function number.
        let function_id = self.get_function_id(api)?;
        let index: u32 = function_id
            .trim_start_matches(FunctionClass::WeighScale.base_function_id())
            .parse()
            .unwrap_or(0);
        let page = 4 * index + table as u32;

        let content = api.download(self.0, &format!("extra.json?page={}", page))?;
        let values = json_array(&content)?;

        let mut temperatures = Vec::with_capacity(values.len() / 2);
        let mut compensations = Vec::with_capacity(values.len() / 2);
        for pair in values.chunks_exact(2) {
            let (Some(temperature), Some(compensation)) =
                (value_as_f64(&pair[0]), value_as_f64(&pair[1]))
            else {
                return Err(YoctoError::UnexpectedValue {
                    attribute: format!("extra.json?page={}", page),
                    value: format!("{}, {}", pair[0], pair[1]),
                });
            };
            temperatures.push(temperature / 1000.0);
            compensations.push(compensation / 1000.0);
        }
        Ok((temperatures, compensations))
    }

    pub fn find_weigh_scale(api: &mut YoctoApi, identifier: &str) -> WeighScale {
        <WeighScale as Function>::find(api, identifier)
    }

    pub fn first_weigh_scale(api: &mut YoctoApi) -> Result<Option<WeighScale>> {
        <WeighScale as Function>::first(api)
    }

    pub fn next_weigh_scale(&self, api: &mut YoctoApi) -> Result<Option<WeighScale>> {
        Function::next(self, api)
    }
}
