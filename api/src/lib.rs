pub use yocto_types;

pub mod codec;
pub mod context;
pub mod error;
pub mod function;
pub mod hub;
pub mod module;
pub mod sensor;
pub mod settings;
pub mod weighscale;
pub mod wireless;

mod registry;

pub use context::{check_logical_name, FunctionRef, YoctoApi};
pub use error::{Result, YoctoError};
pub use function::Function;
pub use module::Module;
pub use sensor::{Measure, Sensor};
pub use settings::ApiSettings;
pub use weighscale::WeighScale;
pub use wireless::{Wireless, WlanRecord};
