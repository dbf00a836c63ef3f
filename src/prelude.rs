pub use crate::compartments::{CompartmentId, CompartmentModel, ProportionInfo, TransitionRow};
pub use crate::distributions::Distribution;
pub use crate::driver::{ModelInfo, SimOutput};
pub use crate::error::{EpiError, Result};
pub use crate::initial_conditions::InitialConditionsFactory;
pub use crate::integrate::{Integrator, Trajectory, ValueType};
pub use crate::modifiers::{Modifier, StackedMethod};
pub use crate::parameters::{ParamSpec, Parameters};
pub use crate::seeding::{SeedingEvent, SeedingFactory};
pub use crate::subpop::SubpopStruct;
pub use crate::time_setup::TimeSetup;

pub type Real = f64;
pub type Date = chrono::NaiveDate;

/// Row/column index into a dense tensor; kept distinct from `usize` only at
/// public API boundaries, per the "indices, not pointers" design note.
pub type ParamIndex = usize;
