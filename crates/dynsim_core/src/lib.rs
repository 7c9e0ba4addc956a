pub mod config;
pub mod error;
pub mod history;
pub mod integrators;
pub mod method;
pub mod proxy;
pub mod simulation;
pub mod spatial;
pub mod steppers;
/// The `dynsim_core` crate is the numerical engine behind dynsim.
/// It integrates ODEs, maps and method-of-lines lattice models in `f64`.
///
/// Key components:
/// - **Traits**: `DynamicalSystem` (vector fields and maps), `FnSystem` (closure adaptor).
/// - **Steppers**: one-step Runge-Kutta methods, Butcher tableaux,
///   Adams-Bashforth/Moulton, BDF and PECE.
/// - **Integrators**: fixed-step, fixed-point (implicit) and three adaptive
///   sub-stepping strategies.
/// - **Spatial**: central difference operators `D<component,order>` with
///   pluggable boundary policies.
/// - **Simulation**: the outer iteration loop over a history window.
pub mod traits;

pub use config::{ConfigQuery, ScopedConfig, SettingValue, Settings};
pub use error::{BoundarySide, ConfigError, IntegrationError};
pub use history::History;
pub use integrators::{build_integrator, Integrator};
pub use method::IntegrationMethod;
pub use proxy::RhsProxy;
pub use simulation::{RunSummary, Simulation};
pub use traits::{DynamicalSystem, FnSystem};
