use crate::config::{keys, ConfigQuery};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Every selectable integration method, named by its configuration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    EulerForward,
    Heun,
    Midpoint,
    Ralston,
    Radau,
    Rk44,
    Gill44,
    Rkm45,
    Rkf456,
    Butcher,
    AdamsBashforth,
    PeceAdams,
    PeceBdf,
    EulerBackward,
    HeunBackward,
    AdamsMoulton,
    Bdf,
    Manhattan,
    StepHalving,
    DualStepper,
}

impl IntegrationMethod {
    pub const ALL: [IntegrationMethod; 20] = [
        IntegrationMethod::EulerForward,
        IntegrationMethod::Heun,
        IntegrationMethod::Midpoint,
        IntegrationMethod::Ralston,
        IntegrationMethod::Radau,
        IntegrationMethod::Rk44,
        IntegrationMethod::Gill44,
        IntegrationMethod::Rkm45,
        IntegrationMethod::Rkf456,
        IntegrationMethod::Butcher,
        IntegrationMethod::AdamsBashforth,
        IntegrationMethod::PeceAdams,
        IntegrationMethod::PeceBdf,
        IntegrationMethod::EulerBackward,
        IntegrationMethod::HeunBackward,
        IntegrationMethod::AdamsMoulton,
        IntegrationMethod::Bdf,
        IntegrationMethod::Manhattan,
        IntegrationMethod::StepHalving,
        IntegrationMethod::DualStepper,
    ];

    pub fn token(self) -> &'static str {
        match self {
            IntegrationMethod::EulerForward => "euler_forward",
            IntegrationMethod::Heun => "heun",
            IntegrationMethod::Midpoint => "midpoint",
            IntegrationMethod::Ralston => "ralston",
            IntegrationMethod::Radau => "radau",
            IntegrationMethod::Rk44 => "rk44",
            IntegrationMethod::Gill44 => "gill44",
            IntegrationMethod::Rkm45 => "rkm45",
            IntegrationMethod::Rkf456 => "rkf456",
            IntegrationMethod::Butcher => "butcher",
            IntegrationMethod::AdamsBashforth => "adams_bashforth",
            IntegrationMethod::PeceAdams => "pece_adams",
            IntegrationMethod::PeceBdf => "pece_bdf",
            IntegrationMethod::EulerBackward => "euler_backward",
            IntegrationMethod::HeunBackward => "heun_backward",
            IntegrationMethod::AdamsMoulton => "adams_moulton",
            IntegrationMethod::Bdf => "bdf",
            IntegrationMethod::Manhattan => "manhattan",
            IntegrationMethod::StepHalving => "step_halving",
            IntegrationMethod::DualStepper => "dual_stepper",
        }
    }

    pub fn is_implicit(self) -> bool {
        matches!(
            self,
            IntegrationMethod::EulerBackward
                | IntegrationMethod::HeunBackward
                | IntegrationMethod::AdamsMoulton
                | IntegrationMethod::Bdf
        )
    }

    /// Reads the `method` key.
    pub fn from_config(config: &dyn ConfigQuery) -> Result<Self, ConfigError> {
        if !config.check_for_key(keys::METHOD) {
            return Err(ConfigError::MissingKey(keys::METHOD.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|method| config.check_for_enum_value(keys::METHOD, method.token()))
            .ok_or_else(|| ConfigError::UnknownEnumValue {
                key: keys::METHOD.to_string(),
                value: config.get_text(keys::METHOD).unwrap_or_default(),
            })
    }
}
