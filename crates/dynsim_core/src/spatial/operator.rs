use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;

use serde::{Deserialize, Serialize};

use super::boundary::{
    BoundaryContext, BoundaryKind, BoundaryPolicy, Constant, Cyclic, Fluxless, Interpolated,
    Invalid,
};
use super::coefficients::CoefficientCache;
use super::scheme::{DifferenceScheme, MAX_DIFFERENCE_ORDER};
use super::CellField;
use crate::error::{BoundarySide, ConfigError};

/// `order`-th derivative of one component, named `D<component,order>`.
#[derive(Debug)]
pub struct DifferenceOperator {
    name: String,
    component: usize,
    scheme: DifferenceScheme,
    min_policy: Box<dyn BoundaryPolicy>,
    max_policy: Box<dyn BoundaryPolicy>,
}

impl DifferenceOperator {
    pub fn new(
        component: usize,
        order: u32,
        min_policy: Box<dyn BoundaryPolicy>,
        max_policy: Box<dyn BoundaryPolicy>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: Self::name_for(component, order),
            component,
            scheme: DifferenceScheme::for_order(order)?,
            min_policy,
            max_policy,
        })
    }

    pub fn name_for(component: usize, order: u32) -> String {
        format!("D<{component},{order}>")
    }

    /// Inverse of [`name_for`](Self::name_for).
    pub fn parse_name(name: &str) -> Option<(usize, u32)> {
        let inner = name.trim().strip_prefix("D<")?.strip_suffix('>')?;
        let (component, order) = inner.split_once(',')?;
        Some((component.trim().parse().ok()?, order.trim().parse().ok()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> usize {
        self.component
    }

    pub fn scheme(&self) -> DifferenceScheme {
        self.scheme
    }

    pub fn min_policy(&self) -> &dyn BoundaryPolicy {
        self.min_policy.as_ref()
    }

    pub fn max_policy(&self) -> &dyn BoundaryPolicy {
        self.max_policy.as_ref()
    }

    /// Installs a new policy for the low end and hands back the old one.
    pub fn set_min_policy(&mut self, policy: Box<dyn BoundaryPolicy>) -> Box<dyn BoundaryPolicy> {
        mem::replace(&mut self.min_policy, policy)
    }

    /// Installs a new policy for the high end and hands back the old one.
    pub fn set_max_policy(&mut self, policy: Box<dyn BoundaryPolicy>) -> Box<dyn BoundaryPolicy> {
        mem::replace(&mut self.max_policy, policy)
    }

    /// Derivative of the operator's component at cell `index`.
    pub fn partial_diff(
        &self,
        field: &CellField<'_>,
        index: usize,
        spacing: f64,
        cache: &CoefficientCache,
    ) -> Result<f64, ConfigError> {
        let cells = field.cells();
        let view = field.component(self.component);
        let boundary = |side: BoundarySide, policy: &dyn BoundaryPolicy| {
            policy.evaluate(&BoundaryContext {
                operator: &self.name,
                side,
                scheme: self.scheme,
                view,
                index,
                spacing,
                cache,
            })
        };

        if index + self.scheme.right_offset() >= cells {
            boundary(BoundarySide::Max, self.max_policy.as_ref())
        } else if index < self.scheme.left_offset() {
            boundary(BoundarySide::Min, self.min_policy.as_ref())
        } else {
            Ok(self.scheme.apply(&view, index as isize, spacing, cache))
        }
    }

    /// Derivative at every cell into `out`.
    pub fn apply_all(
        &self,
        field: &CellField<'_>,
        spacing: f64,
        cache: &CoefficientCache,
        out: &mut [f64],
    ) -> Result<(), ConfigError> {
        for (index, value) in out.iter_mut().enumerate().take(field.cells()) {
            *value = self.partial_diff(field, index, spacing, cache)?;
        }
        Ok(())
    }
}

/// Which boundary policy each operator gets when first materialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Operator name to policy kind.
    pub kinds: HashMap<String, BoundaryKind>,
    /// Kind for operators missing from `kinds`.
    pub default_kind: BoundaryKind,
    /// Values of CONSTANT policies at the low end, by operator name.
    pub min_values: HashMap<String, f64>,
    /// Values of CONSTANT policies at the high end, by operator name.
    pub max_values: HashMap<String, f64>,
}

impl BoundaryConfig {
    /// Same kind for every operator.
    pub fn uniform(kind: BoundaryKind) -> Self {
        Self {
            default_kind: kind,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, operator: &str, kind: BoundaryKind) -> Self {
        self.kinds.insert(operator.to_string(), kind);
        self
    }

    pub fn with_constant(mut self, operator: &str, min: f64, max: f64) -> Self {
        self.kinds.insert(operator.to_string(), BoundaryKind::Constant);
        self.min_values.insert(operator.to_string(), min);
        self.max_values.insert(operator.to_string(), max);
        self
    }

    pub fn kind_for(&self, operator: &str) -> BoundaryKind {
        self.kinds.get(operator).copied().unwrap_or(self.default_kind)
    }

    pub fn policy_for(
        &self,
        operator: &str,
        side: BoundarySide,
    ) -> Result<Box<dyn BoundaryPolicy>, ConfigError> {
        let policy: Box<dyn BoundaryPolicy> = match self.kind_for(operator) {
            BoundaryKind::Cyclic => Box::new(Cyclic),
            BoundaryKind::Fluxless => Box::new(Fluxless),
            BoundaryKind::Interpolated => Box::new(Interpolated),
            BoundaryKind::Invalid => Box::new(Invalid),
            BoundaryKind::Constant => {
                let values = match side {
                    BoundarySide::Min => &self.min_values,
                    BoundarySide::Max => &self.max_values,
                };
                let value = values.get(operator).copied().ok_or_else(|| {
                    ConfigError::MissingBoundaryValue {
                        operator: operator.to_string(),
                        side,
                    }
                })?;
                Box::new(Constant { value })
            }
        };
        Ok(policy)
    }
}

/// Owns the operators of one lattice and the coefficient tables they share.
#[derive(Debug)]
pub struct OperatorRegistry {
    config: BoundaryConfig,
    coefficients: CoefficientCache,
    operators: HashMap<String, DifferenceOperator>,
    spacing: f64,
}

impl OperatorRegistry {
    pub fn new(config: BoundaryConfig, spacing: f64) -> Result<Self, ConfigError> {
        if !(spacing > 0.0) || !spacing.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "spacing".to_string(),
                reason: format!("lattice spacing must be positive, got {spacing}"),
            });
        }
        Ok(Self {
            config,
            coefficients: CoefficientCache::new(),
            operators: HashMap::new(),
            spacing,
        })
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    pub fn coefficients(&self) -> &CoefficientCache {
        &self.coefficients
    }

    /// Number of operators materialized so far.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    fn materialize<'r>(
        operators: &'r mut HashMap<String, DifferenceOperator>,
        config: &BoundaryConfig,
        component: usize,
        order: u32,
    ) -> Result<&'r mut DifferenceOperator, ConfigError> {
        match operators.entry(DifferenceOperator::name_for(component, order)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let min = config.policy_for(entry.key(), BoundarySide::Min)?;
                let max = config.policy_for(entry.key(), BoundarySide::Max)?;
                log::debug!(
                    "materialized {} with {} / {} boundaries",
                    entry.key(),
                    min.kind(),
                    max.kind()
                );
                let operator = DifferenceOperator::new(component, order, min, max)?;
                Ok(entry.insert(operator))
            }
        }
    }

    /// The operator `D<component,order>`, created from the configuration on
    /// first request.
    pub fn operator(
        &mut self,
        component: usize,
        order: u32,
    ) -> Result<&mut DifferenceOperator, ConfigError> {
        Self::materialize(&mut self.operators, &self.config, component, order)
    }

    /// Looks an operator up by its `D<component,order>` name.
    pub fn operator_by_name(&mut self, name: &str) -> Result<&mut DifferenceOperator, ConfigError> {
        let (component, order) =
            DifferenceOperator::parse_name(name).ok_or_else(|| ConfigError::InvalidValue {
                key: "operator".to_string(),
                reason: format!("'{name}' is not of the form D<component,order>"),
            })?;
        self.operator(component, order)
    }

    pub fn partial_diff(
        &mut self,
        component: usize,
        order: u32,
        field: &CellField<'_>,
        index: usize,
    ) -> Result<f64, ConfigError> {
        let operator = Self::materialize(&mut self.operators, &self.config, component, order)?;
        operator.partial_diff(field, index, self.spacing, &self.coefficients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(data: &[f64]) -> CellField<'_> {
        CellField::new(data, 1)
    }

    fn registry(config: BoundaryConfig) -> OperatorRegistry {
        OperatorRegistry::new(config, 1.0).unwrap()
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(DifferenceOperator::name_for(2, 4), "D<2,4>");
        assert_eq!(DifferenceOperator::parse_name("D<2,4>"), Some((2, 4)));
        assert_eq!(DifferenceOperator::parse_name("D<1, 3>"), Some((1, 3)));
        assert_eq!(DifferenceOperator::parse_name("E<1,2>"), None);
        assert_eq!(DifferenceOperator::parse_name("D<1>"), None);
    }

    #[test]
    fn cyclic_boundary_wraps_to_the_last_cell() {
        let data = [5.0, 1.0, 2.0, 3.0, 4.0];
        let mut reg = registry(BoundaryConfig::uniform(BoundaryKind::Cyclic));
        let f = field(&data);
        // s[-1] is s[4]
        assert_eq!(reg.partial_diff(0, 2, &f, 0).unwrap(), 4.0 - 10.0 + 1.0);
        assert_eq!(reg.partial_diff(0, 2, &f, 4).unwrap(), 3.0 - 8.0 + 5.0);
        assert_eq!(reg.partial_diff(0, 1, &f, 0).unwrap(), (1.0 - 4.0) / 2.0);
    }

    #[test]
    fn constant_boundary_ignores_the_interior() {
        let config = BoundaryConfig::default().with_constant("D<0,1>", -2.5, 7.0);
        let mut reg = registry(config);
        for data in [[0.0, 1.0, 2.0, 3.0], [9.0, -3.0, 4.0, 100.0]] {
            let f = field(&data);
            assert_eq!(reg.partial_diff(0, 1, &f, 0).unwrap(), -2.5);
            assert_eq!(reg.partial_diff(0, 1, &f, 3).unwrap(), 7.0);
        }
    }

    #[test]
    fn fluxless_boundary_is_zero() {
        let data = [1.0, 4.0, 9.0, 16.0];
        let mut reg = registry(BoundaryConfig::uniform(BoundaryKind::Fluxless));
        let f = field(&data);
        assert_eq!(reg.partial_diff(0, 2, &f, 0).unwrap(), 0.0);
        assert_eq!(reg.partial_diff(0, 2, &f, 3).unwrap(), 0.0);
        assert_eq!(reg.partial_diff(0, 2, &f, 1).unwrap(), 2.0);
    }

    #[test]
    fn interpolated_boundary_copies_the_nearest_interior_cell() {
        let data = [0.0, 1.0, 4.0, 9.0, 25.0, 30.0];
        let mut reg = registry(BoundaryConfig::uniform(BoundaryKind::Interpolated));
        let f = field(&data);
        let inner_left = reg.partial_diff(0, 1, &f, 1).unwrap();
        let inner_right = reg.partial_diff(0, 1, &f, 4).unwrap();
        assert_eq!(reg.partial_diff(0, 1, &f, 0).unwrap(), inner_left);
        assert_eq!(reg.partial_diff(0, 1, &f, 5).unwrap(), inner_right);

        let short = [1.0, 2.0];
        let err = reg.partial_diff(0, 2, &field(&short), 0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::GridTooSmall {
                operator: "D<0,2>".to_string(),
                cells: 2,
                required: 3
            }
        );
    }

    #[test]
    fn invalid_policy_names_the_operator() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let mut reg = registry(BoundaryConfig::default());
        let f = field(&data);
        assert_eq!(reg.partial_diff(0, 2, &f, 2).unwrap(), 0.0);
        let err = reg.partial_diff(0, 2, &f, 0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidBoundaryPolicy {
                operator: "D<0,2>".to_string(),
                side: BoundarySide::Min
            }
        );
        assert!(err.to_string().contains("D<0,2>"));
    }

    #[test]
    fn constant_without_value_fails_at_materialization() {
        let mut config = BoundaryConfig::default().with_kind("D<0,2>", BoundaryKind::Constant);
        config.min_values.insert("D<0,2>".to_string(), 1.0);
        let mut reg = registry(config);
        let err = reg.operator(0, 2).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingBoundaryValue {
                operator: "D<0,2>".to_string(),
                side: BoundarySide::Max
            }
        );
    }

    #[test]
    fn policy_setters_return_the_previous_policy() {
        let mut reg = registry(BoundaryConfig::uniform(BoundaryKind::Fluxless));
        let op = reg.operator_by_name("D<0,2>").unwrap();
        let old = op.set_min_policy(Box::new(Constant { value: 3.0 }));
        assert_eq!(old.kind(), BoundaryKind::Fluxless);
        let old = op.set_max_policy(Box::new(Cyclic));
        assert_eq!(old.kind(), BoundaryKind::Fluxless);
        assert_eq!(op.min_policy().kind(), BoundaryKind::Constant);

        // The registry keeps the modified operator.
        let data = [1.0, 2.0, 4.0, 8.0];
        assert_eq!(reg.partial_diff(0, 2, &field(&data), 0).unwrap(), 3.0);
        assert_eq!(reg.partial_diff(0, 2, &field(&data), 3).unwrap(), 4.0 - 16.0 + 1.0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn resolution_prefers_the_per_operator_kind() {
        let config = BoundaryConfig::uniform(BoundaryKind::Fluxless)
            .with_kind("D<1,2>", BoundaryKind::Cyclic);
        assert_eq!(config.kind_for("D<1,2>"), BoundaryKind::Cyclic);
        assert_eq!(config.kind_for("D<0,2>"), BoundaryKind::Fluxless);
        assert_eq!(BoundaryConfig::default().kind_for("D<0,1>"), BoundaryKind::Invalid);
    }

    #[test]
    fn boundary_config_deserializes() {
        let json = r#"{
            "kinds": {"D<0,2>": "CYCLIC", "D<1,1>": "CONSTANT"},
            "default_kind": "FLUXLESS",
            "min_values": {"D<1,1>": 0.5},
            "max_values": {"D<1,1>": -0.5}
        }"#;
        let config: BoundaryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind_for("D<0,2>"), BoundaryKind::Cyclic);
        assert_eq!(config.kind_for("D<3,2>"), BoundaryKind::Fluxless);
        let policy = config.policy_for("D<1,1>", BoundarySide::Max).unwrap();
        assert_eq!(policy.kind(), BoundaryKind::Constant);
    }

    #[test]
    fn multi_component_operators_read_their_component() {
        let data = [0.0, 10.0, 1.0, 20.0, 4.0, 40.0, 9.0, 80.0];
        let f = CellField::new(&data, 2);
        let mut reg = registry(BoundaryConfig::uniform(BoundaryKind::Fluxless));
        let mut second = vec![0.0; 4];
        reg.operator(1, 2)
            .unwrap()
            .apply_all(&f, 1.0, &CoefficientCache::new(), &mut second)
            .unwrap();
        assert_eq!(second, vec![0.0, 10.0, 20.0, 0.0]);
        assert_eq!(reg.partial_diff(0, 2, &f, 1).unwrap(), 2.0);
    }

    #[test]
    fn orders_above_the_cap_are_rejected() {
        let mut reg = registry(BoundaryConfig::uniform(BoundaryKind::Cyclic));
        let err = reg.operator(0, MAX_DIFFERENCE_ORDER + 1).err().unwrap();
        assert!(matches!(err, ConfigError::OrderOutOfRange { order: 33, max: 32, .. }));
        assert!(reg.is_empty());

        let data: Vec<f64> = (0..40).map(|i| f64::from(i).sin()).collect();
        let value = reg.partial_diff(0, MAX_DIFFERENCE_ORDER, &field(&data), 20).unwrap();
        assert!(value.is_finite());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn spacing_must_be_positive() {
        assert!(OperatorRegistry::new(BoundaryConfig::default(), 0.0).is_err());
        assert!(OperatorRegistry::new(BoundaryConfig::default(), f64::NAN).is_err());
    }
}
