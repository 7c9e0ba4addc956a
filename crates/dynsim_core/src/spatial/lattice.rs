use std::cell::{RefCell, RefMut};
use std::fmt;

use super::operator::{BoundaryConfig, OperatorRegistry};
use super::CellField;
use crate::error::ConfigError;
use crate::traits::DynamicalSystem;

/// Method-of-lines reaction-diffusion system on a 1-D lattice:
///
/// du_c/dt = R_c(u) + D_c * d²u_c/dx²
///
/// The reaction acts on each cell separately. Diffusion of component `c`
/// goes through the `D<c,2>` operator, so its boundary behaviour comes from
/// the [`BoundaryConfig`].
pub struct ReactionDiffusion<R> {
    cells: usize,
    cell_dim: usize,
    diffusion: Vec<f64>,
    reaction: R,
    registry: RefCell<OperatorRegistry>,
}

impl<R> ReactionDiffusion<R>
where
    R: Fn(&[f64], &[f64], &mut [f64]) -> bool,
{
    pub fn new(
        cells: usize,
        diffusion: Vec<f64>,
        spacing: f64,
        boundaries: BoundaryConfig,
        reaction: R,
    ) -> Result<Self, ConfigError> {
        if cells == 0 || diffusion.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "lattice".to_string(),
                reason: "needs at least one cell and one component".to_string(),
            });
        }
        Ok(Self {
            cells,
            cell_dim: diffusion.len(),
            diffusion,
            reaction,
            registry: RefCell::new(OperatorRegistry::new(boundaries, spacing)?),
        })
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn cell_dim(&self) -> usize {
        self.cell_dim
    }

    /// Access to the operators, e.g. to swap a boundary policy.
    ///
    /// Evaluations fail while the returned guard is alive, so drop it before
    /// integrating.
    pub fn registry(&self) -> RefMut<'_, OperatorRegistry> {
        self.registry.borrow_mut()
    }

    fn diffuse(
        &self,
        registry: &mut OperatorRegistry,
        field: &CellField<'_>,
        out: &mut [f64],
    ) -> Result<(), ConfigError> {
        for (component, &rate) in self.diffusion.iter().enumerate() {
            if rate == 0.0 {
                continue;
            }
            for cell in 0..self.cells {
                let laplacian = registry.partial_diff(component, 2, field, cell)?;
                out[cell * self.cell_dim + component] += rate * laplacian;
            }
        }
        Ok(())
    }
}

impl<R> fmt::Debug for ReactionDiffusion<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionDiffusion")
            .field("cells", &self.cells)
            .field("diffusion", &self.diffusion)
            .finish_non_exhaustive()
    }
}

impl<R> DynamicalSystem for ReactionDiffusion<R>
where
    R: Fn(&[f64], &[f64], &mut [f64]) -> bool,
{
    fn dimension(&self) -> usize {
        self.cells * self.cell_dim
    }

    fn apply(&self, x: &[f64], params: &[f64], out: &mut [f64]) -> bool {
        let d = self.cell_dim;
        for cell in 0..self.cells {
            let range = cell * d..(cell + 1) * d;
            if !(self.reaction)(&x[range.clone()], params, &mut out[range]) {
                return false;
            }
        }
        let Ok(mut registry) = self.registry.try_borrow_mut() else {
            log::error!("lattice right-hand side called while the operator registry is borrowed");
            return false;
        };
        let field = CellField::new(x, d);
        match self.diffuse(&mut registry, &field, out) {
            Ok(()) => true,
            Err(err) => {
                log::error!("lattice right-hand side failed: {}", err);
                false
            }
        }
    }
}
