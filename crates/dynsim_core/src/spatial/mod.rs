//! Finite differences on one-dimensional cellular lattices.
//!
//! A lattice state is a flat vector of `cells * cell_dim` values laid out cell
//! by cell. [`DifferenceOperator`]s named `D<component,order>` differentiate
//! one component along the lattice; near the ends they defer to a
//! [`BoundaryPolicy`]. Operators are materialized on demand by an
//! [`OperatorRegistry`] from a [`BoundaryConfig`].

pub mod boundary;
pub mod coefficients;
pub mod lattice;
pub mod operator;
pub mod scheme;

pub use boundary::{
    BoundaryContext, BoundaryKind, BoundaryPolicy, Constant, Cyclic, Fluxless, Interpolated,
    Invalid,
};
pub use coefficients::CoefficientCache;
pub use lattice::ReactionDiffusion;
pub use operator::{BoundaryConfig, DifferenceOperator, OperatorRegistry};
pub use scheme::{DifferenceScheme, MAX_DIFFERENCE_ORDER};

/// Anything a difference stencil can be evaluated on.
pub trait Samples {
    fn sample(&self, index: isize) -> f64;
}

/// Borrowed lattice state.
#[derive(Debug, Clone, Copy)]
pub struct CellField<'a> {
    data: &'a [f64],
    cell_dim: usize,
}

impl<'a> CellField<'a> {
    pub fn new(data: &'a [f64], cell_dim: usize) -> Self {
        assert!(cell_dim > 0, "cells need at least one component");
        assert_eq!(
            data.len() % cell_dim,
            0,
            "state length {} is not a multiple of the cell dimension {}",
            data.len(),
            cell_dim
        );
        Self { data, cell_dim }
    }

    pub fn cells(&self) -> usize {
        self.data.len() / self.cell_dim
    }

    pub fn cell_dim(&self) -> usize {
        self.cell_dim
    }

    pub fn cell(&self, index: usize) -> &'a [f64] {
        &self.data[index * self.cell_dim..(index + 1) * self.cell_dim]
    }

    pub fn component(&self, component: usize) -> ComponentView<'a> {
        assert!(
            component < self.cell_dim,
            "component {} out of range (cell dimension {})",
            component,
            self.cell_dim
        );
        ComponentView {
            data: self.data,
            cell_dim: self.cell_dim,
            component,
        }
    }
}

/// One component of every cell.
#[derive(Debug, Clone, Copy)]
pub struct ComponentView<'a> {
    data: &'a [f64],
    cell_dim: usize,
    component: usize,
}

impl<'a> ComponentView<'a> {
    pub fn len(&self) -> usize {
        self.data.len() / self.cell_dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.data[index * self.cell_dim + self.component]
    }

    /// The same component with indices taken modulo the lattice length.
    pub fn cyclic(self) -> CyclicView<'a> {
        CyclicView(self)
    }
}

impl Samples for ComponentView<'_> {
    fn sample(&self, index: isize) -> f64 {
        debug_assert!(index >= 0, "stencil reached below the first cell");
        self.get(index as usize)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CyclicView<'a>(ComponentView<'a>);

impl Samples for CyclicView<'_> {
    fn sample(&self, index: isize) -> f64 {
        let n = self.0.len() as isize;
        self.0.get(index.rem_euclid(n) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_layout_is_cell_major() {
        let data = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let field = CellField::new(&data, 2);
        assert_eq!(field.cells(), 3);
        assert_eq!(field.cell(1), &[2.0, 20.0]);
        assert_eq!(field.component(1).get(2), 30.0);
    }

    #[test]
    fn cyclic_view_wraps_both_ways() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let view = CellField::new(&data, 1).component(0).cyclic();
        assert_eq!(view.sample(-1), 4.0);
        assert_eq!(view.sample(4), 1.0);
        assert_eq!(view.sample(-5), 4.0);
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn ragged_state_is_rejected() {
        CellField::new(&[1.0, 2.0, 3.0], 2);
    }
}
