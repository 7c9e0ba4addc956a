//! Explicit one-step Runge-Kutta steppers with hard-coded tableaux.
//!
//! Each stepper reuses f(y) cached in the history entry as its first stage.

use super::{euler_forward, Stepper};
use crate::history::History;
use crate::proxy::RhsProxy;

/// Forward Euler: y + h f(y).
#[derive(Debug, Default)]
pub struct EulerForward;

impl EulerForward {
    pub fn new() -> Self {
        Self
    }
}

impl Stepper for EulerForward {
    fn name(&self) -> &'static str {
        "euler_forward"
    }

    fn order(&self) -> usize {
        1
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        euler_forward(proxy, h, history, out)
    }
}

/// Heun's method (explicit trapezoid).
#[derive(Debug)]
pub struct Heun {
    k2: Vec<f64>,
    tmp: Vec<f64>,
}

impl Heun {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Heun {
    fn name(&self) -> &'static str {
        "heun"
    }

    fn order(&self) -> usize {
        2
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * k1[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i] + 0.5 * h * (k1[i] + self.k2[i]);
        }
        true
    }
}

/// Explicit midpoint rule.
#[derive(Debug)]
pub struct Midpoint {
    k2: Vec<f64>,
    tmp: Vec<f64>,
}

impl Midpoint {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Midpoint {
    fn name(&self) -> &'static str {
        "midpoint"
    }

    fn order(&self) -> usize {
        2
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        for i in 0..y.len() {
            self.tmp[i] = y[i] + 0.5 * h * k1[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i] + h * self.k2[i];
        }
        true
    }
}

/// Ralston's second order method (minimal error bound among two-stage methods).
#[derive(Debug)]
pub struct Ralston {
    k2: Vec<f64>,
    tmp: Vec<f64>,
}

impl Ralston {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Ralston {
    fn name(&self) -> &'static str {
        "ralston"
    }

    fn order(&self) -> usize {
        2
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        let two_thirds = 2.0 / 3.0;

        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        for i in 0..y.len() {
            self.tmp[i] = y[i] + two_thirds * h * k1[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i] + h * (0.25 * k1[i] + 0.75 * self.k2[i]);
        }
        true
    }
}

/// Three-stage explicit method with Radau nodes c = (0, 1/3, 2/3).
#[derive(Debug)]
pub struct Radau {
    k2: Vec<f64>,
    k3: Vec<f64>,
    tmp: Vec<f64>,
}

impl Radau {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Radau {
    fn name(&self) -> &'static str {
        "radau"
    }

    fn order(&self) -> usize {
        3
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        let third = 1.0 / 3.0;
        let two_thirds = 2.0 / 3.0;

        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        // k2 = f(y + h/3 k1)
        for i in 0..y.len() {
            self.tmp[i] = y[i] + third * h * k1[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        // k3 = f(y + 2h/3 k2)
        for i in 0..y.len() {
            self.tmp[i] = y[i] + two_thirds * h * self.k2[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k3) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i] + h * (0.25 * k1[i] + 0.75 * self.k3[i]);
        }
        true
    }
}

/// Classic Runge-Kutta 4th Order Solver
#[derive(Debug)]
pub struct Rk44 {
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rk44 {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Rk44 {
    fn name(&self) -> &'static str {
        "rk44"
    }

    fn order(&self) -> usize {
        4
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        let half = 0.5;
        let sixth = 1.0 / 6.0;

        // k1 = f(y)
        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        // k2 = f(y + h*k1/2)
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * k1[i] * half;
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        // k3 = f(y + h*k2/2)
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * self.k2[i] * half;
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k3) {
            return false;
        }

        // k4 = f(y + h*k3)
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * self.k3[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k4) {
            return false;
        }

        // y_next = y + h/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..y.len() {
            out[i] = y[i] + h * sixth * (k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }
        true
    }
}

/// Gill's variant of the classic fourth order method.
#[derive(Debug)]
pub struct Gill44 {
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    tmp: Vec<f64>,
}

impl Gill44 {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Gill44 {
    fn name(&self) -> &'static str {
        "gill44"
    }

    fn order(&self) -> usize {
        4
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        let r = std::f64::consts::FRAC_1_SQRT_2;
        let a31 = -0.5 + r;
        let a32 = 1.0 - r;
        let a42 = -r;
        let a43 = 1.0 + r;
        let b2 = 1.0 - r;
        let b3 = 1.0 + r;

        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        for i in 0..y.len() {
            self.tmp[i] = y[i] + 0.5 * h * k1[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * (a31 * k1[i] + a32 * self.k2[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k3) {
            return false;
        }

        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * (a42 * self.k2[i] + a43 * self.k3[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k4) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i]
                + h / 6.0 * (k1[i] + 2.0 * b2 * self.k2[i] + 2.0 * b3 * self.k3[i] + self.k4[i]);
        }
        true
    }
}

/// Runge-Kutta-Merson: five stages, fourth order.
#[derive(Debug)]
pub struct Rkm45 {
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rkm45 {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Rkm45 {
    fn name(&self) -> &'static str {
        "rkm45"
    }

    fn order(&self) -> usize {
        4
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        let third = 1.0 / 3.0;
        let sixth = 1.0 / 6.0;

        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        // k2 = f(y + h/3 k1)
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * third * k1[i];
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        // k3 = f(y + h/6 (k1 + k2))
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * sixth * (k1[i] + self.k2[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k3) {
            return false;
        }

        // k4 = f(y + h/8 (k1 + 3 k3))
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * 0.125 * (k1[i] + 3.0 * self.k3[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k4) {
            return false;
        }

        // k5 = f(y + h (k1/2 - 3/2 k3 + 2 k4))
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * (0.5 * k1[i] - 1.5 * self.k3[i] + 2.0 * self.k4[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k5) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i] + h * sixth * (k1[i] + 4.0 * self.k4[i] + self.k5[i]);
        }
        true
    }
}

/// Runge-Kutta-Fehlberg, six stages, advanced with the fifth order weights.
#[derive(Debug)]
pub struct Rkf456 {
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    tmp: Vec<f64>,
}

impl Rkf456 {
    pub fn new(dim: usize) -> Self {
        Self {
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }
}

impl Stepper for Rkf456 {
    fn name(&self) -> &'static str {
        "rkf456"
    }

    fn order(&self) -> usize {
        5
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        let a21 = 0.25;

        let a31 = 3.0 / 32.0;
        let a32 = 9.0 / 32.0;

        let a41 = 1932.0 / 2197.0;
        let a42 = -7200.0 / 2197.0;
        let a43 = 7296.0 / 2197.0;

        let a51 = 439.0 / 216.0;
        let a52 = -8.0;
        let a53 = 3680.0 / 513.0;
        let a54 = -845.0 / 4104.0;

        let a61 = -8.0 / 27.0;
        let a62 = 2.0;
        let a63 = -3544.0 / 2565.0;
        let a64 = 1859.0 / 4104.0;
        let a65 = -11.0 / 40.0;

        // b coefficients (5th order)
        let b1 = 16.0 / 135.0;
        let b3 = 6656.0 / 12825.0;
        let b4 = 28561.0 / 56430.0;
        let b5 = -9.0 / 50.0;
        let b6 = 2.0 / 55.0;

        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        let k1 = history.rhs(0);

        // k2
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * (a21 * k1[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k2) {
            return false;
        }

        // k3
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * (a31 * k1[i] + a32 * self.k2[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k3) {
            return false;
        }

        // k4
        for i in 0..y.len() {
            self.tmp[i] = y[i] + h * (a41 * k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k4) {
            return false;
        }

        // k5
        for i in 0..y.len() {
            self.tmp[i] =
                y[i] + h * (a51 * k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k5) {
            return false;
        }

        // k6
        for i in 0..y.len() {
            self.tmp[i] = y[i]
                + h * (a61 * k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        if !proxy.call_system_function(&self.tmp, &mut self.k6) {
            return false;
        }

        for i in 0..y.len() {
            out[i] = y[i]
                + h * (b1 * k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        true
    }
}
