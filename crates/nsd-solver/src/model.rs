//! Solver-independent linear model with stable declaration order.
//!
//! Variables and rows keep the `(name, index)` identity the rest of the
//! engine speaks; positions are only an internal handle. Declaration order
//! is deterministic, so two builds of the same template agree column for
//! column.

use std::collections::HashMap;

use nsd_core::{CoefTerm, ConstraintInfo};

/// Violation variables added by the phase-1 reformulation carry this name;
/// the adapter filters them out of solution records.
pub const VIOLATION_VAR: &str = "_viol";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOp {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub index: i64,
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct LinTerm {
    pub var: usize,
    pub coef: f64,
}

#[derive(Debug, Clone)]
pub struct RowDef {
    pub name: String,
    pub index: i64,
    pub terms: Vec<LinTerm>,
    pub op: RowOp,
    pub rhs: f64,
}

#[derive(Debug, Clone, Default)]
pub struct LinearModel {
    vars: Vec<VarDef>,
    rows: Vec<RowDef>,
    lookup: HashMap<(String, i64), usize>,
}

impl LinearModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a continuous variable and returns its position.
    pub fn add_var(&mut self, name: &str, index: i64, lower: f64, upper: f64) -> usize {
        debug_assert!(
            !self.lookup.contains_key(&(name.to_string(), index)),
            "variable {name}[{index}] declared twice"
        );
        let pos = self.vars.len();
        self.vars.push(VarDef {
            name: name.to_string(),
            index,
            lower,
            upper,
            integer: false,
            objective: 0.0,
        });
        self.lookup.insert((name.to_string(), index), pos);
        pos
    }

    /// Declares a binary variable and returns its position.
    pub fn add_binary_var(&mut self, name: &str, index: i64) -> usize {
        let pos = self.add_var(name, index, 0.0, 1.0);
        self.vars[pos].integer = true;
        pos
    }

    pub fn set_objective(&mut self, var: usize, coef: f64) {
        self.vars[var].objective = coef;
    }

    /// Adds a row; `terms` are `(variable position, coefficient)` pairs.
    pub fn add_row(&mut self, name: &str, index: i64, terms: Vec<(usize, f64)>, op: RowOp, rhs: f64) {
        self.rows.push(RowDef {
            name: name.to_string(),
            index,
            terms: terms
                .into_iter()
                .map(|(var, coef)| LinTerm { var, coef })
                .collect(),
            op,
            rhs,
        });
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn rows(&self) -> &[RowDef] {
        &self.rows
    }

    pub fn var_position(&self, name: &str, index: i64) -> Option<usize> {
        self.lookup.get(&(name.to_string(), index)).copied()
    }

    /// Pins a variable to a value via its bounds.
    pub fn fix(&mut self, var: usize, value: f64) {
        self.vars[var].lower = value;
        self.vars[var].upper = value;
    }

    /// Pins `name[index]` if the model declares it. Returns whether it did.
    pub fn fix_if_present(&mut self, name: &str, index: i64, value: f64) -> bool {
        match self.var_position(name, index) {
            Some(pos) => {
                self.fix(pos, value);
                true
            }
            None => false,
        }
    }

    pub fn tighten_lower(&mut self, var: usize, lower: f64) {
        self.vars[var].lower = self.vars[var].lower.max(lower);
    }

    pub fn tighten_upper(&mut self, var: usize, upper: f64) {
        self.vars[var].upper = self.vars[var].upper.min(upper);
    }

    pub fn relax_integrality(&mut self) {
        for var in &mut self.vars {
            var.integer = false;
        }
    }

    pub fn has_integer_vars(&self) -> bool {
        self.vars.iter().any(|v| v.integer)
    }

    pub fn integer_positions(&self) -> Vec<usize> {
        self.vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.integer)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Column-wise view of the rows, keyed by the `(name, index)` identities
    /// cut generation uses.
    pub fn constraint_info(&self) -> ConstraintInfo {
        let mut info = ConstraintInfo::default();
        for row in &self.rows {
            info.set_rhs(&row.name, row.index, row.rhs);
            for term in &row.terms {
                let var = &self.vars[term.var];
                info.push_term(
                    &var.name,
                    var.index,
                    CoefTerm {
                        coef: term.coef,
                        constraint: row.name.clone(),
                        row: row.index,
                    },
                );
            }
        }
        info
    }

    /// Phase-1 reformulation: the objective becomes the total constraint
    /// violation. Every row keeps its name, index and operator and gains a
    /// non-negative violation variable on its slack side, so any point
    /// within the variable bounds is feasible and the row duals keep their
    /// original identities. Integrality is dropped (phase-1 duals come from
    /// the relaxation).
    pub fn phase1(&self) -> LinearModel {
        let mut model = self.clone();
        model.relax_integrality();
        for var in &mut model.vars {
            var.objective = 0.0;
        }
        for row in 0..model.rows.len() {
            let index = row as i64;
            match model.rows[row].op {
                RowOp::Ge => {
                    let viol = model.add_var(VIOLATION_VAR, index, 0.0, f64::INFINITY);
                    model.set_objective(viol, 1.0);
                    model.rows[row].terms.push(LinTerm { var: viol, coef: 1.0 });
                }
                RowOp::Le => {
                    let viol = model.add_var(VIOLATION_VAR, index, 0.0, f64::INFINITY);
                    model.set_objective(viol, 1.0);
                    model.rows[row].terms.push(LinTerm { var: viol, coef: -1.0 });
                }
                RowOp::Eq => {
                    // Two one-sided violations; encode the pair as 2k/2k+1
                    // offsets past the row count to keep indices unique.
                    let base = (model.rows.len() + row) as i64;
                    let up = model.add_var(VIOLATION_VAR, base * 2, 0.0, f64::INFINITY);
                    let down = model.add_var(VIOLATION_VAR, base * 2 + 1, 0.0, f64::INFINITY);
                    model.set_objective(up, 1.0);
                    model.set_objective(down, 1.0);
                    model.rows[row].terms.push(LinTerm { var: up, coef: 1.0 });
                    model.rows[row].terms.push(LinTerm { var: down, coef: -1.0 });
                }
            }
        }
        model
    }
}
