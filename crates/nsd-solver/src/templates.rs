//! Compile-time registry of subproblem templates.
//!
//! A template is a plain function from [`NodeData`] to a [`LinearModel`];
//! the registry maps the `(file, function)` pair a tree file names to that
//! function. Variable and row declaration order inside a builder is fixed,
//! so repeated builds of a node are identical column for column.
//!
//! Two families ship built in:
//!
//! - `production`: the multistage production/storage planning problem
//!   (produce `x` under capacity, purchase `w` at premium, carry storage `y`
//!   between stages; Birge & Louveaux ch. 1.2 shape);
//! - `resources`: a binary first stage selecting resources `z`, with a
//!   continuous second stage dispatching them against a demand.
//!
//! All rows are posed in `>=` form so every dual the engine consumes is a
//! plain non-negative shadow price.

use std::collections::{BTreeMap, HashMap};

use nsd_algo::TemplateError;
use nsd_core::{NodeData, TemplateRef};

use crate::model::{LinearModel, RowOp};

pub type BuildFn = fn(&NodeData) -> Result<LinearModel, TemplateError>;

pub struct TemplateRegistry {
    builders: HashMap<(String, String), BuildFn>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in template families.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("production", "stage1", production_stage1);
        registry.register("production", "stage2", production_stage2);
        registry.register("production", "stage3", production_stage3);
        registry.register("resources", "stage1", resources_stage1);
        registry.register("resources", "stage2", resources_stage2);
        registry
    }

    pub fn register(&mut self, file: &str, function: &str, build: BuildFn) {
        self.builders
            .insert((file.to_string(), function.to_string()), build);
    }

    pub fn build(
        &self,
        template: &TemplateRef,
        data: &NodeData,
    ) -> Result<LinearModel, TemplateError> {
        let build = self
            .builders
            .get(&(template.file.clone(), template.function.clone()))
            .ok_or_else(|| TemplateError::Unknown {
                file: template.file.clone(),
                function: template.function.clone(),
            })?;
        build(data)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn scalar(data: &NodeData, template: &str, name: &str) -> Result<f64, TemplateError> {
    let value = data
        .params
        .get(name)
        .ok_or_else(|| TemplateError::MissingParam {
            template: template.to_string(),
            name: name.to_string(),
        })?;
    value.as_scalar().ok_or_else(|| TemplateError::InvalidParam {
        template: template.to_string(),
        name: name.to_string(),
    })
}

fn indexed<'a>(
    data: &'a NodeData,
    template: &str,
    name: &str,
) -> Result<&'a BTreeMap<i64, f64>, TemplateError> {
    let value = data
        .params
        .get(name)
        .ok_or_else(|| TemplateError::MissingParam {
            template: template.to_string(),
            name: name.to_string(),
        })?;
    value.as_indexed().ok_or_else(|| TemplateError::InvalidParam {
        template: template.to_string(),
        name: name.to_string(),
    })
}

fn members<'a>(data: &'a NodeData, template: &str, name: &str) -> Result<&'a [i64], TemplateError> {
    data.sets
        .get(name)
        .map(|s| s.as_slice())
        .ok_or_else(|| TemplateError::MissingSet {
            template: template.to_string(),
            name: name.to_string(),
        })
}

/// Stage `s` of the production problem. Stages past the first redeclare the
/// incoming storage `y[s-1]`, which the parent's solution pins.
fn production_stage(data: &NodeData, stage: i64) -> Result<LinearModel, TemplateError> {
    const NAME: &str = "production";
    let prod = scalar(data, NAME, "prod")?;
    let cost = scalar(data, NAME, "cost")?;
    let high_cost = scalar(data, NAME, "high_cost")?;
    let store_cost = scalar(data, NAME, "store_cost")?;
    let demand = scalar(data, NAME, "demand")?;

    let mut model = LinearModel::new();
    let x = model.add_var("x", stage, 0.0, f64::INFINITY);
    let w = model.add_var("w", stage, 0.0, f64::INFINITY);
    let y_in = if stage > 1 {
        Some(model.add_var("y", stage - 1, 0.0, f64::INFINITY))
    } else {
        None
    };
    let y = model.add_var("y", stage, 0.0, f64::INFINITY);
    model.set_objective(x, cost);
    model.set_objective(w, high_cost);
    model.set_objective(y, store_cost);

    // x[s] <= prod, posed as >=.
    model.add_row("capacity", stage, vec![(x, -1.0)], RowOp::Ge, -prod);
    // x[s] + w[s] + y[s-1] - y[s] >= demand.
    let mut balance = vec![(x, 1.0), (w, 1.0), (y, -1.0)];
    if let Some(y_in) = y_in {
        balance.push((y_in, 1.0));
    }
    model.add_row("demand", stage, balance, RowOp::Ge, demand);
    Ok(model)
}

fn production_stage1(data: &NodeData) -> Result<LinearModel, TemplateError> {
    production_stage(data, 1)
}

fn production_stage2(data: &NodeData) -> Result<LinearModel, TemplateError> {
    production_stage(data, 2)
}

fn production_stage3(data: &NodeData) -> Result<LinearModel, TemplateError> {
    production_stage(data, 3)
}

/// Binary resource selection: pay `price[i]` for each resource taken.
fn resources_stage1(data: &NodeData) -> Result<LinearModel, TemplateError> {
    const NAME: &str = "resources";
    let resources = members(data, NAME, "resources")?;
    let price = indexed(data, NAME, "price")?;

    let mut model = LinearModel::new();
    for i in resources {
        let z = model.add_binary_var("z", *i);
        let cost = price
            .get(i)
            .copied()
            .ok_or_else(|| TemplateError::InvalidParam {
                template: NAME.to_string(),
                name: "price".to_string(),
            })?;
        model.set_objective(z, cost);
    }
    Ok(model)
}

/// Dispatch the selected resources: usage `q[i]` up to `capacity[i] z[i]`,
/// covering `demand` at `opcost[i]` per unit.
fn resources_stage2(data: &NodeData) -> Result<LinearModel, TemplateError> {
    const NAME: &str = "resources";
    let resources = members(data, NAME, "resources")?;
    let capacity = indexed(data, NAME, "capacity")?;
    let opcost = indexed(data, NAME, "opcost")?;
    let demand = scalar(data, NAME, "demand")?;

    let mut model = LinearModel::new();
    let mut selections = Vec::with_capacity(resources.len());
    let mut usages = Vec::with_capacity(resources.len());
    for i in resources {
        selections.push((*i, model.add_binary_var("z", *i)));
    }
    for i in resources {
        let q = model.add_var("q", *i, 0.0, f64::INFINITY);
        let cost = opcost
            .get(i)
            .copied()
            .ok_or_else(|| TemplateError::InvalidParam {
                template: NAME.to_string(),
                name: "opcost".to_string(),
            })?;
        model.set_objective(q, cost);
        usages.push((*i, q));
    }

    for ((i, z), (_, q)) in selections.iter().zip(&usages) {
        let cap = capacity
            .get(i)
            .copied()
            .ok_or_else(|| TemplateError::InvalidParam {
                template: NAME.to_string(),
                name: "capacity".to_string(),
            })?;
        // capacity[i] z[i] - q[i] >= 0.
        model.add_row("avail", *i, vec![(*z, cap), (*q, -1.0)], RowOp::Ge, 0.0);
    }
    let cover = usages.iter().map(|(_, q)| (*q, 1.0)).collect();
    model.add_row("cover", 1, cover, RowOp::Ge, demand);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsd_core::ParamValue;

    fn production_data() -> NodeData {
        let mut data = NodeData::default();
        for (name, value) in [
            ("prod", 2.0),
            ("cost", 1.0),
            ("high_cost", 3.0),
            ("store_cost", 0.5),
            ("demand", 1.0),
        ] {
            data.params.insert(name.to_string(), ParamValue::Scalar(value));
        }
        data
    }

    #[test]
    fn unknown_template_is_an_error() {
        let registry = TemplateRegistry::builtin();
        let err = registry
            .build(&TemplateRef::new("production", "stage9"), &production_data())
            .unwrap_err();
        assert!(matches!(err, TemplateError::Unknown { .. }));
    }

    #[test]
    fn missing_parameter_is_reported_by_name() {
        let registry = TemplateRegistry::builtin();
        let mut data = production_data();
        data.params.remove("high_cost");
        let err = registry
            .build(&TemplateRef::new("production", "stage2"), &data)
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingParam {
                template: "production".to_string(),
                name: "high_cost".to_string(),
            }
        );
    }

    #[test]
    fn wrong_parameter_shape_is_reported() {
        let registry = TemplateRegistry::builtin();
        let mut data = production_data();
        data.params.insert(
            "demand".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 1.0)])),
        );
        let err = registry
            .build(&TemplateRef::new("production", "stage1"), &data)
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidParam { .. }));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let registry = TemplateRegistry::builtin();
        let data = production_data();
        let template = TemplateRef::new("production", "stage2");
        let a = registry.build(&template, &data).unwrap();
        let b = registry.build(&template, &data).unwrap();
        let names = |m: &LinearModel| -> Vec<(String, i64)> {
            m.vars().iter().map(|v| (v.name.clone(), v.index)).collect()
        };
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.rows().len(), b.rows().len());
        assert_eq!(a.constraint_info(), b.constraint_info());
    }

    #[test]
    fn later_stages_redeclare_incoming_storage() {
        let registry = TemplateRegistry::builtin();
        let stage1 = registry
            .build(&TemplateRef::new("production", "stage1"), &production_data())
            .unwrap();
        let stage2 = registry
            .build(&TemplateRef::new("production", "stage2"), &production_data())
            .unwrap();
        assert!(stage1.var_position("y", 1).is_some());
        assert!(stage1.var_position("y", 0).is_none());
        assert!(stage2.var_position("y", 1).is_some());
        assert!(stage2.var_position("y", 2).is_some());
        assert!(!stage1.has_integer_vars());
    }

    #[test]
    fn resource_templates_declare_binaries() {
        let registry = TemplateRegistry::builtin();
        let mut data = NodeData::default();
        data.sets.insert("resources".to_string(), vec![1, 2]);
        data.params.insert(
            "price".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 10.0), (2, 50.0)])),
        );
        let stage1 = registry
            .build(&TemplateRef::new("resources", "stage1"), &data)
            .unwrap();
        assert_eq!(stage1.integer_positions().len(), 2);
        assert_eq!(stage1.rows().len(), 0);

        data.params.insert(
            "capacity".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 5.0), (2, 20.0)])),
        );
        data.params.insert(
            "opcost".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 1.0), (2, 1.0)])),
        );
        data.params
            .insert("demand".to_string(), ParamValue::Scalar(15.0));
        let stage2 = registry
            .build(&TemplateRef::new("resources", "stage2"), &data)
            .unwrap();
        // One availability row per resource plus the cover row.
        assert_eq!(stage2.rows().len(), 3);
        assert!(stage2.var_position("q", 2).is_some());
        assert!(stage2.has_integer_vars());
    }
}
