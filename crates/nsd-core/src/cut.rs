use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ValueMap;

/// A single cutting plane over a node's shared variables.
///
/// Feasibility and no-good cuts read `sum(coefficients . x) >= rhs`;
/// optimality cuts additionally carry a unit epigraph term,
/// `sum(coefficients . x) + theta >= rhs`. Which reading applies is
/// determined by the bucket the cut lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub coefficients: ValueMap,
    pub rhs: f64,
}

impl Cut {
    pub fn new(coefficients: ValueMap, rhs: f64) -> Self {
        Self { coefficients, rhs }
    }

    pub fn coefficient(&self, var: &str, index: i64) -> f64 {
        self.coefficients
            .get(var)
            .and_then(|m| m.get(&index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Coefficient-wise comparison within `tol`, used to skip re-appending
    /// a cut the pool already holds.
    pub fn approx_eq(&self, other: &Cut, tol: f64) -> bool {
        if (self.rhs - other.rhs).abs() > tol {
            return false;
        }
        let keys = |cut: &Cut| -> Vec<(String, i64)> {
            cut.coefficients
                .iter()
                .flat_map(|(name, m)| m.keys().map(move |i| (name.clone(), *i)))
                .collect()
        };
        let mut all = keys(self);
        all.extend(keys(other));
        all.sort();
        all.dedup();
        all.iter().all(|(name, index)| {
            (self.coefficient(name, *index) - other.coefficient(name, *index)).abs() <= tol
        })
    }
}

/// The four cut families a node can accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutBucket {
    Feasibility,
    Optimality,
    BinaryFeasibility,
    BinaryOptimality,
}

impl CutBucket {
    pub const ALL: [CutBucket; 4] = [
        CutBucket::Feasibility,
        CutBucket::Optimality,
        CutBucket::BinaryFeasibility,
        CutBucket::BinaryOptimality,
    ];

    /// Optimality-kind cuts bound the epigraph variable.
    pub fn is_optimality_kind(self) -> bool {
        matches!(self, CutBucket::Optimality | CutBucket::BinaryOptimality)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CutBucket::Feasibility => "feasibility",
            CutBucket::Optimality => "optimality",
            CutBucket::BinaryFeasibility => "binary_feasibility",
            CutBucket::BinaryOptimality => "binary_optimality",
        }
    }
}

impl std::fmt::Display for CutBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only cut storage. Keys are assigned in append order and never
/// change, so injected cut rows keep a stable identity across solves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutPool {
    feasibility: BTreeMap<u64, Cut>,
    optimality: BTreeMap<u64, Cut>,
    binary_feasibility: BTreeMap<u64, Cut>,
    binary_optimality: BTreeMap<u64, Cut>,
}

impl CutPool {
    fn bucket_map(&self, bucket: CutBucket) -> &BTreeMap<u64, Cut> {
        match bucket {
            CutBucket::Feasibility => &self.feasibility,
            CutBucket::Optimality => &self.optimality,
            CutBucket::BinaryFeasibility => &self.binary_feasibility,
            CutBucket::BinaryOptimality => &self.binary_optimality,
        }
    }

    fn bucket_map_mut(&mut self, bucket: CutBucket) -> &mut BTreeMap<u64, Cut> {
        match bucket {
            CutBucket::Feasibility => &mut self.feasibility,
            CutBucket::Optimality => &mut self.optimality,
            CutBucket::BinaryFeasibility => &mut self.binary_feasibility,
            CutBucket::BinaryOptimality => &mut self.binary_optimality,
        }
    }

    /// Appends a cut and returns its key within the bucket.
    pub fn append(&mut self, bucket: CutBucket, cut: Cut) -> u64 {
        let map = self.bucket_map_mut(bucket);
        let key = map.len() as u64;
        map.insert(key, cut);
        key
    }

    pub fn bucket(&self, bucket: CutBucket) -> impl Iterator<Item = (u64, &Cut)> {
        self.bucket_map(bucket).iter().map(|(k, c)| (*k, c))
    }

    pub fn len(&self, bucket: CutBucket) -> usize {
        self.bucket_map(bucket).len()
    }

    pub fn total_len(&self) -> usize {
        CutBucket::ALL.iter().map(|b| self.len(*b)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn has_optimality_cuts(&self) -> bool {
        !self.optimality.is_empty() || !self.binary_optimality.is_empty()
    }

    pub fn contains_equivalent(&self, bucket: CutBucket, cut: &Cut, tol: f64) -> bool {
        self.bucket_map(bucket).values().any(|c| c.approx_eq(cut, tol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cut(coef: f64, rhs: f64) -> Cut {
        let mut coefficients = ValueMap::new();
        coefficients.entry("y".to_string()).or_default().insert(1, coef);
        Cut::new(coefficients, rhs)
    }

    #[test]
    fn append_assigns_monotone_keys_per_bucket() {
        let mut pool = CutPool::default();
        assert_eq!(pool.append(CutBucket::Optimality, cut(1.0, 1.0)), 0);
        assert_eq!(pool.append(CutBucket::Optimality, cut(2.0, 2.0)), 1);
        assert_eq!(pool.append(CutBucket::Feasibility, cut(3.0, 3.0)), 0);
        assert_eq!(pool.len(CutBucket::Optimality), 2);
        assert_eq!(pool.len(CutBucket::Feasibility), 1);
        assert_eq!(pool.total_len(), 3);

        let keys: Vec<u64> = pool.bucket(CutBucket::Optimality).map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 1]);
    }

    #[test]
    fn existing_keys_survive_later_appends() {
        let mut pool = CutPool::default();
        pool.append(CutBucket::BinaryOptimality, cut(1.0, 10.0));
        let before: Vec<(u64, Cut)> = pool
            .bucket(CutBucket::BinaryOptimality)
            .map(|(k, c)| (k, c.clone()))
            .collect();
        pool.append(CutBucket::BinaryOptimality, cut(2.0, 20.0));
        for (key, original) in before {
            let held = pool
                .bucket(CutBucket::BinaryOptimality)
                .find(|(k, _)| *k == key)
                .unwrap()
                .1;
            assert_eq!(*held, original);
        }
    }

    #[test]
    fn equivalent_cut_detection_uses_tolerance() {
        let mut pool = CutPool::default();
        pool.append(CutBucket::Optimality, cut(2.0, 3.0));
        assert!(pool.contains_equivalent(CutBucket::Optimality, &cut(2.0 + 1e-12, 3.0), 1e-9));
        assert!(!pool.contains_equivalent(CutBucket::Optimality, &cut(2.1, 3.0), 1e-9));
        assert!(!pool.contains_equivalent(CutBucket::Feasibility, &cut(2.0, 3.0), 1e-9));
    }

    #[test]
    fn approx_eq_checks_both_key_sets() {
        let sparse = cut(0.0, 1.0);
        let mut coefficients = ValueMap::new();
        coefficients.entry("y".to_string()).or_default().insert(2, 5.0);
        let other = Cut::new(coefficients, 1.0);
        assert!(!sparse.approx_eq(&other, 1e-9));
    }
}
