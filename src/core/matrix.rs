//! Matrix expansion - turns declared axes into concrete job instances

use serde::{Deserialize, Serialize};

/// A named configuration dimension with an ordered set of values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Check whether a value is declared on this axis
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// A partial assignment that removes matching combinations from the matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    /// (axis, value) pairs; a combination matches when it agrees on all of them
    pub constraints: Vec<(String, String)>,
}

impl ExclusionRule {
    pub fn new<I, K, V>(constraints: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            constraints: constraints
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Check if an assignment agrees with every constrained axis
    pub fn matches(&self, assignment: &[(String, String)]) -> bool {
        self.constraints.iter().all(|(axis, value)| {
            assignment
                .iter()
                .any(|(a, v)| a == axis && v == value)
        })
    }
}

/// One concrete point in the expanded matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInstance {
    /// Position in the expanded list (carries no scheduling meaning)
    pub index: usize,

    /// One value per axis, in axis declaration order
    pub assignment: Vec<(String, String)>,
}

impl JobInstance {
    /// Get the value assigned to an axis
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|(a, _)| a == axis)
            .map(|(_, v)| v.as_str())
    }

    /// Display name: `base (v1, v2)`, or just `base` for an empty assignment
    pub fn name(&self, base: &str) -> String {
        if self.assignment.is_empty() {
            return base.to_string();
        }
        let values: Vec<&str> = self.assignment.iter().map(|(_, v)| v.as_str()).collect();
        format!("{} ({})", base, values.join(", "))
    }

    /// Filesystem-safe identifier, unique within one expansion
    pub fn slug(&self) -> String {
        let mut slug = format!("job-{}", self.index);
        for (_, value) in &self.assignment {
            slug.push('-');
            slug.extend(value.chars().map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                    c
                } else {
                    '_'
                }
            }));
        }
        slug
    }
}

/// Axis declaration plus exclusions, immutable once built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    pub axes: Vec<Axis>,
    pub exclusions: Vec<ExclusionRule>,
}

impl Matrix {
    pub fn new(axes: Vec<Axis>, exclusions: Vec<ExclusionRule>) -> Self {
        Self { axes, exclusions }
    }

    /// Look up an axis by name
    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Number of combinations before exclusions are applied
    pub fn product_size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Expand into job instances.
    ///
    /// Cartesian product in declaration order (the last axis varies
    /// fastest), minus every combination matched by an exclusion rule.
    /// An empty result is valid and means there is nothing to run.
    pub fn expand(&self) -> Vec<JobInstance> {
        let mut combinations: Vec<Vec<(String, String)>> = vec![Vec::new()];

        for axis in &self.axes {
            let mut next = Vec::with_capacity(combinations.len() * axis.values.len());
            for partial in &combinations {
                for value in &axis.values {
                    let mut extended = partial.clone();
                    extended.push((axis.name.clone(), value.clone()));
                    next.push(extended);
                }
            }
            combinations = next;
        }

        combinations
            .into_iter()
            .filter(|assignment| !self.exclusions.iter().any(|rule| rule.matches(assignment)))
            .enumerate()
            .map(|(index, assignment)| JobInstance { index, assignment })
            .collect()
    }
}
