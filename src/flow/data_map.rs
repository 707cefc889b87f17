use serde::{Deserialize, Serialize};

/// One input wiring: `target` is a field of the node's input, `source` an
/// expression evaluated by the engine against the flow context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub target: String,
    pub source: String,
}

impl Assignment {
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Ordered, append-only list of assignments attached to a node's input.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataMap {
    #[serde(default)]
    maps: Vec<Assignment>,
}

impl DataMap {
    pub fn new() -> Self {
        Self { maps: Vec::new() }
    }

    pub fn add(&mut self, assignment: Assignment) -> &mut Self {
        self.maps.push(assignment);
        self
    }

    pub fn with(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.maps.push(Assignment::new(target, source));
        self
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl FromIterator<Assignment> for DataMap {
    fn from_iter<I: IntoIterator<Item = Assignment>>(iter: I) -> Self {
        Self {
            maps: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_assignment_order() {
        let mut map = DataMap::new().with("x", "flow.input.x");
        map.add(Assignment::new("y", "lookup.output.name"));
        let targets: Vec<_> = map.assignments().iter().map(|a| a.target.as_str()).collect();
        assert_eq!(targets, vec!["x", "y"]);
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            json!({ "maps": [
                { "target": "x", "source": "flow.input.x" },
                { "target": "y", "source": "lookup.output.name" }
            ]})
        );
    }
}
