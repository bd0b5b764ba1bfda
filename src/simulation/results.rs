use crate::compute::ledger::Value;
use serde::Serialize;

/// Values recorded at each save point of a run, one row per recorded time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationResults {
    pub columns: Vec<String>,
    pub times: Vec<f64>,
    pub rows: Vec<Vec<Value>>,
}

impl SimulationResults {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, times: Vec::new(), rows: Vec::new() }
    }

    pub fn push(&mut self, time: f64, row: Vec<Value>) {
        self.times.push(time);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize { self.times.len() }
    pub fn is_empty(&self) -> bool { self.times.is_empty() }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// The column as plain numbers; `None` if it is missing or array-valued.
    pub fn series(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name)?.into_iter().map(Value::as_scalar).collect()
    }

    /// Value of `name` at the recorded time closest to `time`.
    pub fn at(&self, time: f64, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        let row = self
            .times
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - time).abs().total_cmp(&(*b - time).abs()))?
            .0;
        Some(&self.rows[row][idx])
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SimulationResults {
        let mut res = SimulationResults::new(vec!["stock".into(), "levels".into()]);
        res.push(0.0, vec![Value::Scalar(1.0), Value::from(vec![1.0, 2.0])]);
        res.push(0.5, vec![Value::Scalar(2.0), Value::from(vec![3.0, 4.0])]);
        res
    }

    #[test]
    fn test_series() {
        let res = sample();
        assert_eq!(res.series("stock"), Some(vec![1.0, 2.0]));
        assert_eq!(res.series("levels"), None);
        assert_eq!(res.series("missing"), None);
    }

    #[test]
    fn test_at_nearest_time() {
        let res = sample();
        assert_eq!(res.at(0.4, "stock"), Some(&Value::Scalar(2.0)));
        assert_eq!(res.at(-3.0, "stock"), Some(&Value::Scalar(1.0)));
    }

    #[test]
    fn test_json_export() {
        let json = sample().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"columns":["stock","levels"],"times":[0.0,0.5],"rows":[[1.0,[1.0,2.0]],[2.0,[3.0,4.0]]]}"#
        );
    }
}
