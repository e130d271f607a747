use super::Path;
use crate::record::{Record, RecordValue};

/// Statistics of the paths collected by a path collector.
#[derive(Default, Debug, Clone)]
pub struct PathStatistics {
    num_steps_total: usize,
    num_paths_total: usize,
    returns: Vec<f32>,
    lengths: Vec<usize>,
    num_aborted: usize,
    operator_names: Vec<String>,
    completions: Vec<usize>,
}

fn mean(vs: &[f32]) -> f32 {
    if vs.is_empty() {
        0.0
    } else {
        vs.iter().sum::<f32>() / vs.len() as f32
    }
}

impl PathStatistics {
    /// Adds paths collected in the current epoch.
    pub fn update(&mut self, paths: &[Path], operator_names: &[String]) {
        if self.operator_names.as_slice() != operator_names {
            self.operator_names = operator_names.to_vec();
            self.completions = vec![0; operator_names.len()];
        }
        for path in paths.iter() {
            self.num_steps_total += path.len();
            self.num_paths_total += 1;
            self.returns.push(path.total_return);
            self.lengths.push(path.len());
            self.num_aborted += path.is_aborted() as usize;
            for (c, n) in self
                .completions
                .iter_mut()
                .zip(path.completions(operator_names.len()))
            {
                *c += n;
            }
        }
    }

    /// Total number of environment steps since construction.
    pub fn num_steps_total(&self) -> usize {
        self.num_steps_total
    }

    /// Total number of paths since construction.
    pub fn num_paths_total(&self) -> usize {
        self.num_paths_total
    }

    /// Returns of the paths of the current epoch.
    pub fn returns(&self) -> &[f32] {
        &self.returns
    }

    /// Clears the statistics of the current epoch.
    pub fn end_epoch(&mut self) {
        self.returns.clear();
        self.lengths.clear();
        self.num_aborted = 0;
        self.completions.iter_mut().for_each(|c| *c = 0);
    }

    /// Summary of the current epoch.
    pub fn record(&self) -> Record {
        let lengths = self.lengths.iter().map(|&l| l as f32).collect::<Vec<_>>();
        let mut record = Record::from_slice(&[
            ("num_steps_total", RecordValue::Scalar(self.num_steps_total as f32)),
            ("num_paths_total", RecordValue::Scalar(self.num_paths_total as f32)),
            ("num_paths", RecordValue::Scalar(self.returns.len() as f32)),
            ("num_aborted_paths", RecordValue::Scalar(self.num_aborted as f32)),
            ("path_length_mean", RecordValue::Scalar(mean(&lengths))),
            ("returns_mean", RecordValue::Scalar(mean(&self.returns))),
        ]);
        if !self.returns.is_empty() {
            let min = self.returns.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = self.returns.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            record.insert("returns_min", RecordValue::Scalar(min));
            record.insert("returns_max", RecordValue::Scalar(max));
        }
        for (name, &c) in self.operator_names.iter().zip(self.completions.iter()) {
            record.insert(format!("completions/{}", name), RecordValue::Scalar(c as f32));
        }
        record
    }
}
