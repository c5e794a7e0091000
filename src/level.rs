//! A fixed-capacity collection of runs, newest at the front.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::run::Run;

pub struct Level {
    pub max_runs: usize,
    pub max_run_size: usize,
    pub runs: VecDeque<Arc<Run>>,
}

impl Level {
    pub fn new(max_runs: usize, max_run_size: usize) -> Self {
        Self {
            max_runs,
            max_run_size,
            runs: VecDeque::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.max_runs - self.runs.len()
    }
}
