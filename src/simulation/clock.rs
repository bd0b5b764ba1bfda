use crate::simulation::config::SimulationConfig;

/// Tolerance, as a fraction of the step, when comparing time against the final time.
const FINISH_TOLERANCE: f64 = 1e-9;

/// The run's notion of "now". The step index doubles as the generation marker for
/// step-scoped caches.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    initial_time: f64,
    final_time: f64,
    time_step: f64,
    time: f64,
    step: u64,
}

impl Clock {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            initial_time: config.initial_time,
            final_time: config.final_time,
            time_step: config.time_step,
            time: config.initial_time,
            step: 0,
        }
    }

    pub fn time(&self) -> f64 { self.time }
    pub fn step(&self) -> u64 { self.step }
    pub fn time_step(&self) -> f64 { self.time_step }
    pub fn final_time(&self) -> f64 { self.final_time }

    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
        self.step += 1;
    }

    pub fn reset(&mut self) {
        self.time = self.initial_time;
        self.step = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.final_time - self.time_step * FINISH_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finishes_after_expected_steps() {
        let mut clock = Clock::new(&SimulationConfig::new(0.0, 1.0, 0.1));
        let mut steps = 0;
        while !clock.is_finished() {
            clock.advance(0.1);
            steps += 1;
        }
        // 0.1 does not sum exactly to 1.0; the tolerance absorbs the drift.
        assert_eq!(steps, 10);
        assert_eq!(clock.step(), 10);
    }

    #[test]
    fn test_reset() {
        let mut clock = Clock::new(&SimulationConfig::new(1.0, 13.0, 0.25));
        clock.advance(0.25);
        clock.reset();
        assert_eq!(clock.time(), 1.0);
        assert_eq!(clock.step(), 0);
    }

    #[test]
    fn test_zero_length_run_is_finished() {
        let clock = Clock::new(&SimulationConfig::new(3.0, 3.0, 1.0));
        assert!(clock.is_finished());
    }
}
