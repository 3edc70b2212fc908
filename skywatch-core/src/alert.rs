use crate::model::Observation;

/// A sustained temperature exceedance detected for one location.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureAlert {
    pub location: String,
    pub temperature_c: f64,
    pub threshold_c: f64,
}

impl TemperatureAlert {
    pub fn subject(&self) -> String {
        format!("Temperature Alert for {}", self.location)
    }

    pub fn body(&self) -> String {
        format!(
            "The temperature has exceeded the threshold! \
             Current Temperature: {:.2}°C (threshold {:.1}°C)",
            self.temperature_c, self.threshold_c
        )
    }
}

/// Evaluates the tail of a location's history against a fixed threshold.
///
/// The decision is a pure function of the two most recent samples: both
/// must strictly exceed the threshold. One spike never alerts; two
/// consecutive hot readings do. The engine holds no cross-call state, so
/// it is restart-safe for free — everything it needs lives in the
/// history buffer.
#[derive(Debug, Clone, Copy)]
pub struct AlertEngine {
    threshold_c: f64,
}

impl AlertEngine {
    pub fn new(threshold_c: f64) -> Self {
        Self { threshold_c }
    }

    pub fn threshold_c(&self) -> f64 {
        self.threshold_c
    }

    /// `Some` iff the buffer holds at least two observations and both of
    /// the most recent temperatures strictly exceed the threshold.
    pub fn evaluate(&self, location: &str, history: &[Observation]) -> Option<TemperatureAlert> {
        let [.., previous, latest] = history else {
            return None;
        };

        if previous.temperature_c > self.threshold_c && latest.temperature_c > self.threshold_c {
            Some(TemperatureAlert {
                location: location.to_string(),
                temperature_c: latest.temperature_c,
                threshold_c: self.threshold_c,
            })
        } else {
            None
        }
    }
}
