//! An ordered collection of measurements, keyed by sample file name.

use crate::measurement::Measurement;

#[derive(Debug, Clone, Default)]
pub struct MeasurementContainer {
    measurements: Vec<Measurement>,
}

impl MeasurementContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement, replacing one with the same name in place.
    pub fn add(&mut self, measurement: Measurement) {
        match self.position(measurement.name()) {
            Some(idx) => self.measurements[idx] = measurement,
            None => self.measurements.push(measurement),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Measurement> {
        let idx = self.position(name)?;
        Some(self.measurements.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Measurement> {
        self.measurements.iter_mut().find(|m| m.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.measurements.iter().map(Measurement::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.measurements.iter().position(|m| m.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentConstants;
    use crate::data::{SweepConfig, simulate_sweep};
    use crate::domain::MappingMode;

    fn measurement(name: &str, scans: usize) -> Measurement {
        let constants = InstrumentConstants::default();
        let config = SweepConfig {
            path: name.into(),
            scans,
            noise: 0.0,
            ..SweepConfig::default()
        };
        let file = simulate_sweep(&constants, &config).unwrap();
        Measurement::new(Some(file), None, MappingMode::Direct, constants).unwrap()
    }

    #[test]
    fn add_lookup_remove() {
        let mut c = MeasurementContainer::new();
        c.add(measurement("a.rw.dat", 2));
        c.add(measurement("b.rw.dat", 3));
        assert_eq!(c.names(), vec!["a.rw.dat", "b.rw.dat"]);
        assert_eq!(c.get("b.rw.dat").map(Measurement::len), Some(3));

        c.add(measurement("a.rw.dat", 4));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a.rw.dat").map(Measurement::len), Some(4));

        assert!(c.remove("a.rw.dat").is_some());
        assert!(c.remove("a.rw.dat").is_none());
        assert_eq!(c.names(), vec!["b.rw.dat"]);
    }
}
