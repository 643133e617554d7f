//! Bounded history of recent readings, oldest dropped first.

use std::collections::VecDeque;

use crate::types::Reading;

/// Fixed-capacity FIFO of the most recent readings. Pushing past capacity
/// evicts the oldest entry rather than growing or erroring.
#[derive(Debug, Clone)]
pub struct ReadingRing {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl ReadingRing {
    /// `capacity` of zero means nothing is ever retained.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a reading, evicting the oldest if at capacity.
    pub fn push(&mut self, reading: Reading) {
        if self.capacity == 0 {
            return;
        }
        if self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed reading, if any.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// All retained readings, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn reading_at(minute: i64) -> Reading {
        let tz = FixedOffset::east_opt(0).unwrap();
        Reading {
            timestamp: tz.timestamp_opt(minute * 60, 0).unwrap(),
            sky_temp: 0.0,
            ambient_temp: 0.0,
            rh_sensor_temp: None,
            pressure_temp: None,
            wind_speed: None,
            rain_frequency: 0,
            humidity: None,
            pressure: None,
            sea_level_pressure: None,
            dew_point: None,
            light_period_raw: None,
            ambient_ntc_raw: 0,
            ldr_raw: 0,
            zener_raw: 0,
            rain_ntc_raw: 0,
            sky_quality_mpsas: None,
            pwm: None,
            switch_state: crate::types::SwitchState::Unknown,
            cloud_condition: crate::types::CloudCondition::Unknown,
            wind_condition: crate::types::WindCondition::Unknown,
            rain_condition: crate::types::RainCondition::Unknown,
            cloud_safe: false,
            wind_safe: false,
            rain_safe: false,
            is_safe: false,
            internal_errors: None,
        }
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut ring = ReadingRing::new(3);
        for m in 0..10 {
            ring.push(reading_at(m));
        }
        assert_eq!(ring.len(), 3);
        assert!(ring.len() <= ring.capacity());
    }

    #[test]
    fn oldest_evicted_first() {
        let mut ring = ReadingRing::new(2);
        ring.push(reading_at(1));
        ring.push(reading_at(2));
        ring.push(reading_at(3));

        let snapshot = ring.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].timestamp, reading_at(2).timestamp);
        assert_eq!(snapshot[1].timestamp, reading_at(3).timestamp);
    }

    #[test]
    fn latest_reflects_most_recent_push() {
        let mut ring = ReadingRing::new(5);
        ring.push(reading_at(1));
        ring.push(reading_at(2));
        assert_eq!(ring.latest().unwrap().timestamp, reading_at(2).timestamp);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut ring = ReadingRing::new(0);
        ring.push(reading_at(1));
        assert!(ring.is_empty());
        assert!(ring.latest().is_none());
    }
}
