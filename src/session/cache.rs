//! Session deduplication.
//!
//! Re-analyzing the same time window is common (operators iterate on the
//! same measurement), and building a session means an archive fetch plus
//! fitting, so identical requests must resolve to the same in-memory
//! session rather than a rebuild.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::Error;
use crate::session::key::SessionKey;
use crate::session::{CalibrationSession, Q0Session};

/// Cache of built sessions, keyed structurally.
///
/// Construction is at-most-once per key: the per-variant lock is held
/// across the builder call, so a concurrent request for the same key blocks
/// until the first build finishes and then receives the same session. A
/// failed build caches nothing; the next request retries.
#[derive(Debug, Default)]
pub struct SessionCache {
    calibrations: Mutex<HashMap<SessionKey, Arc<CalibrationSession>>>,
    q0s: Mutex<HashMap<SessionKey, Arc<Q0Session>>>,
}

impl SessionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the calibration session under `key`, building it with
    /// `build` on a miss.
    pub fn calibration_or_create(
        &self,
        key: SessionKey,
        build: impl FnOnce() -> Result<CalibrationSession, Error>,
    ) -> Result<Arc<CalibrationSession>, Error> {
        let mut map = self.calibrations.lock().expect("session cache poisoned");

        if let Some(existing) = map.get(&key) {
            debug!(?key, "calibration session cache hit");
            return Ok(Arc::clone(existing));
        }

        let session = Arc::new(build()?);
        map.insert(key, Arc::clone(&session));
        Ok(session)
    }

    /// Return the Q0 session under `key`, building it with `build` on a
    /// miss.
    pub fn q0_or_create(
        &self,
        key: SessionKey,
        build: impl FnOnce() -> Result<Q0Session, Error>,
    ) -> Result<Arc<Q0Session>, Error> {
        let mut map = self.q0s.lock().expect("session cache poisoned");

        if let Some(existing) = map.get(&key) {
            debug!(?key, "Q0 session cache hit");
            return Ok(Arc::clone(existing));
        }

        let session = Arc::new(build()?);
        map.insert(key, Arc::clone(&session));
        Ok(session)
    }

    /// Number of cached sessions across both variants.
    pub fn len(&self) -> usize {
        self.calibrations.lock().expect("session cache poisoned").len()
            + self.q0s.lock().expect("session cache poisoned").len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::telemetry::TelemetryBuffer;
    use crate::types::{EquipmentId, TimeWindow, ValveParams};

    fn buffer() -> TelemetryBuffer {
        let n = 120;
        let mut heater = vec![7.0; 60];
        heater.extend(vec![9.0; 60]);
        TelemetryBuffer {
            unix_time: (0..n).map(|i| i as f64).collect(),
            valve_position: vec![17.5; n],
            downstream_level: (0..n)
                .map(|i| {
                    // Decay steepens with the heater step at sample 60.
                    if i < 60 {
                        93.0 - 0.004 * i as f64
                    } else {
                        92.76 - 0.008 * (i - 60) as f64
                    }
                })
                .collect(),
            upstream_level: vec![75.0; n],
            heater_commanded: heater.clone(),
            heater_actual: heater,
            gradient: Vec::new(),
            pressure: Vec::new(),
            gradient_is_effective: false,
        }
    }

    fn build_session() -> Result<CalibrationSession, Error> {
        let config = Config::demo()
            .min_run_duration_s(10.0)
            .settle_seconds_per_watt(0.0);
        CalibrationSession::from_buffer(
            TimeWindow::new(0, 120, 1),
            ValveParams::new(17.5, 5.0, 5.0),
            EquipmentId::cryomodule(12),
            buffer(),
            &config,
        )
    }

    #[test]
    fn identical_keys_share_one_session() {
        let cache = SessionCache::new();
        let key = SessionKey::calibration(TimeWindow::new(0, 120, 1), EquipmentId::cryomodule(12));

        let first = cache.calibration_or_create(key.clone(), build_session).unwrap();
        let second = cache
            .calibration_or_create(key, || panic!("must not rebuild on a hit"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_keys_build_separately() {
        let cache = SessionCache::new();
        let a = SessionKey::calibration(TimeWindow::new(0, 120, 1), EquipmentId::cryomodule(12));
        let b = SessionKey::calibration(TimeWindow::new(0, 120, 1), EquipmentId::cryomodule(13));

        cache.calibration_or_create(a, build_session).unwrap();
        cache.calibration_or_create(b, build_session).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_builds_are_not_cached() {
        let cache = SessionCache::new();
        let key = SessionKey::calibration(TimeWindow::new(0, 120, 1), EquipmentId::cryomodule(12));

        let failed = cache.calibration_or_create(key.clone(), || {
            Err(Error::Precondition(
                crate::error::PreconditionError::InsufficientCalibrationPoints { distinct: 1 },
            ))
        });
        assert!(failed.is_err());
        assert!(cache.is_empty());

        // The retry builds normally.
        assert!(cache.calibration_or_create(key, build_session).is_ok());
    }
}
