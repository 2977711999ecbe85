//! Structural session identity.
//!
//! Two analysis requests describe the same session when their time window,
//! equipment, calibration lineage, and target gradient all match. The key
//! is a plain value-compared record; display labels and other presentation
//! metadata deliberately have no representation here, so they can never
//! split a cache entry.

use crate::types::{EquipmentId, TimeWindow};

/// Structural fingerprint of a session's identifying inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    window: TimeWindow,
    equipment: EquipmentId,
    /// Identity of the calibration session a Q0 session projects through.
    calibration: Option<Box<SessionKey>>,
    /// Target gradient, bit-exact. `None` for calibration sessions.
    target_gradient_bits: Option<u64>,
}

impl SessionKey {
    /// Key for a calibration session.
    pub fn calibration(window: TimeWindow, equipment: EquipmentId) -> Self {
        Self {
            window,
            equipment,
            calibration: None,
            target_gradient_bits: None,
        }
    }

    /// Key for a Q0 session built against `calibration` with a target
    /// gradient.
    pub fn q0(
        window: TimeWindow,
        equipment: EquipmentId,
        calibration: SessionKey,
        target_gradient: f64,
    ) -> Self {
        Self {
            window,
            equipment,
            calibration: Some(Box::new(calibration)),
            target_gradient_bits: Some(target_gradient.to_bits()),
        }
    }

    /// The session's time window.
    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// The session's equipment.
    pub fn equipment(&self) -> EquipmentId {
        self.equipment
    }

    /// Target gradient, if this is a Q0 key.
    pub fn target_gradient(&self) -> Option<f64> {
        self.target_gradient_bits.map(f64::from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> TimeWindow {
        TimeWindow::new(1_700_000_000, 1_700_018_000, 1)
    }

    #[test]
    fn identical_inputs_compare_equal() {
        let a = SessionKey::calibration(window(), EquipmentId::cryomodule(12));
        let b = SessionKey::calibration(window(), EquipmentId::cryomodule(12));
        assert_eq!(a, b);
    }

    #[test]
    fn any_identifying_field_splits_keys() {
        let base = SessionKey::calibration(window(), EquipmentId::cryomodule(12));

        let other_window = SessionKey::calibration(
            TimeWindow::new(1_700_000_000, 1_700_018_000, 2),
            EquipmentId::cryomodule(12),
        );
        let other_equipment = SessionKey::calibration(window(), EquipmentId::cryomodule(13));

        assert_ne!(base, other_window);
        assert_ne!(base, other_equipment);
    }

    #[test]
    fn q0_keys_track_calibration_and_gradient() {
        let calib = SessionKey::calibration(window(), EquipmentId::cryomodule(12));
        let q0_window = TimeWindow::new(1_700_020_000, 1_700_030_000, 1);

        let a = SessionKey::q0(q0_window, EquipmentId::cavity(12, 2), calib.clone(), 16.0);
        let b = SessionKey::q0(q0_window, EquipmentId::cavity(12, 2), calib.clone(), 16.0);
        let c = SessionKey::q0(q0_window, EquipmentId::cavity(12, 2), calib, 17.5);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.target_gradient(), Some(16.0));
    }
}
