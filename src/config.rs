//! Configuration for segmentation, calibration, and setpoint control.
//!
//! Every threshold that was found empirically on the hardware lives here
//! rather than in the algorithms: tolerances drift between cryoplants, and
//! the settle-trim scaling in particular is calibration-specific, not
//! algorithmic.

/// Configuration options for telemetry analysis and the setpoint controller.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Run segmentation
    // =========================================================================
    /// Minimum run duration in seconds.
    ///
    /// Spans shorter than this are discarded outright (never merged into a
    /// neighbor); they are too short to give a trustworthy dLL/dt fit.
    /// Default: 500.
    pub min_run_duration_s: f64,

    /// Downstream liquid level (percent) below which readings go bad and the
    /// current run is cut. Default: 90.0.
    pub min_downstream_level: f64,

    /// Maximum allowed |commanded - actual| heater power in watts before a
    /// sample breaks the current run. Default: 1.2.
    pub heater_tolerance_w: f64,

    /// Maximum allowed JT valve excursion (percent) from the reference
    /// position. Default: 1.2.
    pub valve_position_tolerance: f64,

    /// Maximum sample-to-sample gradient change (MV/m) tolerated inside a
    /// single RF run. Only checked for Q0 sessions. Default: 0.3.
    pub gradient_tolerance: f64,

    /// Window of the median filter applied to the downstream level channel
    /// before segmentation. Must be odd. Default: 9.
    pub median_filter_window: usize,

    // =========================================================================
    // Settle trimming
    // =========================================================================
    /// Seconds of data rendered useless per watt of heat-load step.
    ///
    /// Derived from one observed data point (a 1 W step costs about 25 s of
    /// settling) and assumed linear; re-tune per cryoplant.
    /// Default: 25.0.
    pub settle_seconds_per_watt: f64,

    /// Seconds already spent waiting after a setpoint adjustment, subtracted
    /// from the settle cutoff. Default: 30.0.
    pub post_adjust_wait_s: f64,

    // =========================================================================
    // Setpoint controller
    // =========================================================================
    /// Initial step size when holding a setpoint against slow drift.
    /// Default: 0.01.
    pub hold_initial_step: f64,

    /// Initial step size when driving toward a distant setpoint.
    /// Default: 0.5.
    pub drive_initial_step: f64,

    /// Tolerance for the hold controller. Default: 0.01.
    pub hold_tolerance: f64,

    /// Tolerance for the drive controller. Default: 0.05.
    pub drive_tolerance: f64,

    /// Settle interval between controller iterations, seconds. This is the
    /// loop's only suspension point. Default: 5.0.
    pub controller_settle_s: f64,

    /// Liquid-level drop (percent) that ends a hold-mode data run.
    /// Default: 4.0.
    pub target_level_drop: f64,

    // =========================================================================
    // Heater walking
    // =========================================================================
    /// Largest per-heater step (watts) in a heater walk. Default: 1.0.
    pub heater_step_w: f64,

    /// Pause between heater walk steps, seconds. Default: 60.0.
    pub heater_pause_s: f64,

    // =========================================================================
    // Reference operating-point search
    // =========================================================================
    /// Length of the window that must show a flat liquid level, hours.
    /// Default: 1.5.
    pub stability_hours: f64,

    /// How far each search iteration steps back in time, hours.
    /// Default: 0.5.
    pub search_step_hours: f64,

    /// Total history to search before declaring a stability fault, hours.
    /// Default: 24.0.
    pub search_range_hours: f64,

    /// Offset between "now" and the newest data considered, hours. Recent
    /// samples may not have landed in the archive yet. Default: 12.0.
    pub search_offset_hours: f64,

    /// A level fit is "flat" when log10(|slope|) is below this.
    /// Default: -5.0.
    pub flatness_log10_slope: f64,

    /// Cool-down before retrying an exhausted search, seconds.
    /// Default: 1800.
    pub stability_cooldown_s: u64,

    /// Archive sampling interval used for searches and acquisitions, seconds.
    /// Default: 1.
    pub archive_interval_s: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Run segmentation
            min_run_duration_s: 500.0,
            min_downstream_level: 90.0,
            heater_tolerance_w: 1.2,
            valve_position_tolerance: 1.2,
            gradient_tolerance: 0.3,
            median_filter_window: 9,

            // Settle trimming
            settle_seconds_per_watt: 25.0,
            post_adjust_wait_s: 30.0,

            // Setpoint controller
            hold_initial_step: 0.01,
            drive_initial_step: 0.5,
            hold_tolerance: 0.01,
            drive_tolerance: 0.05,
            controller_settle_s: 5.0,
            target_level_drop: 4.0,

            // Heater walking
            heater_step_w: 1.0,
            heater_pause_s: 60.0,

            // Reference search
            stability_hours: 1.5,
            search_step_hours: 0.5,
            search_range_hours: 24.0,
            search_offset_hours: 12.0,
            flatness_log10_slope: -5.0,
            stability_cooldown_s: 1800,
            archive_interval_s: 1,
        }
    }
}

impl Config {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for short demo/replay datasets.
    ///
    /// Relaxes the minimum run duration and smoothing window so that small
    /// canned captures still segment into usable runs.
    pub fn demo() -> Self {
        Self {
            min_run_duration_s: 5.0,
            median_filter_window: 3,
            post_adjust_wait_s: 0.0,
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the minimum run duration in seconds.
    pub fn min_run_duration_s(mut self, seconds: f64) -> Self {
        assert!(seconds > 0.0, "min_run_duration_s must be positive");
        self.min_run_duration_s = seconds;
        self
    }

    /// Set the minimum downstream liquid level in percent.
    pub fn min_downstream_level(mut self, level: f64) -> Self {
        assert!(
            (0.0..=100.0).contains(&level),
            "min_downstream_level must be a percentage"
        );
        self.min_downstream_level = level;
        self
    }

    /// Set the heater commanded-vs-actual tolerance in watts.
    pub fn heater_tolerance_w(mut self, watts: f64) -> Self {
        assert!(watts > 0.0, "heater_tolerance_w must be positive");
        self.heater_tolerance_w = watts;
        self
    }

    /// Set the valve position tolerance in percent.
    pub fn valve_position_tolerance(mut self, tol: f64) -> Self {
        assert!(tol > 0.0, "valve_position_tolerance must be positive");
        self.valve_position_tolerance = tol;
        self
    }

    /// Set the sample-to-sample gradient tolerance in MV/m.
    pub fn gradient_tolerance(mut self, tol: f64) -> Self {
        assert!(tol > 0.0, "gradient_tolerance must be positive");
        self.gradient_tolerance = tol;
        self
    }

    /// Set the median filter window (odd).
    pub fn median_filter_window(mut self, window: usize) -> Self {
        assert!(window % 2 == 1, "median_filter_window must be odd");
        self.median_filter_window = window;
        self
    }

    /// Set the settle-trim scaling constant, seconds per watt.
    pub fn settle_seconds_per_watt(mut self, s_per_w: f64) -> Self {
        assert!(s_per_w >= 0.0, "settle_seconds_per_watt must be non-negative");
        self.settle_seconds_per_watt = s_per_w;
        self
    }

    /// Set the target liquid-level drop for hold-mode runs.
    pub fn target_level_drop(mut self, drop: f64) -> Self {
        assert!(drop > 0.0, "target_level_drop must be positive");
        self.target_level_drop = drop;
        self
    }

    /// Set the controller settle interval in seconds.
    pub fn controller_settle_s(mut self, seconds: f64) -> Self {
        assert!(seconds > 0.0, "controller_settle_s must be positive");
        self.controller_settle_s = seconds;
        self
    }

    /// Set the archive sampling interval in seconds.
    pub fn archive_interval_s(mut self, seconds: u32) -> Self {
        assert!(seconds > 0, "archive_interval_s must be positive");
        self.archive_interval_s = seconds;
        self
    }

    /// Check that the configuration is internally consistent.
    ///
    /// Returns an error message if a field is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_run_duration_s <= 0.0 {
            return Err("min_run_duration_s must be positive".to_string());
        }
        if self.median_filter_window % 2 == 0 {
            return Err("median_filter_window must be odd".to_string());
        }
        if self.hold_tolerance <= 0.0 || self.drive_tolerance <= 0.0 {
            return Err("controller tolerances must be positive".to_string());
        }
        if self.hold_initial_step <= 0.0 || self.drive_initial_step <= 0.0 {
            return Err("controller initial steps must be positive".to_string());
        }
        if self.settle_seconds_per_watt < 0.0 {
            return Err("settle_seconds_per_watt must be non-negative".to_string());
        }
        if self.stability_hours <= 0.0 || self.search_step_hours <= 0.0 {
            return Err("search windows must be positive".to_string());
        }
        if self.archive_interval_s == 0 {
            return Err("archive_interval_s must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn demo_preset_relaxes_segmentation() {
        let config = Config::demo();
        assert!(config.min_run_duration_s < Config::default().min_run_duration_s);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods_chain() {
        let config = Config::new()
            .min_run_duration_s(120.0)
            .valve_position_tolerance(2.0)
            .median_filter_window(5);

        assert_eq!(config.min_run_duration_s, 120.0);
        assert_eq!(config.valve_position_tolerance, 2.0);
        assert_eq!(config.median_filter_window, 5);
    }

    #[test]
    fn validation_rejects_even_filter_window() {
        let mut config = Config::default();
        config.median_filter_window = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    #[should_panic]
    fn builder_rejects_even_filter_window() {
        Config::new().median_filter_window(4);
    }
}
