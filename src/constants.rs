//! Physical constants for the Q0 heat-load analysis.
//!
//! The Q0 correction coefficients come from the JLab temperature-correction
//! formula for 2 K helium; the design operating point is the nominal LCLS-II
//! cavity rating used for gradient-to-heat approximations.

/// Active cavity length in meters.
pub const CAVITY_LENGTH_M: f64 = 1.038;

/// Cavity geometry factor R/Q in ohms.
pub const R_OVER_Q_OHMS: f64 = 1012.0;

/// Slope of the helium saturation line, kelvin per torr.
pub const HELIUM_TEMP_SLOPE_K_PER_TORR: f64 = 0.0125;

/// Offset of the helium saturation line in kelvin.
pub const HELIUM_TEMP_OFFSET_K: f64 = 1.705;

/// Q0 temperature-correction coefficients C1, C2, C3, C5, C6.
///
/// C4 is gradient-dependent (`gradient - 0.7`) and C7 is the quadratic
/// combination `C2 - C3*C4 + C5*C4^2`, both computed per sample.
pub const Q0_C1: f64 = 271.0;
/// See [`Q0_C1`].
pub const Q0_C2: f64 = 7.26e-5;
/// See [`Q0_C1`].
pub const Q0_C3: f64 = 2.14e-6;
/// See [`Q0_C1`].
pub const Q0_C5: f64 = 4.3e-8;
/// See [`Q0_C1`].
pub const Q0_C6: f64 = -17.02;

/// Gradient offset (MV/m) entering the C7 term.
pub const Q0_GRADIENT_OFFSET: f64 = 0.7;

/// Design gradient in MV/m.
pub const DESIGN_GRADIENT_MV_M: f64 = 16.0;

/// Heat load (W) a design-Q0 cavity dissipates at the design gradient.
pub const DESIGN_HEAT_LOAD_W: f64 = 9.6;

/// Design quality factor.
pub const DESIGN_Q0: f64 = 2.7e10;

/// A reading below this fraction of the previous one is treated as a quench.
pub const QUENCH_DROP_FRACTION: f64 = 0.9;
