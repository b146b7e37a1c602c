//! Physical constants used by device models.

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380649e-23;

/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// Thermal voltage `kT/q` at the given temperature (K).
pub fn thermal_voltage(temp: f64) -> f64 {
    BOLTZMANN * temp / ELEMENTARY_CHARGE
}
