//! Unit conversions.

/// Boltzmann constant in kcal/(mol·K).
pub const BOLTZMANN: f64 = 0.0019872041;

pub const ZERO_C_IN_KELVIN: f64 = 273.15;

/// Thermal energy in kcal/mol at `temperature` in °C.
pub fn kt(temperature: f64) -> f64 {
    BOLTZMANN * (temperature + ZERO_C_IN_KELVIN)
}

/// Moles of water per liter at `temperature` in °C.
///
/// Density after Tanaka et al., Metrologia 38 (2001), divided by the
/// molar mass of water.
pub fn water_molarity(temperature: f64) -> f64 {
    const A1: f64 = -3.983035;
    const A2: f64 = 301.797;
    const A3: f64 = 522528.9;
    const A4: f64 = 69.34881;
    const A5: f64 = 999.974950;
    const MOLAR_MASS: f64 = 18.0152;

    let t = temperature;
    A5 * (1.0 - (t + A1) * (t + A1) * (t + A2) / A3 / (t + A4)) / MOLAR_MASS
}

/// Molar concentration to mole fraction.
pub fn molar_to_mole_fraction(concentration: f64, temperature: f64) -> f64 {
    concentration / water_molarity(temperature)
}

/// Mole fraction to molar concentration.
pub fn mole_fraction_to_molar(fraction: f64, temperature: f64) -> f64 {
    fraction * water_molarity(temperature)
}

/// kcal/mol to kT.
pub fn kcal_to_kt(energy: f64, temperature: f64) -> f64 {
    energy / kt(temperature)
}

/// Free energy in kcal/mol of a partition function.
pub fn free_energy_kcal(partition_function: f64, temperature: f64) -> f64 {
    -kt(temperature) * partition_function.ln()
}
