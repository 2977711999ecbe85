//! Process-variable address book for a cryomodule and its cavities.
//!
//! Only address formatting lives here; what the addresses mean is the
//! control system's business. Each cryomodule carries eight cavities.

/// Number of cavities in a cryomodule.
pub const CAVITIES_PER_CRYOMODULE: u8 = 8;

/// Generates the process-variable names for one cryomodule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryomoduleChannels {
    /// Facility cryomodule number used in channel addresses.
    pub cryomodule: u8,
}

impl CryomoduleChannels {
    /// Address book for cryomodule `cryomodule`.
    pub fn new(cryomodule: u8) -> Self {
        Self { cryomodule }
    }

    /// JT valve position readback.
    pub fn valve_position(&self) -> String {
        format!("CPID:CM0{}:3001:JT:CV_VALUE", self.cryomodule)
    }

    /// JT valve manual-mode setpoint.
    pub fn valve_setpoint(&self) -> String {
        format!("CPV:CM0{}:3001:JT:POS_SETPT", self.cryomodule)
    }

    /// Downstream liquid level.
    pub fn downstream_level(&self) -> String {
        format!("CLL:CM0{}:2301:DS:LVL", self.cryomodule)
    }

    /// Upstream liquid level.
    pub fn upstream_level(&self) -> String {
        format!("CLL:CM0{}:2601:US:LVL", self.cryomodule)
    }

    /// Downstream helium pressure.
    pub fn downstream_pressure(&self) -> String {
        format!("CPT:CM0{}:2302:DS:PRESS", self.cryomodule)
    }

    /// Commanded heater power for `cavity`.
    pub fn heater_commanded(&self, cavity: u8) -> String {
        format!("CHTR:CM0{}:1{}55:HV:POWER_SETPT", self.cryomodule, cavity)
    }

    /// Actual (readback) heater power for `cavity`.
    pub fn heater_actual(&self, cavity: u8) -> String {
        format!("CHTR:CM0{}:1{}55:HV:POWER", self.cryomodule, cavity)
    }

    /// Measured gradient for `cavity`.
    pub fn gradient(&self, cavity: u8) -> String {
        self.accl(cavity, "GACT")
    }

    /// Requested amplitude for `cavity` (the drive channel for setpoint
    /// control).
    pub fn amplitude(&self, cavity: u8) -> String {
        self.accl(cavity, "ADES")
    }

    /// Hardware quench-protection bypass flag for `cavity`. Nonzero means
    /// the hardware interlock is disabled and software must treat a quench
    /// as fatal.
    pub fn quench_bypass(&self, cavity: u8) -> String {
        self.accl(cavity, "QUENCH_BYP")
    }

    /// All commanded heater channels, cavity order.
    pub fn all_heater_commanded(&self) -> Vec<String> {
        (1..=CAVITIES_PER_CRYOMODULE)
            .map(|cav| self.heater_commanded(cav))
            .collect()
    }

    /// All actual heater channels, cavity order.
    pub fn all_heater_actual(&self) -> Vec<String> {
        (1..=CAVITIES_PER_CRYOMODULE)
            .map(|cav| self.heater_actual(cav))
            .collect()
    }

    /// All gradient channels, cavity order.
    pub fn all_gradients(&self) -> Vec<String> {
        (1..=CAVITIES_PER_CRYOMODULE)
            .map(|cav| self.gradient(cav))
            .collect()
    }

    /// Channels a cryomodule-level acquisition fetches from the archive.
    pub fn acquisition_channels(&self) -> Vec<String> {
        let mut channels = vec![
            self.valve_position(),
            self.downstream_level(),
            self.upstream_level(),
            self.downstream_pressure(),
        ];
        channels.extend(self.all_gradients());
        channels.extend(self.all_heater_commanded());
        channels.extend(self.all_heater_actual());
        channels
    }

    /// Channels a single-cavity acquisition fetches from the archive.
    ///
    /// Heater channels still cover every cavity: the reference heat load is
    /// the sum over the whole cryomodule.
    pub fn cavity_acquisition_channels(&self, cavity: u8) -> Vec<String> {
        let mut channels = vec![
            self.valve_position(),
            self.downstream_level(),
            self.upstream_level(),
            self.gradient(cavity),
            self.downstream_pressure(),
        ];
        channels.extend(self.all_heater_commanded());
        channels.extend(self.all_heater_actual());
        channels
    }

    fn accl(&self, cavity: u8, suffix: &str) -> String {
        format!("ACCL:L1B:0{}{}0:{}", self.cryomodule, cavity, suffix)
    }
}
