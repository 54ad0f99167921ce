use anyhow::bail;
use serde::Deserialize;
use crate::sim::config::Config;

/// Register file banks. Fixed by the `register_index mod 4` addressing.
pub const NUM_BANKS: usize = 4;

/// Source operand slots per instruction (rs1, rs2, rs3).
pub const NUM_OPERANDS: usize = 3;

/// Dispatch, writeback and release ports.
pub const NUM_PORTS: usize = 2;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CollectorConfig {
    pub num_collectors: usize,
    pub num_warps: usize,
    pub num_lanes: usize,
    pub num_regs: usize,
    pub counter_width: usize,
    pub dual_release: bool,
}

impl Config for CollectorConfig {}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            num_collectors: 8,
            num_warps: 8,
            num_lanes: 32,
            num_regs: 64,
            counter_width: 16,
            dual_release: false,
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_collectors == 0 {
            bail!("num_collectors must be at least 1");
        }
        if self.num_warps == 0 {
            bail!("num_warps must be at least 1");
        }
        if self.num_lanes == 0 || self.num_lanes > 32 {
            bail!("num_lanes must be within 1..=32, got {}", self.num_lanes);
        }
        if self.num_regs == 0 || self.num_regs > 256 || self.num_regs % NUM_BANKS != 0 {
            bail!("num_regs must be a multiple of {} within 1..=256, got {}", NUM_BANKS, self.num_regs);
        }
        if self.counter_width == 0 || self.counter_width > 31 {
            bail!("counter_width must be within 1..=31, got {}", self.counter_width);
        }
        // the head-of-warp comparison breaks once a warp can wrap its own counter
        if (1usize << self.counter_width) <= self.num_collectors {
            bail!(
                "counter_width {} cannot distinguish {} in-flight instructions",
                self.counter_width,
                self.num_collectors
            );
        }
        Ok(())
    }

    /// Register slots held by each bank.
    pub fn slots_per_bank(&self) -> usize {
        self.num_regs / NUM_BANKS
    }
}

#[cfg(test)]
mod tests {
    use super::CollectorConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(CollectorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_narrow_counters() {
        let cfg = CollectorConfig {
            num_collectors: 8,
            counter_width: 3,
            ..CollectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unbanked_register_count() {
        let cfg = CollectorConfig {
            num_regs: 30,
            ..CollectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
