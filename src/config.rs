use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::allocator::{
    AdmissionHook, AdmissionPolicy, AllocatorSettings, InverterCeiling, PowerAllocator,
    RangeSearch, SystemTopology, PRIMARY_FLOOR_W,
};
use crate::domain::PhaseAwareQuantity;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "OEA__";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub allocator: AllocatorConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Installation nets phases against each other (saldating metering)
    pub saldating: bool,
    /// AC -> DC -> AC efficiency for cross-phase sourcing, in (0, 1]
    pub acdcac_efficiency: f64,
    /// Power kept back for the battery from secondary consumers (W)
    pub battery_reservation_w: f64,
    /// Minimum overhead for primary consumers (W)
    pub primary_floor_w: f64,
    pub range_search: RangeSearch,
    /// Continuous inverter rating; unset disables the ceiling check
    pub inverter_ceiling: Option<InverterCeiling>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            saldating: false,
            acdcac_efficiency: 0.9,
            battery_reservation_w: 0.0,
            primary_floor_w: PRIMARY_FLOOR_W,
            range_search: RangeSearch::MaxOnly,
            inverter_ceiling: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} is not finite: {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} {message}")]
    OutOfRange { field: &'static str, message: String },
}

impl AllocatorConfig {
    /// Check values for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut finite = vec![
            ("acdcac_efficiency", self.acdcac_efficiency),
            ("battery_reservation_w", self.battery_reservation_w),
            ("primary_floor_w", self.primary_floor_w),
        ];
        if let Some(ceiling) = &self.inverter_ceiling {
            finite.push(("inverter_ceiling.max_total_w", ceiling.max_total_w));
            if let Some(per_phase) = ceiling.max_per_phase_w {
                finite.push(("inverter_ceiling.max_per_phase_w", per_phase));
            }
        }
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
        }

        if self.acdcac_efficiency <= 0.0 || self.acdcac_efficiency > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "acdcac_efficiency",
                message: format!("must be in (0, 1], got {}", self.acdcac_efficiency),
            });
        }
        if self.battery_reservation_w < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "battery_reservation_w",
                message: "cannot be negative".to_string(),
            });
        }
        if self.primary_floor_w < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "primary_floor_w",
                message: "cannot be negative".to_string(),
            });
        }
        if let RangeSearch::Bisect { steps: 0 } = self.range_search {
            return Err(ConfigError::OutOfRange {
                field: "range_search.steps",
                message: "must be at least 1 for bisect".to_string(),
            });
        }
        if let Some(ceiling) = &self.inverter_ceiling {
            if ceiling.max_total_w <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    field: "inverter_ceiling.max_total_w",
                    message: "must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn settings(&self) -> AllocatorSettings {
        AllocatorSettings {
            topology: SystemTopology {
                saldating: self.saldating,
                acdcac_efficiency: self.acdcac_efficiency,
            },
            admission: AdmissionPolicy {
                battery_reservation_w: self.battery_reservation_w,
                primary_floor_w: self.primary_floor_w,
            },
            range_search: self.range_search,
        }
    }

    pub fn admission_hook(&self) -> Option<Box<dyn AdmissionHook>> {
        self.inverter_ceiling
            .clone()
            .map(|ceiling| Box::new(ceiling) as Box<dyn AdmissionHook>)
    }

    /// Allocator for one tick over freshly measured `available` power
    pub fn build_allocator(&self, available: PhaseAwareQuantity) -> PowerAllocator {
        let allocator = PowerAllocator::new(available, self.settings());
        match self.admission_hook() {
            Some(hook) => allocator.with_admission_hook(hook),
            None => allocator,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load from a TOML file, overridden by `OEA__`-prefixed environment
    /// variables (`OEA__ALLOCATOR__SALDATING=true`)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let cfg: Config = figment.extract()?;
        cfg.allocator.validate()?;
        Ok(cfg)
    }
}
