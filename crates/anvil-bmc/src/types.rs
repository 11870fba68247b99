//! Common types for BMC operations

use std::fmt;

/// Power state of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    /// The BMC reported something we do not recognize
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Firmware path for the one-time boot override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    Uefi,
    Legacy,
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootMode::Uefi => write!(f, "uefi"),
            BootMode::Legacy => write!(f, "legacy"),
        }
    }
}

/// Power action issued to kick off the boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Hard restart of a running machine
    ForceRestart,
    /// Power on a machine that is off
    PowerOn,
}

impl fmt::Display for ResetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetKind::ForceRestart => write!(f, "force-restart"),
            ResetKind::PowerOn => write!(f, "power-on"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_display() {
        assert_eq!(PowerState::On.to_string(), "on");
        assert_eq!(PowerState::Off.to_string(), "off");
        assert_eq!(PowerState::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_boot_mode_display() {
        assert_eq!(BootMode::Uefi.to_string(), "uefi");
        assert_eq!(BootMode::Legacy.to_string(), "legacy");
    }

    #[test]
    fn test_reset_kind_display() {
        assert_eq!(ResetKind::ForceRestart.to_string(), "force-restart");
        assert_eq!(ResetKind::PowerOn.to_string(), "power-on");
    }
}
