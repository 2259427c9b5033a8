//! Static mapping from actuator index to rollout group and PWM channel.

use crate::error::CourseError;

/// Where one actuator lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoAddress {
    /// Rollout group the actuator moves with.
    pub rollout_group: usize,
    /// Index of the driver chip.
    pub hardware_group: usize,
    pub chip_address: u8,
    /// Channel on that chip; channel 0 is never used for servos.
    pub channel: u8,
}

/// Computed once at start-up, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutPlan {
    group_size: usize,
    addresses: Vec<ServoAddress>,
}

impl RolloutPlan {
    /// Split `actuators` into `groups` equal contiguous groups and map every
    /// index onto `channels_per_chip` channels per chip, chips taken in
    /// `chip_addresses` order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(
        actuators: usize,
        groups: usize,
        channels_per_chip: u8,
        chip_addresses: &[u8],
    ) -> Result<Self, CourseError> {
        if actuators == 0 || groups == 0 || actuators % groups != 0 {
            return Err(CourseError::Config(format!(
                "{actuators} actuators cannot be split into {groups} equal rollout groups"
            )));
        }
        if channels_per_chip == 0 || usize::from(channels_per_chip) >= 16 {
            return Err(CourseError::Config(format!(
                "channels_per_chip must be in 1..=15 (got {channels_per_chip})"
            )));
        }
        let per_chip = usize::from(channels_per_chip);
        let capacity = per_chip * chip_addresses.len();
        if capacity < actuators {
            return Err(CourseError::Config(format!(
                "{} chips x {per_chip} channels cannot hold {actuators} actuators",
                chip_addresses.len()
            )));
        }

        let group_size = actuators / groups;
        let addresses = (0..actuators)
            .map(|id| {
                let hardware_group = id / per_chip;
                ServoAddress {
                    rollout_group: id / group_size,
                    hardware_group,
                    chip_address: chip_addresses[hardware_group],
                    // Fits: id % per_chip < 15.
                    channel: (id % per_chip) as u8 + 1,
                }
            })
            .collect();
        Ok(Self {
            group_size,
            addresses,
        })
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.addresses.len() / self.group_size
    }

    /// Actuator indices of rollout group `g`.
    pub fn group(&self, g: usize) -> std::ops::Range<usize> {
        let start = g * self.group_size;
        start..(start + self.group_size).min(self.addresses.len())
    }

    pub fn groups(&self) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
        (0..self.group_count()).map(|g| self.group(g))
    }

    pub fn address(&self, actuator: usize) -> Option<ServoAddress> {
        self.addresses.get(actuator).copied()
    }
}
