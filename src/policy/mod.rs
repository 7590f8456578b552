//! Session-key policy helpers.

pub mod presets;
mod targets;

pub use self::presets::{PolicyPreset, detect_preset, label_for_address};
pub use self::targets::{SLOT_COUNT, ZERO_ADDRESS, is_zero_address, pad_targets, unpad_targets};
