//! Input device enumeration for `--list-devices` style host output.

use serde::{Deserialize, Serialize};

/// An audio input the capture source can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDevice {
    pub name: String,
    pub is_default: bool,
    /// Loopback of system output rather than a microphone.
    pub is_monitor: bool,
    /// Rate the device opens at by default; what the frequency axis will use.
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Name fragments that OS mixers give loopback inputs.
const LOOPBACK_HINTS: [&str; 5] = ["monitor of", "loopback", "stereo mix", "what u hear", "wave out"];

pub fn looks_like_loopback(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    LOOPBACK_HINTS.iter().any(|hint| name.contains(hint))
}

/// Default device first, then microphones before loopbacks, then by name.
fn order(devices: &mut [InputDevice]) {
    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then(a.is_monitor.cmp(&b.is_monitor))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Enumerate input devices on the default host. Empty when none can be listed.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<InputDevice> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("input device enumeration failed: {e}");
            return Vec::new();
        }
    };

    let mut found: Vec<InputDevice> = devices
        .filter_map(|device| {
            let name = device.name().ok()?;
            let config = device.default_input_config().ok();
            Some(InputDevice {
                is_default: default_name.as_ref() == Some(&name),
                is_monitor: looks_like_loopback(&name),
                sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                channels: config.as_ref().map(|c| c.channels()),
                name,
            })
        })
        .collect();
    order(&mut found);
    found
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<InputDevice> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, is_default: bool) -> InputDevice {
        InputDevice {
            name: name.into(),
            is_default,
            is_monitor: looks_like_loopback(name),
            sample_rate: Some(48_000),
            channels: Some(2),
        }
    }

    #[test]
    fn recognises_loopback_inputs() {
        assert!(looks_like_loopback("Monitor of Built-in Audio Analog Stereo"));
        assert!(looks_like_loopback("Stereo Mix (Realtek Audio)"));
        assert!(!looks_like_loopback("USB Microphone"));
    }

    #[test]
    fn default_then_microphones_then_loopbacks() {
        let mut list = vec![
            device("Stereo Mix", false),
            device("b mic", false),
            device("A mic", false),
            device("Headset", true),
        ];
        order(&mut list);
        let names: Vec<_> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Headset", "A mic", "b mic", "Stereo Mix"]);
    }
}
