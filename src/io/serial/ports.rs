// src/io/serial/ports.rs
//
// Port discovery: lists serial devices present on the host as display names
// such as "USB-Serial CH340 (COM6)" and resolves them back to device names.

use std::sync::Arc;

use serde::Serialize;

use super::link::{PortKind, SerialBackend, SerialPortInfo};

/// Windows reserves `COM1`..`COM9` in the DOS namespace; higher ports only
/// open through the `\\.\` device namespace.
const EXTENDED_PATH_PREFIX: &str = r"\\.\";

/// A port as offered to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    pub display_name: String,
    pub device_name: String,
}

impl PortDescriptor {
    pub fn from_display(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let device_name = extract_device_name(&display_name);
        Self {
            display_name,
            device_name,
        }
    }

    fn from_info(info: &SerialPortInfo) -> Self {
        Self {
            display_name: display_name(info),
            device_name: info.port_name.clone(),
        }
    }
}

/// Result of a refresh: the new list and the entry to select, as one value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortSelection {
    pub ports: Vec<PortDescriptor>,
    pub selected: Option<usize>,
}

impl PortSelection {
    pub fn selected_port(&self) -> Option<&PortDescriptor> {
        self.selected.and_then(|i| self.ports.get(i))
    }
}

/// Marker a display name must contain to be offered as a port.
pub fn default_port_marker() -> &'static str {
    if cfg!(windows) {
        "(COM"
    } else {
        "(/dev/"
    }
}

/// Lists serial devices whose display name carries the port marker.
pub struct PortEnumerator {
    backend: Arc<dyn SerialBackend>,
    marker: String,
}

impl PortEnumerator {
    pub fn new(backend: Arc<dyn SerialBackend>, marker: impl Into<String>) -> Self {
        Self {
            backend,
            marker: marker.into(),
        }
    }

    /// Ports in host enumeration order. Enumeration failures yield an empty
    /// list; the result only populates a selector.
    pub fn list_ports(&self) -> Vec<PortDescriptor> {
        let infos = match self.backend.available_ports() {
            Ok(infos) => infos,
            Err(e) => {
                tlog!("[ports] Failed to enumerate ports: {}", e);
                return Vec::new();
            }
        };

        infos
            .iter()
            .map(PortDescriptor::from_info)
            .filter(|p| p.display_name.contains(&self.marker))
            .collect()
    }

    /// Re-enumerate, keeping `previous` selected when it is still present
    /// (matched by display name, then by device name). Falls back to the first
    /// port.
    pub fn refresh(&self, previous: Option<&str>) -> PortSelection {
        let ports = self.list_ports();
        let selected = previous
            .and_then(|prev| {
                ports
                    .iter()
                    .position(|p| p.display_name == prev)
                    .or_else(|| ports.iter().position(|p| p.device_name == prev))
            })
            .or(if ports.is_empty() { None } else { Some(0) });

        PortSelection { ports, selected }
    }
}

/// `"<label> (<port>)"`, labelled by USB product, manufacturer or port kind.
pub fn display_name(info: &SerialPortInfo) -> String {
    let label = info
        .product
        .as_deref()
        .or(info.manufacturer.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(match info.kind {
            PortKind::Usb => "USB Serial Device",
            PortKind::Bluetooth => "Bluetooth Link",
            PortKind::Pci => "Communications Port",
            PortKind::Unknown => "Serial Port",
        });
    format!("{} ({})", label, info.port_name)
}

/// Device name embedded in a display string, using the host's port marker.
pub fn extract_device_name(display: &str) -> String {
    extract_device_name_with(display, default_port_marker())
}

/// Device name embedded in a display string: the `( … )` group that opens
/// with `marker` (`"(COM"` matches `(COM6)`), else the last group, else the
/// whole trimmed string.
pub fn extract_device_name_with(display: &str, marker: &str) -> String {
    let display = display.trim();
    let groups = bracket_groups(display);
    let prefix = marker.strip_prefix('(').unwrap_or(marker);

    groups
        .iter()
        .find(|g| !prefix.is_empty() && g.starts_with(prefix))
        .or(groups.last())
        .map_or_else(|| display.to_string(), |g| g.to_string())
}

/// Non-empty innermost `( … )` contents, left to right.
fn bracket_groups(s: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut open = None;
    for (i, c) in s.char_indices() {
        match c {
            '(' => open = Some(i + 1),
            ')' => {
                if let Some(start) = open.take() {
                    let inner = s[start..i].trim();
                    if !inner.is_empty() {
                        groups.push(inner);
                    }
                }
            }
            _ => {}
        }
    }
    groups
}

/// Path handed to the OS when opening `device_name`.
pub fn device_path(device_name: &str) -> String {
    if cfg!(windows) {
        extended_path(device_name)
    } else {
        device_name.to_string()
    }
}

/// `\\.\` device-namespace form of a Windows port name.
pub fn extended_path(device_name: &str) -> String {
    if device_name.starts_with(EXTENDED_PATH_PREFIX) {
        device_name.to_string()
    } else {
        format!("{}{}", EXTENDED_PATH_PREFIX, device_name)
    }
}

// ============================================================================
// Tests
// ============================================================================
