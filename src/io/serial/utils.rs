// src/io/serial/utils.rs
//
// Framing and flow-control types for port configuration, and their
// conversions to and from the serialport crate types.

use serialport::{
    DataBits as SpDataBits, FlowControl as SpFlowControl, Parity as SpParity,
    StopBits as SpStopBits,
};

// ============================================================================
// Types
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control setting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FlowControl {
    #[default]
    None,
    /// XON/XOFF
    Software,
    /// RTS/CTS
    Hardware,
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert our Parity enum to serialport crate's Parity type
pub fn to_serialport_parity(p: Parity) -> SpParity {
    match p {
        Parity::None => SpParity::None,
        Parity::Odd => SpParity::Odd,
        Parity::Even => SpParity::Even,
    }
}

pub fn from_serialport_parity(p: SpParity) -> Parity {
    match p {
        SpParity::None => Parity::None,
        SpParity::Odd => Parity::Odd,
        SpParity::Even => Parity::Even,
    }
}

/// Convert data bits count to serialport crate's DataBits type
pub fn to_serialport_data_bits(bits: u8) -> SpDataBits {
    match bits {
        5 => SpDataBits::Five,
        6 => SpDataBits::Six,
        7 => SpDataBits::Seven,
        _ => SpDataBits::Eight,
    }
}

pub fn from_serialport_data_bits(bits: SpDataBits) -> u8 {
    match bits {
        SpDataBits::Five => 5,
        SpDataBits::Six => 6,
        SpDataBits::Seven => 7,
        SpDataBits::Eight => 8,
    }
}

/// Convert stop bits count to serialport crate's StopBits type
pub fn to_serialport_stop_bits(bits: u8) -> SpStopBits {
    match bits {
        2 => SpStopBits::Two,
        _ => SpStopBits::One,
    }
}

pub fn from_serialport_stop_bits(bits: SpStopBits) -> u8 {
    match bits {
        SpStopBits::One => 1,
        SpStopBits::Two => 2,
    }
}

pub fn to_serialport_flow_control(f: FlowControl) -> SpFlowControl {
    match f {
        FlowControl::None => SpFlowControl::None,
        FlowControl::Software => SpFlowControl::Software,
        FlowControl::Hardware => SpFlowControl::Hardware,
    }
}

pub fn from_serialport_flow_control(f: SpFlowControl) -> FlowControl {
    match f {
        SpFlowControl::None => FlowControl::None,
        SpFlowControl::Software => FlowControl::Software,
        SpFlowControl::Hardware => FlowControl::Hardware,
    }
}

/// `8N1`-style summary used in log lines
pub fn framing_summary(data_bits: u8, parity: Parity, stop_bits: u8) -> String {
    let p = match parity {
        Parity::None => 'N',
        Parity::Odd => 'O',
        Parity::Even => 'E',
    };
    format!("{}{}{}", data_bits, p, stop_bits)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Parity::default(), Parity::None);
        assert_eq!(FlowControl::default(), FlowControl::None);
    }

    #[test]
    fn test_to_serialport_parity() {
        assert!(matches!(to_serialport_parity(Parity::None), SpParity::None));
        assert!(matches!(to_serialport_parity(Parity::Odd), SpParity::Odd));
        assert!(matches!(to_serialport_parity(Parity::Even), SpParity::Even));
    }

    #[test]
    fn test_to_serialport_data_bits() {
        assert!(matches!(to_serialport_data_bits(5), SpDataBits::Five));
        assert!(matches!(to_serialport_data_bits(7), SpDataBits::Seven));
        assert!(matches!(to_serialport_data_bits(8), SpDataBits::Eight));
        assert!(matches!(to_serialport_data_bits(9), SpDataBits::Eight)); // default
        assert_eq!(from_serialport_data_bits(SpDataBits::Six), 6);
    }

    #[test]
    fn test_to_serialport_stop_bits() {
        assert!(matches!(to_serialport_stop_bits(1), SpStopBits::One));
        assert!(matches!(to_serialport_stop_bits(2), SpStopBits::Two));
        assert!(matches!(to_serialport_stop_bits(0), SpStopBits::One)); // default
    }

    #[test]
    fn test_flow_control_conversion() {
        assert!(matches!(
            to_serialport_flow_control(FlowControl::Hardware),
            SpFlowControl::Hardware
        ));
        assert_eq!(
            from_serialport_flow_control(SpFlowControl::Software),
            FlowControl::Software
        );
    }

    #[test]
    fn test_framing_summary() {
        assert_eq!(framing_summary(8, Parity::None, 1), "8N1");
        assert_eq!(framing_summary(7, Parity::Even, 2), "7E2");
    }
}
