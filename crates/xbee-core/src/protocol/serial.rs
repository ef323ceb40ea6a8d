//! Serial port handling
//!
//! Locating and opening the serial port a radio is attached to.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;

use super::{ProtocolError, Result, DEFAULT_BAUD_RATE};

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,
    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,
    /// USB product ID (if USB device)
    pub pid: Option<u16>,
    /// Product name (if available)
    pub product: Option<String>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product,
                serial_number: usb.serial_number,
            },
            _ => Self {
                name: info.port_name,
                vid: None,
                pid: None,
                product: None,
                serial_number: None,
            },
        }
    }
}

impl PortInfo {
    /// USB-serial bridges used on radio adapter boards (FTDI, Silicon Labs)
    pub fn is_likely_radio_adapter(&self) -> bool {
        matches!(self.vid, Some(0x0403) | Some(0x10C4))
    }
}

/// List available serial ports, likely radio adapters first then by name
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(PortInfo::from)
        .collect();
    sort_ports(&mut ports);
    ports
}

fn sort_ports(ports: &mut [PortInfo]) {
    ports.sort_by(|a, b| {
        b.is_likely_radio_adapter()
            .cmp(&a.is_likely_radio_adapter())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Open a serial port, defaulting to the radio's factory baud rate
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<Box<dyn SerialPort>> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
    tracing::debug!("opening {} at {} baud", name, baud);

    // Short timeout keeps blocking reads responsive; frame reads poll anyway
    let mut port = serialport::new(name, baud)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    configure_port(port.as_mut())?;
    Ok(port)
}

/// Configure 8N1 without flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<()> {
    let serial_err = |e: serialport::Error| ProtocolError::SerialError(e.to_string());
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(serial_err)?;
    port.set_parity(serialport::Parity::None).map_err(serial_err)?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(serial_err)?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(serial_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, vid: Option<u16>) -> PortInfo {
        PortInfo {
            name: name.to_string(),
            vid,
            pid: None,
            product: None,
            serial_number: None,
        }
    }

    #[test]
    fn test_list_ports() {
        // Only checks that enumeration does not panic on this host
        let _ = list_ports();
    }

    #[test]
    fn test_radio_adapters_sort_first() {
        let mut ports = vec![
            port("/dev/ttyS0", None),
            port("/dev/ttyUSB1", Some(0x0403)),
            port("/dev/ttyACM0", Some(0x2341)),
            port("/dev/ttyUSB0", Some(0x10C4)),
        ];
        sort_ports(&mut ports);
        let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyACM0", "/dev/ttyS0"]
        );
    }
}
