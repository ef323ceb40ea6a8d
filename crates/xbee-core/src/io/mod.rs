//! IO lines
//!
//! Reading and configuring the radio's digital/analog IO pins, either on the
//! local radio or on a remote node through remote AT commands. Pin modes are
//! device state and are always queried fresh.

mod pin;
mod sample;

pub use pin::{IoPin, PinMode, MAX_PIN};
pub use sample::IoSample;

use crate::protocol::{AtCode, AtCommand, Connection, ProtocolError, Result, Target};

impl Connection {
    /// Force an IO sample on `target`
    pub fn io_sample(&mut self, target: Target) -> Result<IoSample> {
        let response = self.command(target, AtCode::IS)?;
        IoSample::parse(&response.data)
    }

    /// Current value of one pin: 0/1 if digital, the raw reading if analog
    ///
    /// Fails with [`ProtocolError::PinDisabled`] if the pin is not sampling.
    pub fn read_pin(&mut self, target: Target, pin: u8) -> Result<u16> {
        let pin = IoPin::new(pin)?;
        let response = self.command(target, AtCode::IS)?;
        if response.data.len() < 2 {
            return Err(ProtocolError::PinDisabled(pin.index()));
        }
        IoSample::parse(&response.data)?.value(pin)
    }

    /// Mode `pin` is currently configured for
    pub fn pin_mode(&mut self, target: Target, pin: u8) -> Result<PinMode> {
        let code = IoPin::new(pin)?.mode_command()?;
        let response = self.command(target, code)?;
        response
            .data
            .last()
            .map(|byte| PinMode::from_byte(*byte))
            .ok_or_else(|| ProtocolError::MalformedFrame(format!("empty {} response", code)))
    }

    /// Configure `pin` as a monitored digital input
    pub fn set_digital_input(&mut self, target: Target, pin: u8) -> Result<()> {
        self.set_pin_mode(target, pin, PinMode::DigitalInput)
    }

    /// Configure `pin` as a single-ended analog input
    pub fn set_analog_input(&mut self, target: Target, pin: u8) -> Result<()> {
        self.set_pin_mode(target, pin, PinMode::AnalogInput)
    }

    /// Set a pin mode, then apply changes so it takes effect without a reset
    pub fn set_pin_mode(&mut self, target: Target, pin: u8, mode: PinMode) -> Result<()> {
        let code = IoPin::new(pin)?.mode_command()?;
        tracing::debug!("setting {} on {:?} to {:?}", code, target, mode);
        self.command(target, AtCommand::with_args(code, [mode.to_byte()]))?;
        self.apply_changes(target)
    }
}
