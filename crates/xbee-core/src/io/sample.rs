//! IO sample decoding
//!
//! Layout of the data returned by `IS`:
//! - byte 0: number of sample sets (always 1 for a forced sample)
//! - bytes 1-2: enabled digital channels
//! - byte 3: enabled analog channels
//! - bytes 4-5: digital values, present only if any digital channel is enabled
//! - then 16-bit analog readings
//!
//! Masks and values are sent most significant bit first, so after reversing
//! the bit string bit N is channel N. Read as big-endian integers that is
//! plain `(mask >> pin) & 1`.

use byteorder::{BigEndian, ByteOrder};

use super::IoPin;
use crate::protocol::{ProtocolError, Result};

/// A decoded forced IO sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoSample {
    pub sample_sets: u8,
    pub digital_mask: u16,
    pub analog_mask: u8,
    /// Digital line states, present when `digital_mask != 0`
    pub digital_values: Option<u16>,
    raw: Vec<u8>,
}

impl IoSample {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(ProtocolError::MalformedFrame(format!(
                "IO sample of {} bytes lacks channel masks",
                data.len()
            )));
        }
        let digital_mask = BigEndian::read_u16(&data[1..3]);
        let digital_values = if digital_mask != 0 {
            let field = data.get(4..6).ok_or_else(|| {
                ProtocolError::MalformedFrame("IO sample lacks digital values".to_string())
            })?;
            Some(BigEndian::read_u16(field))
        } else {
            None
        };

        Ok(Self {
            sample_sets: data[0],
            digital_mask,
            analog_mask: data[3],
            digital_values,
            raw: data.to_vec(),
        })
    }

    pub fn is_digital(&self, pin: IoPin) -> bool {
        (self.digital_mask >> pin.index()) & 1 == 1
    }

    pub fn is_analog(&self, pin: IoPin) -> bool {
        pin.index() < 8 && (self.analog_mask >> pin.index()) & 1 == 1
    }

    /// State of a digital-enabled pin
    pub fn digital_value(&self, pin: IoPin) -> Option<bool> {
        if !self.is_digital(pin) {
            return None;
        }
        self.digital_values
            .map(|values| (values >> pin.index()) & 1 == 1)
    }

    /// Reading of an analog-enabled pin
    ///
    /// The analog block starts after the digital values when those are
    /// present; each pin's word sits at `pin * 2` within it.
    pub fn analog_value(&self, pin: IoPin) -> Result<Option<u16>> {
        if !self.is_analog(pin) {
            return Ok(None);
        }
        let base = if self.digital_mask != 0 { 6 } else { 4 };
        let offset = base + pin.index() as usize * 2;
        let word = self.raw.get(offset..offset + 2).ok_or_else(|| {
            ProtocolError::MalformedFrame(format!(
                "IO sample of {} bytes lacks analog reading for pin {}",
                self.raw.len(),
                pin.index()
            ))
        })?;
        Ok(Some(BigEndian::read_u16(word)))
    }

    /// Value of `pin`: 0/1 for digital inputs, the raw reading for analog
    pub fn value(&self, pin: IoPin) -> Result<u16> {
        if let Some(high) = self.digital_value(pin) {
            return Ok(high as u16);
        }
        match self.analog_value(pin)? {
            Some(reading) => Ok(reading),
            None => Err(ProtocolError::PinDisabled(pin.index())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pin(index: u8) -> IoPin {
        IoPin::new(index).unwrap()
    }

    #[test]
    fn test_digital_pin_high() {
        // pin 1 digital enabled and high
        let sample = IoSample::parse(&[0x01, 0x00, 0x02, 0x00, 0x00, 0x02]).unwrap();
        assert!(sample.is_digital(pin(1)));
        assert!(!sample.is_analog(pin(1)));
        assert_eq!(sample.value(pin(1)).unwrap(), 1);
    }

    #[test]
    fn test_digital_pin_low() {
        let sample = IoSample::parse(&[0x01, 0x00, 0x06, 0x00, 0x00, 0x02]).unwrap();
        assert_eq!(sample.value(pin(2)).unwrap(), 0);
        assert_eq!(sample.digital_value(pin(1)), Some(true));
    }

    #[test]
    fn test_high_digital_pins_use_first_mask_byte() {
        // pin 10 lives in bit 2 of the first mask byte
        let sample = IoSample::parse(&[0x01, 0x04, 0x00, 0x00, 0x04, 0x00]).unwrap();
        assert!(sample.is_digital(pin(10)));
        assert_eq!(sample.value(pin(10)).unwrap(), 1);
    }

    #[test]
    fn test_analog_without_digital() {
        let sample =
            IoSample::parse(&[0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x03, 0xE8]).unwrap();
        assert_eq!(sample.digital_values, None);
        assert_eq!(sample.value(pin(2)).unwrap(), 1000);
    }

    #[test]
    fn test_analog_after_digital_values() {
        // digital pin 4 enabled shifts the analog block to offset 6
        let sample =
            IoSample::parse(&[0x01, 0x00, 0x10, 0x01, 0x00, 0x10, 0x02, 0x00]).unwrap();
        assert_eq!(sample.value(pin(0)).unwrap(), 0x0200);
        assert_eq!(sample.value(pin(4)).unwrap(), 1);
    }

    #[test]
    fn test_disabled_pin() {
        let sample = IoSample::parse(&[0x01, 0x00, 0x00, 0x00]).unwrap();
        assert!(matches!(
            sample.value(pin(3)),
            Err(ProtocolError::PinDisabled(3))
        ));
    }

    #[test]
    fn test_truncated_samples() {
        assert!(IoSample::parse(&[0x01, 0x00, 0x02]).is_err());
        // digital mask set but no values
        assert!(IoSample::parse(&[0x01, 0x00, 0x02, 0x00]).is_err());
        // analog enabled but reading missing
        let sample = IoSample::parse(&[0x01, 0x00, 0x00, 0x08, 0x00]).unwrap();
        assert!(matches!(
            sample.value(pin(3)),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }
}
