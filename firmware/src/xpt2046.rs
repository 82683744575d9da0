//! XPT2046 resistive touch controller driver.

use embedded_hal::spi::SpiDevice;

use smartvent_core::touch::RawPoint;

// Control bytes: 12-bit differential conversions, power-down between
// conversions so the pen interrupt stays armed.
const CMD_READ_Y: u8 = 0x90;
const CMD_READ_Z1: u8 = 0xB0;
const CMD_READ_Z2: u8 = 0xC0;
const CMD_READ_X: u8 = 0xD0;

/// Pressure readings at or above this count as a touch.
pub const Z_THRESHOLD: i16 = 400;

pub struct Xpt2046<SPI> {
    spi: SPI,
}

impl<SPI> Xpt2046<SPI>
where
    SPI: SpiDevice,
{
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// One 12-bit conversion. The result arrives in the two bytes after
    /// the control byte, MSB first, left-justified by one bit.
    fn convert(&mut self, cmd: u8) -> Result<u16, SPI::Error> {
        let mut buf = [cmd, 0, 0];
        self.spi.transfer_in_place(&mut buf)?;
        Ok(((buf[1] as u16) << 8 | buf[2] as u16) >> 3)
    }

    /// Read position and pressure in one transaction.
    ///
    /// Pressure is `z1 - z2 + 4095`; it rises with contact force and sits
    /// near zero with no touch, so a fixed threshold separates the two.
    pub fn read(&mut self) -> Result<RawPoint, SPI::Error> {
        let z1 = self.convert(CMD_READ_Z1)? as i16;
        let z2 = self.convert(CMD_READ_Z2)? as i16;
        let x = self.convert(CMD_READ_X)? as i16;
        let y = self.convert(CMD_READ_Y)? as i16;
        Ok(RawPoint {
            x,
            y,
            z: z1 - z2 + 4095,
        })
    }

    /// Position plus whether the panel is currently pressed.
    pub fn sample(&mut self) -> Result<(bool, RawPoint), SPI::Error> {
        let raw = self.read()?;
        Ok((raw.z >= Z_THRESHOLD, raw))
    }
}
