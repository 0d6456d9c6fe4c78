// ImpactWatch — Chip bindings
//
// Register-level drivers over shared I2C buses plus a bit-banged HX711.
// Each one implements the matching source trait from the library.

use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::ensure;
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
use esp_idf_hal::i2c::I2cDriver;

use impactwatch::config::*;
use impactwatch::drivers::{AccelSource, ImuReading, ImuSource, LoadCellSource, TemperatureSource};
use impactwatch::events::Sample3;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

fn lock_bus(bus: SharedBus) -> MutexGuard<'static, I2cDriver<'static>> {
    bus.lock().unwrap_or_else(|p| p.into_inner())
}

fn read_le(lo: u8, hi: u8) -> f64 {
    i16::from_le_bytes([lo, hi]) as f64
}

// ---------------------------------------------------------------------------
// LSM6DSOX — ±16 g accelerometer + ±2000 °/s gyroscope
// ---------------------------------------------------------------------------
const LSM_WHO_AM_I: u8 = 0x0F;
const LSM_WHO_AM_I_EXPECTED: u8 = 0x6C;
const LSM_CTRL1_XL: u8 = 0x10;
const LSM_CTRL2_G: u8 = 0x11;
const LSM_CTRL3_C: u8 = 0x12;
const LSM_OUTX_L_G: u8 = 0x22; // gyro XYZ then accel XYZ, 12 bytes
const LSM_ACCEL_G_PER_LSB: f64 = 0.000_488;
const LSM_GYRO_DPS_PER_LSB: f64 = 0.070;

pub struct Lsm6dsox {
    bus: SharedBus,
}

impl Lsm6dsox {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }
}

impl ImuSource for Lsm6dsox {
    fn begin(&mut self) -> anyhow::Result<()> {
        let mut bus = lock_bus(self.bus);
        let mut id = [0u8; 1];
        bus.write_read(I2C_ADDR_LSM6DSOX, &[LSM_WHO_AM_I], &mut id, I2C_TIMEOUT_TICKS)?;
        ensure!(id[0] == LSM_WHO_AM_I_EXPECTED, "LSM6DSOX WHO_AM_I mismatch: {:#04x}", id[0]);

        // Block data update, register auto-increment
        bus.write(I2C_ADDR_LSM6DSOX, &[LSM_CTRL3_C, 0x44], I2C_TIMEOUT_TICKS)?;
        // Accel 1.66 kHz, ±16 g
        bus.write(I2C_ADDR_LSM6DSOX, &[LSM_CTRL1_XL, 0x84], I2C_TIMEOUT_TICKS)?;
        // Gyro 1.66 kHz, ±2000 °/s
        bus.write(I2C_ADDR_LSM6DSOX, &[LSM_CTRL2_G, 0x8C], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    fn read(&mut self) -> anyhow::Result<ImuReading> {
        let mut raw = [0u8; 12];
        lock_bus(self.bus).write_read(I2C_ADDR_LSM6DSOX, &[LSM_OUTX_L_G], &mut raw, I2C_TIMEOUT_TICKS)?;

        let gyro = |i: usize| (read_le(raw[i], raw[i + 1]) * LSM_GYRO_DPS_PER_LSB).to_radians();
        let accel = |i: usize| read_le(raw[i], raw[i + 1]) * LSM_ACCEL_G_PER_LSB * STANDARD_GRAVITY;
        Ok(ImuReading {
            gyro: Sample3::new(gyro(0), gyro(2), gyro(4)),
            accel: Sample3::new(accel(6), accel(8), accel(10)),
        })
    }
}

// ---------------------------------------------------------------------------
// H3LIS331 — ±400 g accelerometer
// ---------------------------------------------------------------------------
const H3_WHO_AM_I: u8 = 0x0F;
const H3_WHO_AM_I_EXPECTED: u8 = 0x32;
const H3_CTRL_REG1: u8 = 0x20;
const H3_CTRL_REG4: u8 = 0x23;
const H3_OUT_X_L_AUTOINC: u8 = 0x28 | 0x80;
const H3_G_PER_DIGIT: f64 = 0.195; // 12-bit left-justified at ±400 g

pub struct H3lis331 {
    bus: SharedBus,
}

impl H3lis331 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }
}

impl AccelSource for H3lis331 {
    fn begin(&mut self) -> anyhow::Result<()> {
        let mut bus = lock_bus(self.bus);
        let mut id = [0u8; 1];
        bus.write_read(I2C_ADDR_H3LIS331, &[H3_WHO_AM_I], &mut id, I2C_TIMEOUT_TICKS)?;
        ensure!(id[0] == H3_WHO_AM_I_EXPECTED, "H3LIS331 WHO_AM_I mismatch: {:#04x}", id[0]);

        // Normal mode, 1 kHz, XYZ enabled
        bus.write(I2C_ADDR_H3LIS331, &[H3_CTRL_REG1, 0x3F], I2C_TIMEOUT_TICKS)?;
        // Block data update, ±400 g
        bus.write(I2C_ADDR_H3LIS331, &[H3_CTRL_REG4, 0xB0], I2C_TIMEOUT_TICKS)?;
        Ok(())
    }

    fn read(&mut self) -> anyhow::Result<Sample3> {
        let mut raw = [0u8; 6];
        lock_bus(self.bus).write_read(I2C_ADDR_H3LIS331, &[H3_OUT_X_L_AUTOINC], &mut raw, I2C_TIMEOUT_TICKS)?;

        let axis = |i: usize| {
            let counts = i16::from_le_bytes([raw[i], raw[i + 1]]) >> 4;
            counts as f64 * H3_G_PER_DIGIT * STANDARD_GRAVITY
        };
        Ok(Sample3::new(axis(0), axis(2), axis(4)))
    }
}

// ---------------------------------------------------------------------------
// AHT20 — ambient temperature
// ---------------------------------------------------------------------------
const AHT_CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const AHT_CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00];
const AHT_STATUS_BUSY: u8 = 0x80;
const AHT_MEASURE_TIME: Duration = Duration::from_millis(80);

pub struct Aht20 {
    bus: SharedBus,
}

impl Aht20 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }
}

impl TemperatureSource for Aht20 {
    fn begin(&mut self) -> anyhow::Result<()> {
        lock_bus(self.bus).write(I2C_ADDR_AHT20, &AHT_CMD_INIT, I2C_TIMEOUT_TICKS)?;
        thread::sleep(Duration::from_millis(10));
        Ok(())
    }

    fn read_celsius(&mut self) -> anyhow::Result<f64> {
        lock_bus(self.bus).write(I2C_ADDR_AHT20, &AHT_CMD_MEASURE, I2C_TIMEOUT_TICKS)?;
        // Conversion happens off-bus; do not hold the lock while waiting.
        thread::sleep(AHT_MEASURE_TIME);

        let mut raw = [0u8; 6];
        lock_bus(self.bus).read(I2C_ADDR_AHT20, &mut raw, I2C_TIMEOUT_TICKS)?;
        ensure!(raw[0] & AHT_STATUS_BUSY == 0, "AHT20 still busy");

        let counts = ((raw[3] as u32 & 0x0F) << 16) | ((raw[4] as u32) << 8) | raw[5] as u32;
        Ok(counts as f64 / (1u32 << 20) as f64 * 200.0 - 50.0)
    }
}

// ---------------------------------------------------------------------------
// HX711 — 24-bit load-cell amplifier, channel A gain 128
// ---------------------------------------------------------------------------
pub struct Hx711 {
    dout: PinDriver<'static, AnyInputPin, Input>,
    sck: PinDriver<'static, AnyOutputPin, Output>,
}

impl Hx711 {
    pub fn new(
        dout: PinDriver<'static, AnyInputPin, Input>,
        sck: PinDriver<'static, AnyOutputPin, Output>,
    ) -> Self {
        Self { dout, sck }
    }

    fn is_ready(&self) -> bool {
        self.dout.is_low()
    }
}

impl LoadCellSource for Hx711 {
    fn begin(&mut self) -> anyhow::Result<()> {
        self.sck.set_low()?;
        ensure!(self.wait_ready(Duration::from_millis(500)), "HX711 never signalled ready");
        Ok(())
    }

    fn wait_ready(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.is_ready() {
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn read_raw(&mut self) -> anyhow::Result<f64> {
        // Holding SCK high for >60 µs powers the part down, so clock with
        // interrupts off.
        let value = esp_idf_hal::interrupt::free(|| -> anyhow::Result<u32> {
            let mut value: u32 = 0;
            for _ in 0..24 {
                self.sck.set_high()?;
                Ets::delay_us(1);
                value = (value << 1) | self.dout.is_high() as u32;
                self.sck.set_low()?;
                Ets::delay_us(1);
            }
            // 25th pulse selects channel A / gain 128 for the next conversion
            self.sck.set_high()?;
            Ets::delay_us(1);
            self.sck.set_low()?;
            Ok(value)
        })?;

        // Sign-extend 24-bit two's complement
        let signed = ((value << 8) as i32) >> 8;
        Ok(signed as f64)
    }
}
