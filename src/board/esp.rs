// ImpactWatch — ESP32 board bring-up
//
// Boot sequence:
//   1. Two I2C buses: main board (thermometer, body sensors) and helmet.
//   2. Load-cell amplifiers and control-panel buttons on GPIO.
//   3. SD card over SPI, mounted as FAT under SD_MOUNT_POINT.
//   4. Device init + stream registration, then the task runtime.
//   5. The main thread polls the control-panel buttons forever.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_hal::gpio::{IOPin, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;

use impactwatch::config::*;
use impactwatch::drivers::{init_with_retry, InitPolicy};
use impactwatch::input::ControlPanel;
use impactwatch::logger::FsStorage;
use impactwatch::{BringUpPolicy, Runtime, Sources, System};

use super::chips::{Aht20, H3lis331, Hx711, Lsm6dsox, SharedBus};

pub fn run() -> anyhow::Result<()> {
    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // ---- I2C buses --------------------------------------------------------
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let main_bus = leak_bus(I2cDriver::new(peripherals.i2c0, pins.gpio21, pins.gpio22, &i2c_config)?);
    let helmet_bus = leak_bus(I2cDriver::new(peripherals.i2c1, pins.gpio17, pins.gpio16, &i2c_config)?);

    // ---- Load cells -------------------------------------------------------
    let left_cell = Hx711::new(
        PinDriver::input(pins.gpio13.downgrade_input())?,
        PinDriver::output(pins.gpio12.downgrade_output())?,
    );
    let right_cell = Hx711::new(
        PinDriver::input(pins.gpio14.downgrade_input())?,
        PinDriver::output(pins.gpio27.downgrade_output())?,
    );

    // ---- Control panel buttons (active HIGH) ------------------------------
    let mut record_button = PinDriver::input(pins.gpio4.downgrade())?;
    record_button.set_pull(Pull::Down)?;
    let reset_button = PinDriver::input(pins.gpio39.downgrade_input())?;

    // ---- SD card ----------------------------------------------------------
    let (mut spi, mut sclk, mut mosi, mut miso, mut cs) =
        (peripherals.spi2, pins.gpio18, pins.gpio23, pins.gpio19, pins.gpio5.downgrade());
    let storage_policy = InitPolicy::new(STORAGE_INIT_ATTEMPTS, STORAGE_INIT_BACKOFF);
    let mut sd_mount = None;
    init_with_retry("SD card", &storage_policy, || {
        // SAFETY: a failed attempt drops its drivers before the next one
        // starts, so each peripheral has one owner at a time.
        let mount = unsafe {
            sd::mount(
                spi.clone_unchecked(),
                sclk.clone_unchecked(),
                mosi.clone_unchecked(),
                miso.clone_unchecked(),
                cs.clone_unchecked(),
            )
        }?;
        sd_mount = Some(mount);
        Ok(())
    });
    let storage_ok = sd_mount.is_some();
    let storage = FsStorage::mounted(SD_MOUNT_POINT);

    // ---- System -----------------------------------------------------------
    let sources = Sources {
        head_imu: Box::new(Lsm6dsox::new(helmet_bus)),
        body_imu: Box::new(Lsm6dsox::new(main_bus)),
        head_accel: Box::new(H3lis331::new(helmet_bus)),
        body_accel: Box::new(H3lis331::new(main_bus)),
        left_cell: Box::new(left_cell),
        right_cell: Box::new(right_cell),
        thermometer: Box::new(Aht20::new(main_bus)),
    };
    let system = System::bring_up(sources, Box::new(storage), storage_ok, &BringUpPolicy::default())?;
    let runtime = Runtime::spawn(system, Box::new(std::io::stdout()))?;

    // ---- Control panel (main thread) --------------------------------------
    let mut panel = ControlPanel::new(runtime.commands());
    loop {
        let now = Instant::now();
        if !panel.update(record_button.is_high(), reset_button.is_high(), now) {
            log::error!("Control task gone, stopping button polling");
            break;
        }
        thread::sleep(BUTTON_POLL);
    }

    runtime.shutdown()?;
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

/// Give a bus driver a `'static` home so every chip driver can share it.
fn leak_bus(driver: I2cDriver<'static>) -> SharedBus {
    Box::leak(Box::new(Mutex::new(driver)))
}

#[cfg(feature = "experimental")]
mod sd {
    use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::spi::{SpiAnyPins, SpiDriver, SpiDriverConfig};
    use esp_idf_svc::fs::fatfs::Fatfs;
    use esp_idf_svc::io::vfs::MountedFatfs;
    use esp_idf_svc::sd::{spi::SdSpiHostDriver, SdCardConfiguration, SdCardDriver};

    use impactwatch::config::SD_MOUNT_POINT;

    pub type Mount<'d> = MountedFatfs<Fatfs<SdCardDriver<SdSpiHostDriver<'d, SpiDriver<'d>>>>>;

    pub fn mount<'d>(
        spi: impl Peripheral<P = impl SpiAnyPins> + 'd,
        sclk: impl Peripheral<P = impl OutputPin> + 'd,
        mosi: impl Peripheral<P = impl OutputPin> + 'd,
        miso: impl Peripheral<P = impl InputPin> + 'd,
        cs: impl Peripheral<P = AnyIOPin> + 'd,
    ) -> anyhow::Result<Mount<'d>> {
        let driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &SpiDriverConfig::default())?;
        let host = SdSpiHostDriver::new(
            driver,
            Some(cs),
            AnyIOPin::none(),
            AnyIOPin::none(),
            AnyIOPin::none(),
            None,
        )?;
        let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
        let mount = MountedFatfs::mount(Fatfs::new_sdcard(0, card)?, SD_MOUNT_POINT, 4)?;
        log::info!("SD card mounted at {}", SD_MOUNT_POINT);
        Ok(mount)
    }
}

#[cfg(not(feature = "experimental"))]
mod sd {
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::peripheral::Peripheral;

    pub fn mount<S, A, B, C>(
        _spi: S,
        _sclk: A,
        _mosi: B,
        _miso: C,
        _cs: impl Peripheral<P = AnyIOPin>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("SD card support needs the `experimental` feature")
    }
}
