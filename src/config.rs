// ImpactWatch — Hardware & System Configuration
// Target: ESP32 (dual core, Xtensa) on the shoulder-pad harness

use std::time::Duration;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_I2C0_SDA: i32 = 21;       // Main board bus (thermometer, body sensors)
pub const PIN_I2C0_SCL: i32 = 22;
pub const PIN_I2C1_SDA: i32 = 17;       // Helmet bus (head sensors)
pub const PIN_I2C1_SCL: i32 = 16;
pub const PIN_SPI_MOSI: i32 = 23;       // SD card
pub const PIN_SPI_MISO: i32 = 19;
pub const PIN_SPI_CLK: i32 = 18;
pub const PIN_SPI_CS: i32 = 5;
pub const PIN_LOAD_CELL_LEFT_DAT: i32 = 13;
pub const PIN_LOAD_CELL_LEFT_CLK: i32 = 12;
pub const PIN_LOAD_CELL_RIGHT_DAT: i32 = 14;
pub const PIN_LOAD_CELL_RIGHT_CLK: i32 = 27;
pub const PIN_BUTTON_RECORD: i32 = 4;   // Active HIGH (pull-down)
pub const PIN_BUTTON_RESET: i32 = 39;   // Input-only pad, external pull-down

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_LSM6DSOX: u8 = 0x6A;
pub const I2C_ADDR_H3LIS331: u8 = 0x18;
pub const I2C_ADDR_AHT20: u8 = 0x38;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Sample streams
// ---------------------------------------------------------------------------
pub const STREAM_CAPACITY: usize = 100;
pub const MAX_SCALAR_STREAMS: usize = 10;
pub const MAX_VECTOR_STREAMS: usize = 10;

pub const LOCATION_HEAD: &str = "HEAD";
pub const LOCATION_BODY: &str = "BODY";
pub const LOCATION_LEFT_SHOULDER: &str = "LftShldr";
pub const LOCATION_RIGHT_SHOULDER: &str = "RgtShldr";
pub const CONCUSSION_LABEL: &str = "Concussion";

pub const SUFFIX_GYRO: &str = "Gyro";
pub const SUFFIX_LOW_G: &str = "LowGAccel";
pub const SUFFIX_HIGH_G: &str = "HighGAccel";

// ---------------------------------------------------------------------------
// Device bring-up
// ---------------------------------------------------------------------------
pub const CALIBRATION_SAMPLES: usize = 1000;
pub const CALIBRATION_INTERVAL: Duration = Duration::from_millis(1);

pub const IMU_INIT_ATTEMPTS: u32 = 5;
pub const IMU_INIT_BACKOFF: Duration = Duration::from_millis(50);
pub const ACCEL_INIT_ATTEMPTS: u32 = 5;
pub const ACCEL_INIT_BACKOFF: Duration = Duration::from_millis(50);
pub const LOAD_CELL_INIT_ATTEMPTS: u32 = 5;
pub const LOAD_CELL_INIT_BACKOFF: Duration = Duration::from_millis(100);
pub const THERMOMETER_INIT_ATTEMPTS: u32 = 5;
pub const THERMOMETER_INIT_BACKOFF: Duration = Duration::ZERO;
pub const STORAGE_INIT_ATTEMPTS: u32 = 10;
pub const STORAGE_INIT_BACKOFF: Duration = Duration::from_millis(10);

pub const LOAD_CELL_READY_TIMEOUT: Duration = Duration::from_millis(10);
pub const THERMOMETER_MIN_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Physics & detection thresholds
// ---------------------------------------------------------------------------
pub const STANDARD_GRAVITY: f64 = 9.806_65;   // m/s² per g
pub const IMPACT_THRESHOLD_G: f64 = 5.0;
pub const CONCUSSION_THRESHOLD: f64 = 0.25;
pub const LOW_G_SATURATION_G: f64 = 15.0;     // ±16 g part, treat as clipped above this
pub const LOAD_CELL_IMPACT_THRESHOLD: f64 = 200.0;

// ---------------------------------------------------------------------------
// Load cell calibration (two curves of three (raw, weight) pairs)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadCellCalibration {
    pub temperatures: [f64; 2],
    pub curves: [[(f64, f64); 3]; 2],
}

pub const LEFT_CELL_CALIBRATION: LoadCellCalibration = LoadCellCalibration {
    temperatures: [22.0, 22.0],
    curves: [
        [(15300.0, 0.0), (41100.0, 22.7), (55200.0, 45.4)],
        [(15300.0, 0.0), (41100.0, 22.7), (55200.0, 45.4)],
    ],
};

pub const RIGHT_CELL_CALIBRATION: LoadCellCalibration = LoadCellCalibration {
    temperatures: [22.0, 22.0],
    curves: [
        [(16350.0, 0.0), (48800.0, 22.7), (62850.0, 45.4)],
        [(16350.0, 0.0), (48800.0, 22.7), (62850.0, 45.4)],
    ],
};

// ---------------------------------------------------------------------------
// Recording session
// ---------------------------------------------------------------------------
pub const SESSION_QUIESCENCE: Duration = Duration::from_millis(2000);
pub const SESSION_REOPEN_COOLDOWN: Duration = Duration::from_millis(3000);
pub const LOG_FILE_BASE: &str = "impact";
pub const LOG_FILE_EXTENSION: &str = ".csv";
pub const SD_MOUNT_POINT: &str = "/sdcard";
pub const BENCH_LOG_DIR: &str = "impact-logs";

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_FUSION: usize = 10_000;
pub const STACK_LOAD_CELL: usize = 10_000;
pub const STACK_TEMPERATURE: usize = 6_144;
pub const STACK_LOGGER: usize = 10_000;
pub const STACK_TELEMETRY: usize = 10_000;
pub const STACK_CONTROL: usize = 6_144;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
pub const FUSION_PERIOD: Duration = Duration::from_millis(2);
pub const LOAD_CELL_PERIOD: Duration = Duration::from_millis(2);
pub const TEMPERATURE_PERIOD: Duration = Duration::from_secs(10);
pub const LOGGER_ACTIVE_PERIOD: Duration = Duration::from_millis(2);
pub const LOGGER_IDLE_PERIOD: Duration = Duration::from_millis(100);
pub const TELEMETRY_PERIOD: Duration = Duration::from_millis(2300);
pub const TELEMETRY_PAUSE_POLL: Duration = Duration::from_millis(2000);
pub const TELEMETRY_ROWS_PER_LOCK: usize = 10;
pub const TELEMETRY_YIELD: Duration = Duration::from_millis(100);
pub const CONTROL_POLL: Duration = Duration::from_millis(30);
pub const BUTTON_POLL: Duration = Duration::from_millis(10);
pub const BUTTON_DEBOUNCE: Duration = Duration::from_millis(100);
/// Upper bound on any single sleep, so shutdown is noticed promptly.
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Task placement (core, priority)
// ---------------------------------------------------------------------------
pub const CORE_SENSORS: u8 = 0;
pub const CORE_SERVICE: u8 = 1;
pub const PRIORITY_DEFAULT: u8 = 1;
pub const PRIORITY_INPUT: u8 = 2;
