// ImpactWatch — Firmware Entry Point
//
// On the ESP32 this brings up the sensor harness and runs the monitoring
// tasks forever. On a host it runs a scripted bench scenario against
// simulated sensors, writing CSV logs under BENCH_LOG_DIR.

mod board;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("ImpactWatch firmware starting…");

    board::esp::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("ImpactWatch bench starting…");

    board::bench::run()
}
