// ImpactWatch — Board bindings

#[cfg(target_os = "espidf")]
pub mod chips;
#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(not(target_os = "espidf"))]
pub mod bench;
