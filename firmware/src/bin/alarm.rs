//! Challenge 2: passive buzzer sounds while the light level is low.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
#[embassy_executor::main]
async fn main(spawner: embassy_executor::Spawner) {
    ldr_firmware::runtime::start_alarm(spawner);
}

#[cfg(not(target_os = "none"))]
fn main() {}
