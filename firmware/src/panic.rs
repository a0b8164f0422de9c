//! Fatal error path: bring-up failures and broken invariants end here.

use core::panic::PanicInfo;

use defmt::{Display2Format, error};

#[panic_handler]
fn on_panic(info: &PanicInfo) -> ! {
    error!("PANIC: {}", Display2Format(info));
    cortex_m::asm::udf()
}
