use log::error;
use std::panic;

/// Installs readable backtraces and mirrors the panic message into the log
/// file, which is the only place a headless run leaves a trace.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Panic: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);
    }));
}
