//! Bridge firmware
//!
//! The image gem5 boots on the bridge board. Start of day:
//!
//! 1. reset trampoline sets up the stack, `.data` and `.bss` ([`simrt::boot`])
//! 2. `main` installs the logger and the exception vectors
//! 3. the vector table is built with the avoidance handler on the bridge line
//! 4. the GIC is brought up and the dispatcher takes over
//!
//! On a development host this builds to a stub so the workspace still
//! compiles and tests there.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod firmware {
    use core::fmt::Write;
    use core::panic::PanicInfo;

    use spin::Once;

    use simrt::bridge::{AvoidanceHandler, AvoidanceParams, BridgeWindow};
    use simrt::console::Console;
    use simrt::dispatch::Dispatcher;
    use simrt::gic::Gic;
    use simrt::mmio::Volatile;
    use simrt::semihosting::{Host, Semihosting};
    use simrt::vectors::VectorTable;
    use simrt::{boot, exception, hprintln, logger, Config};

    const CONFIG: Config = Config::DEFAULT;

    /// Firmware version string
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    static BRIDGE: AvoidanceHandler<Volatile> = AvoidanceHandler::new(
        // SAFETY: the bridge window and the buffers it publishes are mapped
        // device memory on the bridge board
        BridgeWindow::new(unsafe { Volatile::new() }, CONFIG.bridge_base),
        AvoidanceParams::DEFAULT,
    );

    static TABLE: Once<VectorTable<'static>> = Once::new();
    static DISPATCHER: Once<Dispatcher<'static, Gic<Volatile>>> = Once::new();

    /// Entered from the reset routine once memory is set up
    #[no_mangle]
    pub extern "C" fn main() -> i32 {
        if logger::init(CONFIG.log_level).is_err() {
            hprintln!("[BOOT] logger already installed");
        }
        log::info!("bridge-firmware v{}", VERSION);

        exception::init();

        let table = match VectorTable::builder(boot::stack_top(), boot::entry())
            .register(CONFIG.bridge_line, &BRIDGE)
        {
            Ok(builder) => builder.build(),
            Err(err) => {
                log::error!("boot: cannot register bridge handler: {}", err);
                return 1;
            }
        };
        let table = TABLE.call_once(|| table);
        log::info!(
            "boot: bridge handler on line {} (intid {})",
            CONFIG.bridge_line,
            simrt::vectors::EXTERNAL_BASE as u32 + CONFIG.bridge_line
        );

        // SAFETY: GICD/GICC bases come from the platform memory map
        let gic = Gic::new(unsafe { Volatile::new() }, CONFIG.gicd_base, CONFIG.gicc_base);
        gic.bring_up(&CONFIG);

        let dispatcher = DISPATCHER.call_once(|| Dispatcher::new(gic, table, CONFIG.dispatch));
        exception::install(dispatcher);
        dispatcher.start();
        dispatcher.run()
    }

    /// Report the panic to the host and exit with status 1.
    ///
    /// Uses its own gateway: the shared one may be locked by the code that
    /// panicked.
    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        let mut host = Host::new(Semihosting::new(CONFIG.address_policy));
        let mut console = Console::stdout(&mut host);

        let _ = writeln!(console);
        let _ = writeln!(console, "!!! PANIC !!!");
        if let Some(location) = info.location() {
            let _ = writeln!(
                console,
                "Location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        let _ = writeln!(console, "Message: {}", info.message());

        host.exit(1)
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("bridge-firmware runs on the simulated ARM target only");
}
