//! linectl - EdgeLineRegistry front end
//!
//! On ESP-IDF:
//! 1. Bring up the GPIO chip and a static registry
//! 2. Export and arm the watched line
//! 3. Loop: dispatch notifications, drain logs to UART1, serve the console
//!
//! On a host build the same wiring runs against the simulated chip and
//! replays a short entry/entry/exit pulse train.

#![cfg_attr(target_os = "espidf", no_std)]
#![cfg_attr(target_os = "espidf", no_main)]

#[cfg(target_os = "espidf")]
mod target {
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::sys as esp_idf_sys;
    use spin::Once;

    use edge_line_registry::console::Console;
    use edge_line_registry::hal::esp::{install_edge_sink, EspChip};
    use edge_line_registry::log_drain::{init_uart_logger, LogDrain, UartLoggerConfig, UartSink};
    use edge_line_registry::{rt_error, rt_info, Dispatcher, Registry, RegistryConfig, BG_LOG_STREAM};

    /// GPIO whose pulses are classified.
    const WATCHED_LINE: u32 = 17;

    static REGISTRY: Once<Registry<EspChip>> = Once::new();

    fn registry() -> &'static Registry<EspChip> {
        REGISTRY.call_once(|| Registry::new(EspChip::new(), RegistryConfig::new().with_chip_base(0)))
    }

    fn timestamp_us() -> i64 {
        unsafe { esp_idf_sys::esp_timer_get_time() }
    }

    /// Non-blocking read of one console byte from stdin (UART0).
    fn read_console_byte() -> Option<u8> {
        let c = unsafe { esp_idf_sys::getchar() };
        if c >= 0 {
            Some(c as u8)
        } else {
            None
        }
    }

    #[no_mangle]
    fn main() {
        esp_idf_sys::link_patches();

        let Some(peripherals) = Peripherals::take().ok() else {
            return;
        };
        let Ok(mut uart) = init_uart_logger(
            peripherals.uart1,
            peripherals.pins.gpio43,
            &UartLoggerConfig::default(),
        ) else {
            return;
        };

        let registry = registry();
        install_edge_sink(registry);

        match registry.export(WATCHED_LINE).and_then(|slot| registry.lookup(slot)?.enable()) {
            Ok(()) => rt_info!(BG_LOG_STREAM, timestamp_us(), "Watching GPIO {}", WATCHED_LINE),
            Err(e) => rt_error!(BG_LOG_STREAM, timestamp_us(), "GPIO {} setup failed: {}", WATCHED_LINE, e),
        }

        let mut dispatcher = Dispatcher::new(registry);
        let mut drain = LogDrain::new();
        let mut console = Console::new();
        let mut last_count = registry.count();

        let mut sink = UartSink(&mut uart);
        console.print_banner(&mut sink);

        loop {
            dispatcher.pump(registry);

            let count = registry.count();
            if count != last_count {
                rt_info!(BG_LOG_STREAM, timestamp_us(), "count: {}", count);
                last_count = count;
            }

            while let Some(byte) = read_console_byte() {
                console.process_byte(byte, registry, &mut sink);
            }

            if !drain.poll(timestamp_us(), &mut sink) {
                unsafe {
                    esp_idf_sys::vTaskDelay(1);
                }
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    use edge_line_registry::console::Console;
    use edge_line_registry::log_drain::drain_once;
    use edge_line_registry::{Dispatcher, Level, Registry, RegistryConfig, SimChip};

    /// Physical line the demo exports.
    const LINE: u32 = 17;

    struct Stdout;

    impl core::fmt::Write for Stdout {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            print!("{}", s);
            Ok(())
        }
    }

    let registry: Registry<SimChip> = Registry::new(SimChip::new(), RegistryConfig::default());
    let hw_line = registry.config().chip_base + LINE;
    let mut out = Stdout;

    let slot = match registry.export(LINE) {
        Ok(slot) => slot,
        Err(e) => {
            eprintln!("export {}: {}", LINE, e);
            std::process::exit(1);
        }
    };

    let mut dispatcher = Dispatcher::new(&registry);
    {
        let mut handle = match registry.open(slot) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("open slot {}: {}", slot, e);
                std::process::exit(1);
            }
        };
        if let Err(e) = handle.register_async().and_then(|_| handle.enable()) {
            eprintln!("arm slot {}: {}", slot, e);
            std::process::exit(1);
        }

        // High pulses of 100 ms, 100 ms, 200 ms: each falling edge is
        // classified by the time since the rising edge before it
        let chip = registry.chip();
        for width_us in [100_000u64, 100_000, 200_000] {
            chip.advance_us(50_000);
            chip.raise(&registry, hw_line, Level::High);
            chip.advance_us(width_us);
            chip.raise(&registry, hw_line, Level::Low);

            dispatcher.poll(&registry, &mut |n| {
                println!(
                    "notify slot {}: {} (delta {} us) count={} delivered={:#x}",
                    n.slot,
                    n.event.kind.as_str(),
                    n.event.delta_us,
                    n.event.count,
                    n.delivery.delivered
                );
            });
            if handle.take_notification() {
                let mut buf = [0u8; 16];
                handle.rewind();
                if let Ok(len) = handle.read(&mut buf) {
                    print!("read: {}", String::from_utf8_lossy(&buf[..len]));
                }
            }
        }
    }

    let mut console = Console::new();
    console.feed("list\nshow\nstats\n", &registry, &mut out);
    println!();

    if let Err(e) = registry.unexport(LINE) {
        eprintln!("unexport {}: {}", LINE, e);
    }
    drain_once(&mut out);
    println!("final count: {}", registry.count());
}
