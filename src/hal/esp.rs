//! ESP-IDF GPIO backend.
//!
//! Talks to the IDF GPIO driver through raw `esp_idf_svc::sys` calls. Edge
//! interrupts go through the shared GPIO ISR service: the packed
//! [`EdgeTarget`] is the handler argument, and the handler forwards it to
//! the sink installed with [`install_edge_sink`].
//!
//! Hardware numbers are GPIO numbers, so the registry should run with
//! `chip_base = 0`.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use esp_idf_svc::sys as esp_idf_sys;
use spin::Once;

use super::{EdgeSink, EdgeTarget, HwError, LineChip};
use crate::sample::{Direction, Level};

/// Tracked pins (covers every GPIO of current ESP32 parts).
const MAX_PINS: usize = 64;

static EDGE_SINK: Once<&'static dyn EdgeSink> = Once::new();

/// Install the receiver of all edge interrupts. First call wins.
///
/// Returns false if a sink was already installed.
pub fn install_edge_sink(sink: &'static dyn EdgeSink) -> bool {
    let mut installed = false;
    EDGE_SINK.call_once(|| {
        installed = true;
        sink
    });
    installed
}

/// GPIO ISR service trampoline.
unsafe extern "C" fn edge_isr(arg: *mut c_void) {
    let Some(target) = EdgeTarget::from_raw(arg as usize as u32) else {
        return;
    };
    if let Some(sink) = EDGE_SINK.get() {
        sink.on_edge(target);
    }
}

/// Bound GPIO.
#[derive(Debug)]
pub struct EspLine {
    gpio: i32,
}

/// The on-chip GPIO controller.
pub struct EspChip {
    isr_service: AtomicBool,
    directions: [AtomicU8; MAX_PINS],
}

impl EspChip {
    pub fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const IN: AtomicU8 = AtomicU8::new(Direction::In as u8);
        Self {
            isr_service: AtomicBool::new(false),
            directions: [IN; MAX_PINS],
        }
    }

    fn ensure_isr_service(&self) -> Result<(), HwError> {
        if self.isr_service.load(Ordering::Acquire) {
            return Ok(());
        }
        let err = unsafe { esp_idf_sys::gpio_install_isr_service(0) };
        // INVALID_STATE: someone else already installed it
        if err != esp_idf_sys::ESP_OK as esp_idf_sys::esp_err_t
            && err != esp_idf_sys::ESP_ERR_INVALID_STATE as esp_idf_sys::esp_err_t
        {
            return Err(HwError::NoIrq);
        }
        self.isr_service.store(true, Ordering::Release);
        Ok(())
    }

    fn check(err: esp_idf_sys::esp_err_t, on_error: HwError) -> Result<(), HwError> {
        if err == esp_idf_sys::ESP_OK as esp_idf_sys::esp_err_t {
            Ok(())
        } else {
            Err(on_error)
        }
    }
}

impl Default for EspChip {
    fn default() -> Self {
        Self::new()
    }
}

impl LineChip for EspChip {
    type Line = EspLine;

    fn request(&self, hw_line: u32) -> Result<EspLine, HwError> {
        if hw_line as usize >= MAX_PINS
            || hw_line as esp_idf_sys::gpio_num_t >= esp_idf_sys::gpio_num_t_GPIO_NUM_MAX
        {
            return Err(HwError::NoSuchLine);
        }
        let gpio = hw_line as i32;
        Self::check(unsafe { esp_idf_sys::gpio_reset_pin(gpio) }, HwError::NoSuchLine)?;
        Ok(EspLine { gpio })
    }

    fn release(&self, line: EspLine) -> Result<(), HwError> {
        self.directions[line.gpio as usize].store(Direction::In as u8, Ordering::Relaxed);
        Self::check(unsafe { esp_idf_sys::gpio_reset_pin(line.gpio) }, HwError::Io)
    }

    fn hw_line(&self, line: &EspLine) -> u32 {
        line.gpio as u32
    }

    fn level(&self, line: &EspLine) -> Result<Level, HwError> {
        let raw = unsafe { esp_idf_sys::gpio_get_level(line.gpio) };
        Ok(Level::from_raw(raw as u32))
    }

    fn set_level(&self, line: &mut EspLine, level: Level) -> Result<(), HwError> {
        Self::check(
            unsafe { esp_idf_sys::gpio_set_level(line.gpio, level.as_u8() as u32) },
            HwError::Io,
        )
    }

    fn direction(&self, line: &EspLine) -> Direction {
        match self.directions[line.gpio as usize].load(Ordering::Relaxed) {
            1 => Direction::Out,
            _ => Direction::In,
        }
    }

    fn set_direction(&self, line: &mut EspLine, direction: Direction) -> Result<(), HwError> {
        let mode = match direction {
            Direction::In => esp_idf_sys::gpio_mode_t_GPIO_MODE_INPUT,
            // Input stays enabled so `value` reads back the driven level
            Direction::Out => esp_idf_sys::gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
        };
        if direction == Direction::Out {
            Self::check(unsafe { esp_idf_sys::gpio_set_level(line.gpio, 0) }, HwError::Io)?;
        }
        Self::check(unsafe { esp_idf_sys::gpio_set_direction(line.gpio, mode) }, HwError::Io)?;
        self.directions[line.gpio as usize].store(direction as u8, Ordering::Relaxed);
        Ok(())
    }

    fn sample_level(&self, hw_line: u32) -> Result<Level, HwError> {
        if hw_line as usize >= MAX_PINS {
            return Err(HwError::NoSuchLine);
        }
        let raw = unsafe { esp_idf_sys::gpio_get_level(hw_line as i32) };
        Ok(Level::from_raw(raw as u32))
    }

    fn attach_edge_irq(&self, line: &mut EspLine, target: EdgeTarget) -> Result<(), HwError> {
        if EDGE_SINK.get().is_none() {
            return Err(HwError::NoIrq);
        }
        self.ensure_isr_service()?;
        unsafe {
            Self::check(
                esp_idf_sys::gpio_set_intr_type(line.gpio, esp_idf_sys::gpio_int_type_t_GPIO_INTR_ANYEDGE),
                HwError::NoIrq,
            )?;
            Self::check(
                esp_idf_sys::gpio_isr_handler_add(
                    line.gpio,
                    Some(edge_isr),
                    target.to_raw() as usize as *mut c_void,
                ),
                HwError::NoIrq,
            )?;
            Self::check(esp_idf_sys::gpio_intr_enable(line.gpio), HwError::NoIrq)
        }
    }

    fn detach_edge_irq(&self, line: &mut EspLine) {
        unsafe {
            esp_idf_sys::gpio_intr_disable(line.gpio);
            esp_idf_sys::gpio_isr_handler_remove(line.gpio);
        }
    }

    fn now_us(&self) -> u64 {
        unsafe { esp_idf_sys::esp_timer_get_time() as u64 }
    }
}
