//! Application-wide constants and compile-time configuration.
//!
//! Everything the runtime configuration document does not cover lives
//! here: USB identity, timing, buffer bounds and the board pin table.

// Device identity

/// Firmware version reported in `RESPOND_IDENTIFY`.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0002;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "macrodeck";
pub const USB_PRODUCT: &str = "Macro Deck";
pub const USB_SERIAL_NUMBER: &str = "000001";

/// USB HID polling interval (ms).
pub const USB_HID_POLL_MS: u8 = 1;

/// Max packet size of the CDC-ACM data endpoints.
pub const USB_CDC_PACKET_SIZE: u16 = 64;

// Control loop timing

/// Period of one dispatch tick (ms).
pub const TICK_INTERVAL_MS: u64 = 5;

/// Encoder pins are sampled this often between ticks (µs).
pub const ENCODER_SAMPLE_US: u64 = 250;

/// Block at boot until the host opens the serial port.
pub const WAIT_FOR_HOST_AT_BOOT: bool = false;

// Input defaults

/// Button debounce time when the component does not set `debounce` (ms).
pub const DEFAULT_DEBOUNCE_MS: u32 = 10;

/// Minimum |delta| per tick before an encoder turn dispatches.
/// Quadrature bounce on a single detent yields 1-2 counts.
pub const DEFAULT_ENCODER_THRESHOLD: u32 = 3;

// LED feedback

/// Toggle period used when the host asks to identify an LED (ms).
pub const IDENTIFY_FLASH_PERIOD_MS: u32 = 100;

/// How long an identify flash lasts (ms).
pub const IDENTIFY_FLASH_MS: u32 = 2_000;

// Serial link

/// Largest accepted frame payload. A config document has to fit.
pub const MAX_FRAME_DATA: usize = 16 * 1024;

/// Incidental (non-frame) bytes buffered per pump before draining stops.
pub const PASSTHROUGH_CAPACITY: usize = 256;

/// Receive ring between the CDC reader task and the control loop.
pub const SERIAL_RX_BUFFER: usize = 1024;

/// Transmit pipe between the control loop and the CDC writer task.
/// Holds one full-size frame.
pub const SERIAL_TX_BUFFER: usize = MAX_FRAME_DATA + 1024;

/// Max input events reported by one tick.
pub const MAX_TICK_EVENTS: usize = 16;

/// HID reports buffered between the control loop and the USB writer.
pub const HID_QUEUE_DEPTH: usize = 32;

// Board
//
// nRF52840-DK numbering: pin = port * 32 + index (P1.02 → 34).

/// Pins driven by the hardware PWM block; `analog_write` on any other
/// pin falls back to on/off at half scale.
pub const PWM_PINS: [u8; 4] = [13, 14, 15, 16];

/// Highest GPIO number on the nRF52840 (P1.15).
pub const MAX_GPIO: u8 = 47;

/// Heap for the configuration model and serial payloads (bytes).
pub const HEAP_SIZE: usize = 48 * 1024;

// Stored configuration

/// Flash page index where configuration storage starts (4 KB pages).
pub const STORAGE_FLASH_PAGE_START: u32 = 252;

/// Number of flash pages reserved for configuration storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

/// Largest document persisted to flash; bigger ones stay RAM-only.
pub const MAX_STORED_CONFIG: usize = 3 * 1024;
