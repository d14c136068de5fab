//! Macro deck - Embassy entry point for the nRF52840.
//!
//! Task layout:
//!
//! - `usb_task`     runs the USB device stack
//! - `hid_task`     writes queued keyboard/mouse reports to the host
//! - `serial_task`  moves CDC-ACM bytes to and from the control loop
//! - `main`         the control loop: samples encoders, pumps the
//!                  serial protocol, runs dispatch ticks, persists new
//!                  configurations
//!
//! The deck model is owned by the control loop alone; tasks only see
//! byte buffers and HID reports.

#![no_std]
#![no_main]

extern crate alloc;

use core::mem::MaybeUninit;

use defmt::{debug, info, unwrap, warn};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_executor::Spawner;
use embassy_nrf::nvmc::Nvmc;
use embassy_time::{Duration, Instant, Ticker, Timer};
use embassy_usb::class::cdc_acm::CdcAcmClass;
use embassy_usb::UsbDevice;
use embedded_alloc::LlffHeap as Heap;
use {defmt_rtt as _, panic_probe as _};

use macrodeck::board::BoardPins;
use macrodeck::config::{
    ENCODER_SAMPLE_US, FIRMWARE_VERSION, HEAP_SIZE, HID_QUEUE_DEPTH, PASSTHROUGH_CAPACITY,
    TICK_INTERVAL_MS, WAIT_FOR_HOST_AT_BOOT,
};
use macrodeck::storage::ConfigStore;
use macrodeck::usb::cdc::{self, UsbSerialLink};
use macrodeck::usb::{self, hid_device, UsbDriver, UsbHidWriter};
use macrodeck::{Deck, ProtocolHandler, ReportQueue, SerialLink};

#[global_allocator]
static HEAP: Heap = Heap::empty();

fn init_heap() {
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    // SAFETY: called once, before the first allocation.
    unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
}

#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) -> ! {
    usb::run_usb_device(device).await
}

#[embassy_executor::task]
async fn hid_task(keyboard: UsbHidWriter, mouse: UsbHidWriter) -> ! {
    hid_device::hid_writer_task(keyboard, mouse, hid_device::HID_REPORTS.receiver()).await
}

#[embassy_executor::task]
async fn serial_task(class: CdcAcmClass<'static, UsbDriver>) -> ! {
    cdc::serial_task(class).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    init_heap();
    let p = embassy_nrf::init(Default::default());
    info!("Macro deck {} starting", FIRMWARE_VERSION);

    let mut pins = BoardPins::new(p.PWM0);
    let mut store = ConfigStore::new(BlockingAsync::new(Nvmc::new(p.NVMC)));

    let mut deck: Deck = Deck::empty();
    if let Some(document) = store.load().await {
        if let Err(e) = deck.rebuild(&document, &mut pins) {
            warn!("Stored configuration rejected: {}", e);
        }
    }

    let usb = usb::init(p.USBD);
    unwrap!(spawner.spawn(usb_task(usb.device)));
    unwrap!(spawner.spawn(hid_task(usb.keyboard_writer, usb.mouse_writer)));
    unwrap!(spawner.spawn(serial_task(usb.serial)));

    let mut link = UsbSerialLink;
    if WAIT_FOR_HOST_AT_BOOT {
        info!("Waiting for host to open the serial port");
        while !link.is_connected() {
            Timer::after_millis(10).await;
        }
    }

    let mut handler = ProtocolHandler::new();
    let mut hid: ReportQueue<HID_QUEUE_DEPTH> = ReportQueue::new();
    let mut passthrough: heapless::Vec<u8, PASSTHROUGH_CAPACITY> = heapless::Vec::new();

    let tick = Duration::from_millis(TICK_INTERVAL_MS);
    let mut sampler = Ticker::every(Duration::from_micros(ENCODER_SAMPLE_US));
    let mut next_tick = Instant::now() + tick;

    info!("Control loop running");
    loop {
        sampler.next().await;
        deck.sample_encoders(&mut pins);
        if !hid.is_empty() {
            hid_device::forward_reports(&mut hid);
        }

        let now = Instant::now();
        if now < next_tick {
            continue;
        }
        next_tick += tick;
        if next_tick < now {
            next_tick = now + tick;
        }

        let summary = handler.pump(&mut link, &mut deck, &mut pins, &mut passthrough);
        if !passthrough.is_empty() {
            debug!("host: {=[u8]:a}", passthrough.as_slice());
            passthrough.clear();
        }
        if summary.reset_requested {
            info!("Restarting");
            Timer::after_millis(10).await;
            cortex_m::peripheral::SCB::sys_reset();
        }
        if summary.config_changed {
            if let Some(document) = deck.source() {
                store.save(document).await;
            }
        }

        let report = deck.tick(&mut pins, &mut hid, now.as_millis());
        hid_device::forward_reports(&mut hid);
        if handler.is_connected() {
            for event in &report.events {
                if let Err(e) = handler.notify_input(&mut link, event) {
                    warn!("Input notification dropped: {}", e);
                }
            }
        }
    }
}
