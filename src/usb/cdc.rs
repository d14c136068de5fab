//! CDC-ACM serial port backing the configuration protocol.
//!
//! The port task copies received packets into [`RX_RING`] and drains
//! [`TX_PIPE`] into IN packets. The control loop never awaits: it talks
//! to both buffers through [`UsbSerialLink`].
//!
//! The link counts as connected while the host holds DTR, i.e. while
//! a terminal or the configuration tool has the port open.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::pipe::Pipe;
use embassy_time::Timer;
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender};
use embassy_usb::driver::EndpointError;
use heapless::Deque;

use super::UsbDriver;
use crate::config::{SERIAL_RX_BUFFER, SERIAL_TX_BUFFER, USB_CDC_PACKET_SIZE};
use crate::error::LinkError;
use crate::serial::SerialLink;

/// How often DTR is re-read while no data arrives (ms).
const DTR_POLL_MS: u64 = 20;

/// Wait before retrying when the receive ring is full (ms).
const RX_FULL_BACKOFF_MS: u64 = 1;

const PACKET: usize = USB_CDC_PACKET_SIZE as usize;

/// Port task → control loop.
static RX_RING: Mutex<CriticalSectionRawMutex, RefCell<Deque<u8, SERIAL_RX_BUFFER>>> =
    Mutex::new(RefCell::new(Deque::new()));

/// Control loop → port task.
static TX_PIPE: Pipe<CriticalSectionRawMutex, SERIAL_TX_BUFFER> = Pipe::new();

static LINK_UP: AtomicBool = AtomicBool::new(false);

/// Non-blocking [`SerialLink`] over the port buffers.
#[derive(Debug, Default)]
pub struct UsbSerialLink;

impl SerialLink for UsbSerialLink {
    fn is_connected(&self) -> bool {
        LINK_UP.load(Ordering::Acquire)
    }

    fn peek_byte(&mut self) -> Option<u8> {
        RX_RING.lock(|ring| ring.borrow().front().copied())
    }

    fn read_byte(&mut self) -> Option<u8> {
        RX_RING.lock(|ring| ring.borrow_mut().pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        // Only the control loop writes, so the free space cannot shrink
        // between this check and the writes below.
        if TX_PIPE.free_capacity() < bytes.len() {
            return Err(LinkError::Overflow);
        }
        let mut rest = bytes;
        while !rest.is_empty() {
            let n = TX_PIPE.try_write(rest).map_err(|_| LinkError::Overflow)?;
            rest = &rest[n..];
        }
        Ok(())
    }
}

/// Serial port task - must be spawned as a dedicated Embassy task.
pub async fn serial_task(class: CdcAcmClass<'static, UsbDriver>) -> ! {
    let (mut sender, mut receiver) = class.split();

    loop {
        receiver.wait_connection().await;
        RX_RING.lock(|ring| ring.borrow_mut().clear());
        TX_PIPE.clear();
        info!("Serial endpoint enabled");

        let error = match select(read_loop(&mut receiver), write_loop(&mut sender)).await {
            Either::First(e) | Either::Second(e) => e,
        };
        LINK_UP.store(false, Ordering::Release);
        info!("Serial endpoint gone: {}", error);
    }
}

async fn read_loop(receiver: &mut Receiver<'static, UsbDriver>) -> EndpointError {
    let mut buf = [0u8; PACKET];
    loop {
        LINK_UP.store(receiver.dtr(), Ordering::Release);

        let n = match select(receiver.read_packet(&mut buf), Timer::after_millis(DTR_POLL_MS)).await {
            Either::First(Ok(n)) => n,
            Either::First(Err(e)) => return e,
            Either::Second(()) => continue,
        };

        let mut pending = &buf[..n];
        while !pending.is_empty() {
            let pushed = RX_RING.lock(|ring| {
                let mut ring = ring.borrow_mut();
                let mut count = 0;
                for &byte in pending {
                    if ring.push_back(byte).is_err() {
                        break;
                    }
                    count += 1;
                }
                count
            });
            pending = &pending[pushed..];
            if !pending.is_empty() {
                // Hold off the host until the control loop catches up.
                Timer::after_millis(RX_FULL_BACKOFF_MS).await;
            }
        }
    }
}

async fn write_loop(sender: &mut Sender<'static, UsbDriver>) -> EndpointError {
    let mut buf = [0u8; PACKET];
    loop {
        let n = TX_PIPE.read(&mut buf).await;
        if let Err(e) = sender.write_packet(&buf[..n]).await {
            return e;
        }
        // A full packet does not end the transfer on the host side.
        if n == PACKET && TX_PIPE.is_empty() {
            if let Err(e) = sender.write_packet(&[]).await {
                return e;
            }
        }
    }
}
