//! HID report forwarding between the control loop and the USB endpoints.
//!
//! Actions run synchronously inside a tick and collect their reports in
//! a [`ReportQueue`]; [`forward_reports`] moves them into
//! [`HID_REPORTS`], which the writer task drains at the host's pace.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};

use super::UsbHidWriter;
use crate::config::HID_QUEUE_DEPTH;
use crate::hid::{HidReport, ReportQueue};

/// Control loop → USB writer.
pub static HID_REPORTS: Channel<CriticalSectionRawMutex, HidReport, HID_QUEUE_DEPTH> = Channel::new();

/// Move queued reports into [`HID_REPORTS`] until it is full.
///
/// Reports that do not fit stay in `queue` for the next call, so their
/// order is kept. Returns how many were moved.
pub fn forward_reports<const N: usize>(queue: &mut ReportQueue<N>) -> usize {
    let mut moved = 0;
    while !HID_REPORTS.is_full() {
        let Some(report) = queue.pop() else { break };
        if HID_REPORTS.try_send(report).is_err() {
            warn!("HID channel full - report dropped");
            break;
        }
        moved += 1;
    }
    moved
}

/// HID report forwarding task - writes each report to the endpoint
/// matching its kind.
pub async fn hid_writer_task(
    mut keyboard: UsbHidWriter,
    mut mouse: UsbHidWriter,
    report_rx: Receiver<'static, CriticalSectionRawMutex, HidReport, HID_QUEUE_DEPTH>,
) -> ! {
    info!("HID writer task started - waiting for reports");

    let mut buf = [0u8; 8];

    loop {
        let report = report_rx.receive().await;
        let n = report.serialize(&mut buf);

        let result = match report {
            HidReport::Keyboard(_) => keyboard.write(&buf[..n]).await,
            HidReport::Mouse(_) => mouse.write(&buf[..n]).await,
        };
        if let Err(e) = result {
            warn!("USB HID write failed: {}", e);
        }
    }
}
