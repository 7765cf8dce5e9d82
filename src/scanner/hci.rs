//! Raw HCI socket backend for Mi Scale scanning.
//!
//! Listens for LE advertising reports on a raw Linux HCI socket, without the
//! BlueZ daemon. Requires CAP_NET_RAW and CAP_NET_ADMIN capabilities or root
//! privileges.
//!
//! The session saves the socket filter that was installed before it started
//! and puts it back when the receive loop ends, whether the loop ends on
//! SIGINT or on a socket failure.

use super::{READING_CHANNEL_BUFFER_SIZE, ReadingResult, ScanConfig, ScanError};
use crate::eir::decode_readings;
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use log::{debug, info, warn};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::pin::pin;
use tokio::io::unix::AsyncFd;
use tokio::signal;
use tokio::sync::mpsc;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const SOL_HCI: c_int = 0;
const HCI_FILTER: c_int = 2;

// HCI packet types
const HCI_EVENT_PKT: u8 = 0x04;

// HCI events
const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta event sub-events
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// Scan types
const LE_SCAN_ACTIVE: u8 = 0x01;

// Own address type
const LE_PUBLIC_ADDRESS: u8 = 0x00;

// Filter policy
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

/// Maximum size of one HCI event frame (packet type + header + 255 parameter bytes).
const HCI_MAX_EVENT_SIZE: usize = 258;

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn new() -> Self {
        Self {
            type_mask: 0,
            event_mask: [0, 0],
            opcode: 0,
        }
    }

    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype as u32);
    }

    fn set_event(&mut self, event: u8) {
        let bit = event as usize;
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

/// The filter a scan session installs: HCI events, LE meta events only.
fn event_filter() -> HciFilter {
    let mut filter = HciFilter::new();
    filter.set_ptype(HCI_EVENT_PKT);
    filter.set_event(EVT_LE_META_EVENT);
    filter
}

/// LE Set Scan Parameters command
#[repr(C, packed)]
struct LeSetScanParametersCmd {
    scan_type: u8,
    interval: u16,
    window: u16,
    own_address_type: u8,
    filter_policy: u8,
}

/// LE Set Scan Enable command
#[repr(C, packed)]
struct LeSetScanEnableCmd {
    enable: u8,
    filter_dup: u8,
}

/// Create an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(0x01); // HCI command packet type
    packet.push((opcode & 0xFF) as u8);
    packet.push((opcode >> 8) as u8);
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// Open a raw HCI socket
fn open_hci_socket() -> Result<OwnedFd, ScanError> {
    // Raw Bluetooth sockets go through libc directly since nix has no
    // BTPROTO_HCI support. SOCK_NONBLOCK is required for AsyncFd.
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            SOCK_RAW | SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            BTPROTO_HCI,
        )
    };

    if fd < 0 {
        return Err(ScanError::Bluetooth(format!(
            "failed to create HCI socket: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Bind HCI socket to a device
fn bind_hci_socket(fd: &OwnedFd, dev_id: u16) -> Result<(), ScanError> {
    let addr = SockaddrHci {
        hci_family: AF_BLUETOOTH as u16,
        hci_dev: dev_id,
        hci_channel: 0, // HCI_CHANNEL_RAW
    };

    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const SockaddrHci as *const sockaddr,
            mem::size_of::<SockaddrHci>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "failed to bind HCI socket to hci{}: {}",
            dev_id,
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Read the filter currently installed on the socket, so it can be restored
/// when the session ends.
fn read_hci_filter(fd: &OwnedFd) -> Result<HciFilter, ScanError> {
    let mut filter = HciFilter::new();
    let mut len = mem::size_of::<HciFilter>() as socklen_t;

    let ret = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            SOL_HCI,
            HCI_FILTER,
            &mut filter as *mut HciFilter as *mut c_void,
            &mut len,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "failed to get HCI filter: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(filter)
}

/// Install a filter on the socket.
fn set_hci_filter(fd: &OwnedFd, filter: &HciFilter) -> Result<(), ScanError> {
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_HCI,
            HCI_FILTER,
            filter as *const HciFilter as *const c_void,
            mem::size_of::<HciFilter>() as socklen_t,
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "failed to set HCI filter: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Send an HCI command
fn send_hci_command(fd: &OwnedFd, packet: &[u8]) -> Result<(), ScanError> {
    let ret = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const c_void,
            packet.len(),
        )
    };

    if ret < 0 {
        return Err(ScanError::Bluetooth(format!(
            "failed to send HCI command: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Configure and enable LE scanning
fn configure_le_scan(fd: &OwnedFd) -> Result<(), ScanError> {
    // Active scan, 10ms interval and window (in 0.625ms units)
    let params = LeSetScanParametersCmd {
        scan_type: LE_SCAN_ACTIVE,
        interval: 0x0010,
        window: 0x0010,
        own_address_type: LE_PUBLIC_ADDRESS,
        filter_policy: FILTER_POLICY_ACCEPT_ALL,
    };

    let params_bytes = unsafe {
        std::slice::from_raw_parts(
            &params as *const LeSetScanParametersCmd as *const u8,
            mem::size_of::<LeSetScanParametersCmd>(),
        )
    };

    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_PARAMETERS, params_bytes);
    send_hci_command(fd, &packet)?;

    set_le_scan_enable(fd, true)
}

fn set_le_scan_enable(fd: &OwnedFd, enable: bool) -> Result<(), ScanError> {
    let cmd = LeSetScanEnableCmd {
        enable: enable as u8,
        filter_dup: 0x00, // the scale's repeated frames carry changing values
    };

    let cmd_bytes = unsafe {
        std::slice::from_raw_parts(
            &cmd as *const LeSetScanEnableCmd as *const u8,
            mem::size_of::<LeSetScanEnableCmd>(),
        )
    };

    let packet = hci_command_packet(OGF_LE_CTL, OCF_LE_SET_SCAN_ENABLE, cmd_bytes);
    send_hci_command(fd, &packet)
}

/// Route one received HCI event frame, returning its EIR payload if it is an
/// LE advertising report from the target device.
///
/// Frame layout after the packet type byte: event code, parameter length,
/// subevent, report count, then the first report (event type, address type,
/// 6-byte address in wire order, data length, data, RSSI). Declared lengths
/// are only trusted as far as the bytes actually received; anything truncated
/// routes to nothing.
///
/// A subevent other than the advertising report only skips this frame; the
/// caller keeps listening.
fn advertising_payload<'a>(frame: &'a [u8], target: &MacAddress) -> Option<&'a [u8]> {
    if frame.len() < 4 || frame[0] != HCI_EVENT_PKT || frame[1] != EVT_LE_META_EVENT {
        return None;
    }

    if frame[3] != EVT_LE_ADVERTISING_REPORT {
        debug!("skipping LE meta event with subevent {:#04x}", frame[3]);
        return None;
    }

    // Subevent + report count + report header up to the data length byte
    if frame.len() < 14 || frame[4] == 0 {
        return None;
    }

    let mut addr = [0u8; 6];
    addr.copy_from_slice(&frame[7..13]);
    if MacAddress::from_hci_bytes(addr) != *target {
        return None;
    }

    let data_len = frame[13] as usize;
    let end = 14 + data_len;
    if end > frame.len() {
        return None;
    }

    Some(&frame[14..end])
}

fn read_event(fd: &impl AsRawFd, buf: &mut [u8]) -> io::Result<usize> {
    let ret = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr() as *mut c_void, buf.len()) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

/// Receive loop: Listening until SIGINT, end of stream or a hard read error.
///
/// Transient conditions (EINTR, nothing queued) stay in the loop; SIGINT ends
/// it cleanly; EOF and other read errors end it with the error. The caller
/// restores the socket filter afterwards in every case.
async fn receive_loop(
    async_fd: &AsyncFd<OwnedFd>,
    target: &MacAddress,
    tx: &mpsc::Sender<ReadingResult>,
) -> Result<(), ScanError> {
    let mut sigint = pin!(signal::ctrl_c());
    let mut buf = [0u8; HCI_MAX_EVENT_SIZE];

    loop {
        let mut guard = tokio::select! {
            res = &mut sigint => {
                res?;
                debug!("interrupt received, ending scan");
                return Ok(());
            }
            ready = async_fd.readable() => ready?,
        };

        // Drain all queued frames before waiting for readiness again
        loop {
            match guard.try_io(|inner| read_event(inner, &mut buf)) {
                Ok(Ok(0)) => return Err(ScanError::Closed),
                Ok(Ok(n)) => {
                    if let Some(eir) = advertising_payload(&buf[..n], target) {
                        for reading in decode_readings(eir) {
                            if tx.send(Ok(reading)).await.is_err() {
                                // Receiver dropped, nobody left to report to
                                return Ok(());
                            }
                        }
                    }
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(e.into()),
                Err(_would_block) => break,
            }
        }
    }
}

/// Run the receive loop, then unwind the session: stop scanning, restore the
/// saved filter, and surface a terminal error through the channel.
async fn run_session(
    async_fd: AsyncFd<OwnedFd>,
    cmd_fd: OwnedFd,
    saved_filter: HciFilter,
    target: MacAddress,
    tx: mpsc::Sender<ReadingResult>,
) {
    let outcome = receive_loop(&async_fd, &target, &tx).await;

    if let Err(e) = set_le_scan_enable(&cmd_fd, false) {
        warn!("failed to stop LE scan: {e}");
    }
    if let Err(e) = set_hci_filter(async_fd.get_ref(), &saved_filter) {
        warn!("failed to restore HCI filter: {e}");
    }

    if let Err(e) = outcome {
        let _ = tx.send(Err(e)).await;
    }
}

/// Start a scan session on a raw HCI socket.
///
/// Opens the event socket, saves the filter installed on it, installs the
/// LE-meta-event filter, enables LE scanning through a separate command
/// socket, and spawns the session task. Readings arrive on the returned
/// channel until the session ends.
///
/// # Requirements
/// - CAP_NET_RAW and CAP_NET_ADMIN capabilities or root privileges
/// - An available HCI device (typically hci0)
pub async fn start_scan(config: ScanConfig) -> Result<mpsc::Receiver<ReadingResult>, ScanError> {
    let fd = open_hci_socket()?;
    bind_hci_socket(&fd, config.device)?;

    let saved_filter = read_hci_filter(&fd)?;
    set_hci_filter(&fd, &event_filter())?;

    // Commands go over their own socket so the event socket only ever sees
    // the filtered event stream
    let cmd_fd = open_hci_socket()?;
    bind_hci_socket(&cmd_fd, config.device)?;
    configure_le_scan(&cmd_fd)?;

    let async_fd = AsyncFd::new(fd)
        .map_err(|e| ScanError::Bluetooth(format!("failed to create async fd: {e}")))?;

    info!(
        "scanning for scale {} on hci{}",
        config.address, config.device
    );

    let (tx, rx) = mpsc::channel(READING_CHANNEL_BUFFER_SIZE);
    tokio::spawn(run_session(
        async_fd,
        cmd_fd,
        saved_filter,
        config.address,
        tx,
    ));

    Ok(rx)
}
