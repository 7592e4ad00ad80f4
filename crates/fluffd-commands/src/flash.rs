//! DLC file transfer.
//!
//! 1. Announce the transfer with a prepare frame on the control channel.
//! 2. Wait for the device to report it is ready to receive.
//! 3. Stream the file in fixed-size chunks on the bulk channel.
//!
//! Transfers on one connection are serialized.

use std::path::Path;
use std::time::Duration;

use fluffd_devices::{DeviceConnection, WriteChannel};

use crate::error::{CommandError, Result};

/// Notification prefix meaning "ready to receive".
pub const READY_MARKER: [u8; 2] = [0x24, 0x02];

/// How long to wait for [`READY_MARKER`].
pub const READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Bulk write size.
pub const CHUNK_SIZE: usize = 20;

/// Pause after every chunk.
pub const CHUNK_PACING: Duration = Duration::from_millis(5);

/// Longest filename sent in the prepare frame.
pub const MAX_FILENAME_LEN: usize = 32;

/// Largest file the 24-bit size field can describe.
pub const MAX_FILE_SIZE: usize = 0xFF_FFFF;

const PREPARE_OPCODE: [u8; 2] = [0x50, 0x00];
const DLC_SLOT: u8 = 0x02;
const PREPARE_TERMINATOR: [u8; 2] = [0x00, 0x00];

/// Result of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashReport {
    pub bytes: usize,
    pub chunks: usize,
}

/// Whether a notification is the ready marker.
pub fn is_ready(frame: &[u8]) -> bool {
    frame.starts_with(&READY_MARKER)
}

/// Build the prepare frame for a file of `size` bytes.
///
/// Non-ASCII characters are dropped from the filename before truncation.
pub fn prepare_frame(filename: &str, size: usize) -> Vec<u8> {
    let name: Vec<u8> = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| c as u8)
        .take(MAX_FILENAME_LEN)
        .collect();

    let mut frame = Vec::with_capacity(PREPARE_OPCODE.len() + 4 + name.len() + 2);
    frame.extend_from_slice(&PREPARE_OPCODE);
    frame.extend_from_slice(&[
        ((size >> 16) & 0xFF) as u8,
        ((size >> 8) & 0xFF) as u8,
        (size & 0xFF) as u8,
    ]);
    frame.push(DLC_SLOT);
    frame.extend_from_slice(&name);
    frame.extend_from_slice(&PREPARE_TERMINATOR);
    frame
}

async fn read_dlc(path: &Path) -> Result<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CommandError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(CommandError::File(format!("{}: {}", path.display(), e))),
    }
}

/// Send the DLC file at `path` to the device under `filename`.
pub async fn flash_dlc(
    conn: &DeviceConnection,
    filename: &str,
    path: &Path,
) -> Result<FlashReport> {
    let _transfer = conn.transfer_guard().await;

    let content = read_dlc(path).await?;
    if content.len() > MAX_FILE_SIZE {
        return Err(CommandError::validation(format!(
            "DLC file is {} bytes, limit is {}",
            content.len(),
            MAX_FILE_SIZE
        )));
    }
    tracing::info!(address = %conn.address(), filename, size = content.len(), "Starting DLC transfer");

    // Register before announcing so a fast reply is not missed.
    let ready = conn.expect_notification(is_ready).await?;
    conn.write(WriteChannel::Control, &prepare_frame(filename, content.len()))
        .await?;
    ready.wait(READY_TIMEOUT).await.map_err(|e| {
        tracing::error!(address = %conn.address(), filename, error = %e, "Device never reported ready");
        e
    })?;

    let total = content.len().div_ceil(CHUNK_SIZE);
    for (i, chunk) in content.chunks(CHUNK_SIZE).enumerate() {
        tracing::trace!(chunk = i + 1, total, len = chunk.len(), "DLC chunk");
        conn.write(WriteChannel::Bulk, chunk).await?;
        tokio::time::sleep(CHUNK_PACING).await;
    }

    tracing::info!(address = %conn.address(), filename, chunks = total, "DLC transfer complete");
    Ok(FlashReport {
        bytes: content.len(),
        chunks: total,
    })
}
