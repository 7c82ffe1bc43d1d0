//! Firmware image upload.
//!
//! An image goes up one flash page at a time. Each page is staged in the
//! device's RAM page buffer with chunked writes, then committed with a
//! CRC-32 computed locally over the staged page. The device refuses the
//! commit on mismatch, so a chunk corrupted in transit can never reach
//! flash.

use std::io::{Read, Write};

use bootlink_protocol::AppId;
use crc::{Crc, CRC_32_ISO_HDLC};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::client::{Client, ClientError};

/// Page CRC (CRC-32/ISO-HDLC, the zlib polynomial the device checks).
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Bytes of page data per writePageBuffer request. The frame payload
/// caps at 127 bytes; 3 header bytes and 3 argument bytes leave room for
/// this much data.
const CHUNK_LEN: usize = 112;

/// Largest flash page the staging flow can address: chunk offsets ride in
/// the method's u16 field, so every chunk start must stay below 65536.
const MAX_PAGE_SIZE: usize = 1 << 16;

/// Totals reported after a completed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    /// Pages committed to flash.
    pub pages: usize,
    /// Image bytes sent, excluding pad bytes.
    pub bytes: usize,
}

/// Erase the partition and flash `image` into it page by page.
///
/// The final page is padded to `page_size` with 0xFF, matching the erased
/// state the device's staging buffer starts from. A page size of zero, or
/// one too large for the staging offsets to address, fails before any I/O.
pub fn upload<P: Read + Write>(
    client: &mut Client<P>,
    app: AppId,
    image: &[u8],
    page_size: usize,
) -> Result<UploadReport, ClientError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ClientError::InvalidPageSize(page_size));
    }

    let pages = image.len().div_ceil(page_size);
    info!(
        "uploading {} bytes to {app:?} ({pages} pages of {page_size})",
        image.len()
    );

    client.erase_app(app)?;

    let progress = ProgressBar::new(pages as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} pages ({eta})")
            .expect("static template"),
    );

    for (page_no, page) in image.chunks(page_size).enumerate() {
        stage_page(client, page, page_size)?;

        let crc = padded_crc(page, page_size);
        debug!("committing page {page_no} (crc {crc:#010x})");
        client.write_page(app, page_no as u16, crc)?;
        progress.inc(1);
    }

    progress.finish_and_clear();
    Ok(UploadReport {
        pages,
        bytes: image.len(),
    })
}

/// Stage one page into the device's buffer in chunks.
fn stage_page<P: Read + Write>(
    client: &mut Client<P>,
    page: &[u8],
    page_size: usize,
) -> Result<(), ClientError> {
    client.erase_page_buffer()?;

    // A short final page only sends its real bytes; erase_page_buffer
    // already left the tail at 0xFF.
    debug_assert!(page.len() <= page_size);
    for (i, chunk) in page.chunks(CHUNK_LEN).enumerate() {
        client.write_page_buffer((i * CHUNK_LEN) as u16, chunk)?;
    }
    Ok(())
}

/// CRC-32 of the page as the device's staging buffer will hold it, with
/// the 0xFF pad bytes included.
fn padded_crc(page: &[u8], page_size: usize) -> u32 {
    let mut digest = CRC32.digest();
    digest.update(page);
    if page.len() < page_size {
        digest.update(&vec![0xFF; page_size - page.len()]);
    }
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct NullPort;

    impl Read for NullPort {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for NullPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_upload_rejects_zero_page_size() {
        let mut client = Client::new(NullPort);
        let err = upload(&mut client, AppId::App1, &[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, ClientError::InvalidPageSize(0)));
    }

    #[test]
    fn test_upload_rejects_page_size_past_offset_range() {
        let mut client = Client::new(NullPort);
        let err = upload(&mut client, AppId::App1, &[1, 2, 3], MAX_PAGE_SIZE + 1).unwrap_err();
        assert!(matches!(err, ClientError::InvalidPageSize(_)));
    }

    #[test]
    fn test_padded_crc_matches_explicit_padding() {
        let page = [0x42u8; 100];
        let mut full = page.to_vec();
        full.resize(256, 0xFF);
        assert_eq!(padded_crc(&page, 256), CRC32.checksum(&full));
    }

    #[test]
    fn test_padded_crc_full_page_adds_nothing() {
        let page = [0x13u8; 256];
        assert_eq!(padded_crc(&page, 256), CRC32.checksum(&page));
    }
}
