//! RequestDownload (0x34)

use log::{debug, error, warn};

use crate::channel::ISO_TP_MTU;
use crate::protocol::{UdsCommand, UdsError};
use crate::server::download::{DownloadRequest, DownloadSession};
use crate::server::{Response, UdsServer};

impl UdsServer {
    /// Opens a download session. The response announces the block size the
    /// tester must use for the following TransferData requests.
    pub(crate) fn request_download(
        &mut self,
        req: &[u8],
        resp: &mut Response,
    ) -> Result<(), UdsError> {
        if req.len() < 3 {
            return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
        }
        if self.download.is_some() {
            warn!("RequestDownload rejected, a download session is already active");
            return Err(UdsError::ConditionsNotCorrect);
        }
        let status = self.status();
        let Some(hook) = self.handlers.request_download.as_mut() else {
            return Err(UdsError::ServiceNotSupported);
        };

        let request = parse_download_request(req)?;
        debug!(
            "download request: {} bytes to address 0x{:X} (format 0x{:02X})",
            request.memory_size, request.memory_address, request.data_format_identifier
        );
        let grant = hook(&status, &request)?;
        if grant.max_block_length < 3 {
            error!(
                "download hook granted an unusable max block length of {}",
                grant.max_block_length
            );
            return Err(UdsError::GeneralProgrammingFailure);
        }
        let max_block_length = (grant.max_block_length as usize).min(ISO_TP_MTU) as u16;

        self.download = Some(DownloadSession::new(grant.handler, request.memory_size));

        resp.push(UdsCommand::RequestDownload.response_sid())?;
        // lengthFormatIdentifier: maxNumberOfBlockLength takes 2 bytes
        resp.push(0x20)?;
        resp.write(&max_block_length.to_be_bytes())?;
        Ok(())
    }
}

/// Decodes the addressAndLengthFormatIdentifier and the two big-endian
/// fields that follow it. Field widths outside `1..=size_of::<usize>()`
/// are out of range; a request whose length disagrees with the declared
/// widths is malformed.
fn parse_download_request(req: &[u8]) -> Result<DownloadRequest, UdsError> {
    let data_format_identifier = req[1];
    let size_len = ((req[2] & 0xF0) >> 4) as usize;
    let addr_len = (req[2] & 0x0F) as usize;
    let word = size_of::<usize>();
    if !(1..=word).contains(&size_len) || !(1..=word).contains(&addr_len) {
        return Err(UdsError::RequestOutOfRange);
    }
    if req.len() != 3 + addr_len + size_len {
        return Err(UdsError::IncorrectMessageLengthOrInvalidFormat);
    }
    let memory_address = be_value(&req[3..3 + addr_len]);
    let memory_size = be_value(&req[3 + addr_len..3 + addr_len + size_len]);
    Ok(DownloadRequest {
        data_format_identifier,
        memory_address,
        memory_size,
    })
}

fn be_value(bytes: &[u8]) -> usize {
    bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
}
