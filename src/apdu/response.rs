//! Response parsing

use super::status::StatusWord;
use crate::{error::Error, transport::RawResponse};

/// A parsed response: body bytes and the trailing status word
#[derive(Clone, Debug)]
pub struct Response {
    /// Response data field, without the status word
    pub body: Vec<u8>,

    /// Trailing status word
    pub status: StatusWord,
}

impl Response {
    /// Build a response from what the transport returned
    pub fn from_raw(raw: RawResponse) -> Self {
        let (body, sw1, sw2) = raw;
        Self {
            body,
            status: StatusWord::new(sw1, sw2),
        }
    }

    /// Return the body if the status is a success, the classified status
    /// error otherwise
    pub fn into_body(self) -> Result<Vec<u8>, Error> {
        self.status.check()?;
        Ok(self.body)
    }

    /// Return the body, requiring it to be exactly `len` bytes
    pub fn into_body_exact(self, len: usize) -> Result<Vec<u8>, Error> {
        let body = self.into_body()?;
        ensure!(
            body.len() == len,
            Protocol,
            "unexpected response length: {} (expected {})",
            body.len(),
            len
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::status::ErrorKind;

    #[test]
    fn success_body() {
        let resp = Response::from_raw((vec![1, 2, 3], 0x91, 0x00));
        assert_eq!(resp.into_body().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn error_status_surfaces_kind() {
        let resp = Response::from_raw((vec![], 0x91, 0x9D));
        match resp.into_body() {
            Err(Error::Status(e)) => assert_eq!(e.kind, ErrorKind::PermissionDenied),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn exact_length_enforced() {
        let resp = Response::from_raw((vec![0; 4], 0x91, 0x00));
        assert!(resp.into_body_exact(5).is_err());
    }
}
