//! Command channels to a tag
//!
//! A [`RawChannel`] exclusively owns the transport and carries plaintext
//! commands; an [`AuthenticatedChannel`](secure::AuthenticatedChannel)
//! wraps a raw channel after EV2 authentication and adds secure
//! messaging. Unauthenticated commands take the former, authenticated
//! commands the latter, and the authentication driver is the only way to
//! obtain the latter, so misuse is a type error rather than a runtime
//! surprise.

pub mod secure;

pub use self::secure::AuthenticatedChannel;

use crate::{
    apdu::{Apdu, Response},
    error::Error,
    transport::Transport,
};

/// Plaintext command channel. Exclusively owns the underlying transport;
/// one command is in flight at a time.
pub struct RawChannel {
    transport: Box<dyn Transport>,
}

impl RawChannel {
    /// Wrap a transport in a channel
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// One serialize/transmit/parse round trip. No status interpretation:
    /// callers that expect continuation statuses (the authentication
    /// driver) use this directly.
    pub fn transceive(&mut self, apdu: &Apdu) -> Result<Response, Error> {
        let bytes = apdu.serialize();
        trace!("send {:?}: {} bytes", apdu.ins, bytes.len());

        let response = Response::from_raw(self.transport.transmit(&bytes)?);
        trace!(
            "recv {:?}: {} bytes, sw={}",
            apdu.ins,
            response.body.len(),
            response.status
        );

        Ok(response)
    }

    /// Send a command and collect its complete response body, following
    /// more-data continuation frames for the instructions that chain.
    /// Non-success terminal statuses map to the status-error taxonomy.
    pub fn send(&mut self, apdu: &Apdu) -> Result<Vec<u8>, Error> {
        let mut response = self.transceive(apdu)?;
        let mut body = Vec::new();

        loop {
            body.extend_from_slice(&response.body);

            if !response.status.is_more_data() {
                response.status.check()?;
                return Ok(body);
            }

            ensure!(
                apdu.ins.chains_response(),
                Protocol,
                "unexpected continuation status from {:?}",
                apdu.ins
            );

            response = self.transceive(&Apdu::continuation())?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apdu::Ins, transport::RawResponse};

    /// Scripted transport returning canned responses in order
    struct Script(Vec<RawResponse>);

    impl Transport for Script {
        fn transmit(&mut self, _apdu: &[u8]) -> Result<RawResponse, crate::transport::Error> {
            Ok(self.0.remove(0))
        }
    }

    #[test]
    fn chained_response_concatenates() {
        let script = Script(vec![
            (vec![1, 2], 0x91, 0xAF),
            (vec![3, 4], 0x91, 0xAF),
            (vec![5], 0x91, 0x00),
        ]);
        let mut channel = RawChannel::new(Box::new(script));

        let apdu = Apdu::proprietary(Ins::GetVersion, Vec::new()).unwrap();
        assert_eq!(channel.send(&apdu).unwrap(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn continuation_rejected_for_non_chaining_ins() {
        let script = Script(vec![(vec![], 0x91, 0xAF)]);
        let mut channel = RawChannel::new(Box::new(script));

        let apdu = Apdu::proprietary(Ins::SelectApplication, vec![0, 0, 0]).unwrap();
        assert!(matches!(
            channel.send(&apdu),
            Err(Error::Protocol(_))
        ));
    }
}
