//! SelectApplication: enter the PICC application

use crate::{
    apdu::{Apdu, Ins},
    channel::RawChannel,
    error::Error,
};

/// Select the PICC application. Pre-condition for every other command.
pub fn select_application(channel: &mut RawChannel) -> Result<(), Error> {
    let apdu = Apdu::proprietary(Ins::SelectApplication, vec![0x00, 0x00, 0x00])?;
    let body = channel.send(&apdu)?;

    ensure!(
        body.is_empty(),
        Protocol,
        "unexpected SelectApplication response: {} bytes",
        body.len()
    );

    Ok(())
}
