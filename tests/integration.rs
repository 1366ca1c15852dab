//! Integration tests driving the full stack against the simulated tag

#![cfg(feature = "mocktag")]

use hex_literal::hex;
use ntag424::{
    apdu::status::ErrorKind,
    commands::{self, iso},
    file::{
        AccessCondition, AccessRights, CommMode, FileNo, FileSettings, SdmAccessRights,
        SdmOptions, SdmSettings,
    },
    session, AesKey, Error, KeyNo, MockTag, RawChannel,
};

fn channel_for(tag: &MockTag) -> RawChannel {
    RawChannel::new(Box::new(tag.clone()))
}

fn select(channel: &mut RawChannel) {
    commands::select_application(channel).expect("select application");
}

#[test]
fn authentication_round_trip_with_seeded_tag() {
    let rnd_b = hex!("FA659AD0DCA738DD65DC7DC38612AD81");
    let ti = hex!("7614281A");
    let tag = MockTag::with_seeds(rnd_b, ti);
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let rnd_a = hex!("B04D0787C93EE0CC8CACC8E86F16C6FE");
    let session = session::authenticate_with_nonce(
        &mut channel,
        KeyNo::PICC_MASTER,
        &AesKey::default(),
        rnd_a,
    )
    .expect("authentication");

    assert_eq!(session.transaction_id(), ti);
    assert_eq!(session.command_counter(), 0);
    assert!(tag.session_active());
}

#[test]
fn first_authenticated_command_succeeds() {
    // Catches a wrong session-key derivation: authentication would pass
    // but the first protected command would fail with an integrity error
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let uid = commands::get_card_uid(&mut session).expect("first protected command");
    assert_eq!(uid, tag.uid());
    assert_eq!(session.command_counter(), 1);
}

#[test]
fn command_counter_advances_once_per_command() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    for expected in 0..5u16 {
        assert_eq!(session.command_counter(), expected);
        let version =
            commands::get_key_version_authenticated(&mut session, KeyNo::PICC_MASTER).unwrap();
        assert_eq!(version, 0);
    }

    assert_eq!(session.command_counter(), 5);
}

#[test]
fn master_key_change_expires_the_session() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let new_key = AesKey::new(hex!("5004BF991F408672B1EF00F08F9E8647"));
    commands::change_key(&mut session, KeyNo::PICC_MASTER, &new_key, None, 0x01)
        .expect("master key change");

    assert!(session.is_expired());
    assert_eq!(tag.key_bytes(0), *new_key.as_bytes());
    assert!(!tag.session_active());

    // The next command must fail locally, with nothing transmitted
    let transmitted = tag.transmit_count();
    let another = AesKey::new([0x11; 16]);
    let result = commands::change_key(
        &mut session,
        KeyNo::new(1).unwrap(),
        &another,
        Some(&AesKey::default()),
        0x00,
    );
    assert!(matches!(result, Err(Error::SessionExpired)));
    assert_eq!(tag.transmit_count(), transmitted);

    // Re-authentication with the new key works on the same raw channel
    drop(session);
    let mut session = session::authenticate(&mut channel, KeyNo::PICC_MASTER, &new_key)
        .expect("re-authentication with rotated key");
    commands::get_card_uid(&mut session).expect("command under new session");
}

#[test]
fn application_key_change_verified_by_the_tag() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let key_no = KeyNo::new(2).unwrap();
    let new_key = AesKey::new(hex!("00112233445566778899AABBCCDDEEFF"));
    commands::change_key(&mut session, key_no, &new_key, Some(&AesKey::default()), 0x07)
        .expect("application key change");

    // The tag decoded the XOR form and checked the CRC before storing
    assert_eq!(tag.key_bytes(2), *new_key.as_bytes());
    assert!(!session.is_expired());
    assert_eq!(
        commands::get_key_version_authenticated(&mut session, key_no).unwrap(),
        0x07
    );
}

#[test]
fn non_master_session_cannot_change_keys() {
    let tag = MockTag::new();
    let app_key = AesKey::new([0x77; 16]);
    tag.set_key(3, *app_key.as_bytes(), 0x01);

    let mut channel = channel_for(&tag);
    select(&mut channel);

    let key_no = KeyNo::new(3).unwrap();
    let mut session = session::authenticate(&mut channel, key_no, &app_key).unwrap();

    let result = commands::change_key(
        &mut session,
        key_no,
        &AesKey::new([0x01; 16]),
        Some(&app_key),
        0x02,
    );
    match result {
        Err(Error::Status(e)) => assert_eq!(e.kind, ErrorKind::PermissionDenied),
        other => panic!("expected permission denied, got {other:?}"),
    }

    // The key is untouched and the session still works
    assert_eq!(tag.key_bytes(3), *app_key.as_bytes());
    commands::get_key_version_authenticated(&mut session, key_no).unwrap();
}

#[test]
fn authentication_with_wrong_key_fails_and_channel_survives() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let wrong = AesKey::new([0xDE; 16]);
    let result = session::authenticate(&mut channel, KeyNo::PICC_MASTER, &wrong);
    match result {
        Err(Error::Status(e)) => assert_eq!(e.kind, ErrorKind::AuthenticationFailed),
        other => panic!("expected authentication failure, got {other:?}"),
    }
    assert!(!tag.session_active());

    // The raw channel is still usable
    commands::get_version(&mut channel).expect("plain command after failed auth");
    session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default())
        .expect("authentication with the right key");
}

#[test]
fn authentication_delay_is_surfaced() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);
    tag.set_auth_delay(true);

    let result = session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default());
    match result {
        Err(Error::Status(e)) => assert_eq!(e.kind, ErrorKind::AuthenticationDelay),
        other => panic!("expected delay status, got {other:?}"),
    }
}

#[test]
fn get_version_reassembles_three_frames() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let info = commands::get_version(&mut channel).unwrap();
    assert_eq!(info.uid, tag.uid());
    assert_eq!(info.hardware.vendor_id, 0x04);
    assert_eq!(info.software.minor, 0x02);
}

#[test]
fn plain_info_commands() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let ids = commands::get_file_ids(&mut channel).unwrap();
    assert_eq!(
        ids,
        vec![
            FileNo::CAPABILITY_CONTAINER,
            FileNo::NDEF,
            FileNo::PROPRIETARY
        ]
    );

    let info = commands::get_file_settings(&mut channel, FileNo::NDEF).unwrap();
    assert_eq!(info.size, 256);
    assert_eq!(info.settings.comm_mode, CommMode::Plain);
    assert!(info.settings.access.read.is_free());

    assert_eq!(
        commands::get_key_version(&mut channel, KeyNo::PICC_MASTER).unwrap(),
        0
    );
}

#[test]
fn mac_mode_info_commands() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let ids = commands::get_file_ids_authenticated(&mut session).unwrap();
    assert_eq!(
        ids,
        vec![
            FileNo::CAPABILITY_CONTAINER,
            FileNo::NDEF,
            FileNo::PROPRIETARY
        ]
    );

    let info = commands::get_file_settings_authenticated(&mut session, FileNo::PROPRIETARY).unwrap();
    assert_eq!(info.settings.comm_mode, CommMode::Full);
    assert_eq!(session.command_counter(), 2);
}

#[test]
fn chunked_write_and_read_full_mode() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let data: Vec<u8> = (0..100u32).map(|i| (i * 7 % 251) as u8).collect();
    commands::write_data(&mut session, FileNo::PROPRIETARY, 8, &data, CommMode::Full)
        .expect("chunked write");

    // 100 bytes over 52-byte chunks: two independent commands
    assert_eq!(session.command_counter(), 2);
    assert_eq!(&tag.file_content(3)[8..108], &data[..]);

    let read = commands::read_data(&mut session, FileNo::PROPRIETARY, 8, 100, CommMode::Full)
        .expect("encrypted read");
    assert_eq!(read, data);
}

#[test]
fn long_read_chains_over_continuation_frames() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    // NDEF is plain-mode on a blank tag; write through it MAC-framed
    let data: Vec<u8> = (0..200u32).map(|i| (i % 256) as u8).collect();
    commands::write_data(&mut session, FileNo::NDEF, 0, &data, CommMode::Mac)
        .expect("MAC-mode write");
    assert_eq!(&tag.file_content(2)[..200], &data[..]);

    // 200 bytes + MAC spans four response frames
    let read = commands::read_data(&mut session, FileNo::NDEF, 0, 200, CommMode::Mac)
        .expect("chained read");
    assert_eq!(read, data);
}

#[test]
fn write_failure_reports_offset_reached() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    // The proprietary file holds 128 bytes; the second chunk crosses the end
    let data = [0xA5u8; 100];
    let err = commands::write_data(&mut session, FileNo::PROPRIETARY, 60, &data, CommMode::Full)
        .expect_err("write past end of file");

    assert_eq!(err.offset, 60 + 52);
    match err.source {
        Error::Status(e) => assert_eq!(e.kind, ErrorKind::BoundaryError),
        other => panic!("expected boundary error, got {other:?}"),
    }

    // Everything before the failing chunk was written
    assert_eq!(&tag.file_content(3)[60..112], &data[..52]);
}

#[test]
fn tampered_response_mac_is_rejected() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    tag.corrupt_next_response_mac();
    let result = commands::get_key_version_authenticated(&mut session, KeyNo::PICC_MASTER);
    assert!(matches!(result, Err(Error::Crypto(_))));

    // The counter did not advance on the failed exchange
    assert_eq!(session.command_counter(), 0);
}

#[test]
fn file_settings_round_trip_with_sdm() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let settings = FileSettings {
        comm_mode: CommMode::Plain,
        access: AccessRights {
            read: AccessCondition::Free,
            write: AccessCondition::Key(KeyNo::PICC_MASTER),
            read_write: AccessCondition::Key(KeyNo::PICC_MASTER),
            change: AccessCondition::Key(KeyNo::PICC_MASTER),
        },
        sdm: Some(SdmSettings {
            options: SdmOptions::UID_MIRROR | SdmOptions::READ_COUNTER | SdmOptions::ASCII_ENCODING,
            access: SdmAccessRights {
                meta_read: AccessCondition::Free,
                file_read: AccessCondition::Never,
                counter_retrieve: AccessCondition::Free,
            },
            uid_offset: Some(32),
            read_counter_offset: Some(67),
            picc_data_offset: None,
            mac_input_offset: None,
            enc_data_offset: None,
            enc_data_length: None,
            mac_offset: None,
            read_counter_limit: None,
        }),
    };

    commands::change_file_settings(&mut session, FileNo::NDEF, &settings)
        .expect("change file settings");

    let info = commands::get_file_settings_authenticated(&mut session, FileNo::NDEF)
        .expect("read settings back");
    assert_eq!(info.settings, settings);

    // And the same settings parse over the plain variant
    drop(session);
    let info = commands::get_file_settings(&mut channel, FileNo::NDEF).unwrap();
    assert_eq!(info.settings, settings);
}

#[test]
fn sdm_read_counter_retrieval() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);
    tag.set_read_counter(0x0000_2A07);

    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();

    let counter = commands::get_file_counters(&mut session, FileNo::NDEF).unwrap();
    assert_eq!(counter, 0x0000_2A07);
}

#[test]
fn ndef_write_through_iso_wrappers() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);

    let content: Vec<u8> = (0..120u32).map(|i| (i * 3 % 256) as u8).collect();
    iso::write_ndef_file(&mut channel, &content).expect("chunked ISO write");
    assert_eq!(&tag.file_content(2)[..120], &content[..]);

    let read = iso::read_binary(&mut channel, 0, 0).expect("ISO read");
    assert_eq!(&read[..120], &content[..]);
}

#[test]
fn iso_write_respects_access_rights() {
    let tag = MockTag::new();
    let mut channel = channel_for(&tag);
    select(&mut channel);

    // Lock the NDEF file's write access to the master key
    let mut session =
        session::authenticate(&mut channel, KeyNo::PICC_MASTER, &AesKey::default()).unwrap();
    let settings = FileSettings {
        comm_mode: CommMode::Plain,
        access: AccessRights {
            read: AccessCondition::Free,
            write: AccessCondition::Key(KeyNo::PICC_MASTER),
            read_write: AccessCondition::Key(KeyNo::PICC_MASTER),
            change: AccessCondition::Key(KeyNo::PICC_MASTER),
        },
        sdm: None,
    };
    commands::change_file_settings(&mut session, FileNo::NDEF, &settings).unwrap();
    drop(session);

    iso::select_ndef_application(&mut channel).unwrap();
    iso::select_file(&mut channel, iso::NDEF_FILE_ID).unwrap();
    let result = iso::update_binary(&mut channel, 0, &[0x00; 4]);
    match result {
        Err(Error::Status(e)) => assert_eq!(e.kind, ErrorKind::ConditionsNotSatisfied),
        other => panic!("expected conditions-not-satisfied, got {other:?}"),
    }
}
