use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rstest::rstest;

const MAC: &str = "AA:BB:CC:DD:EE:01";
const FIXTURE: &str = "AA:BB:CC:DD:EE:01|Kettle|switchbot";

fn mac() -> switchbot::MacAddress {
    switchbot::MacAddress::parse(MAC).expect("valid test address")
}

fn fixture() -> switchbot::DeviceFixture {
    FIXTURE.parse().expect("valid test fixture")
}

fn bot_on(backend: &switchbot::FakeBackend) -> switchbot::Bot {
    let transport: Arc<dyn switchbot::BleTransport> = Arc::new(backend.clone());
    switchbot::Bot::from_address(1, mac(), "Kettle", transport)
}

fn open_backend() -> switchbot::FakeBackend {
    switchbot::FakeBackend::new(switchbot::FakeBackendConfig::builder().devices(fixture()).build())
}

fn protected_backend(password: &str) -> switchbot::FakeBackend {
    switchbot::FakeBackend::new(
        switchbot::FakeBackendConfig::builder()
            .devices(fixture())
            .password(password)
            .build(),
    )
}

fn standard_timer(hour: u8, action: switchbot::Action) -> switchbot::Timer {
    let weekdays = switchbot::Weekdays::from_iso([1, 2, 3, 4, 5]).expect("valid weekdays");
    switchbot::StandardTimer::new(true, weekdays, hour, 0, action)
        .expect("valid test timer")
        .into()
}

fn disconnects(backend: &switchbot::FakeBackend) -> usize {
    backend
        .events()
        .iter()
        .filter(|event| matches!(event, switchbot::FakeEvent::Disconnected { .. }))
        .count()
}

fn connects(backend: &switchbot::FakeBackend) -> usize {
    backend
        .events()
        .iter()
        .filter(|event| matches!(event, switchbot::FakeEvent::Connected { .. }))
        .count()
}

#[tokio::test]
async fn press_runs_one_full_session() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    bot.press().await?;

    assert_eq!(
        vec![
            switchbot::FakeEvent::Connected {
                mac: mac(),
                address_type: switchbot::AddressType::Random,
            },
            switchbot::FakeEvent::Subscribed {
                mac: mac(),
                uuid: "cba20003-224d-11e6-9fb8-0002a5d5c51b".to_string(),
            },
            switchbot::FakeEvent::Wrote {
                mac: mac(),
                handle: switchbot::CONTROL_HANDLE,
                frame: vec![0x57, 0x01],
            },
            switchbot::FakeEvent::Disconnected { mac: mac() },
        ],
        backend.events()
    );
    assert_eq!(Some(1), backend.snapshot(mac()).map(|bot| bot.press_count));

    Ok(())
}

#[tokio::test]
async fn failed_subscribe_releases_connection_without_writing() {
    let backend = switchbot::FakeBackend::new(
        switchbot::FakeBackendConfig::builder()
            .devices("AA:BB:CC:DD:EE:01|Lamp|other".parse().expect("valid test fixture"))
            .build(),
    );
    let mut bot = bot_on(&backend);

    let error = bot.press().await.expect_err("missing notify characteristic should fail");

    assert_eq!(switchbot::ErrorKind::TransportFailure, error.kind());
    assert_eq!("communication with ble device failed", error.to_string());
    assert_eq!(
        vec![
            switchbot::FakeEvent::Connected {
                mac: mac(),
                address_type: switchbot::AddressType::Random,
            },
            switchbot::FakeEvent::Disconnected { mac: mac() },
        ],
        backend.events()
    );
    assert!(backend.frames(mac()).is_empty());
}

#[tokio::test]
async fn encrypted_press_carries_password_token() -> anyhow::Result<()> {
    let backend = protected_backend("secret");
    let mut bot = bot_on(&backend).encrypted("secret");

    bot.press().await?;

    assert_eq!(
        vec![vec![0x57, 0x11, 0x5C, 0xA2, 0xE8, 0xE5]],
        backend.frames(mac())
    );
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_reported_and_disconnects() {
    let backend = protected_backend("123456");
    let mut bot = bot_on(&backend).encrypted("secret");

    let error = bot.press().await.expect_err("mismatched token should fail");

    assert!(error.is_wrong_password());
    assert_eq!(switchbot::ErrorKind::ProtocolStatus, error.kind());
    assert_eq!("switchbot password is wrong", error.to_string());
    assert_eq!(1, disconnects(&backend));
}

#[tokio::test]
async fn password_mismatches_map_to_encryption_statuses() {
    let protected = protected_backend("123456");
    let error = bot_on(&protected)
        .press()
        .await
        .expect_err("missing token should fail");
    assert_eq!(
        Some(switchbot::ActionStatus::DeviceEncrypted),
        error.action_status()
    );

    let open = open_backend();
    let error = bot_on(&open)
        .encrypted("123456")
        .press()
        .await
        .expect_err("unexpected token should fail");
    assert_eq!(
        Some(switchbot::ActionStatus::DeviceUnencrypted),
        error.action_status()
    );
}

#[rstest]
#[case::on(true, vec![0x57, 0x01, 0x01])]
#[case::off(false, vec![0x57, 0x01, 0x02])]
#[tokio::test]
async fn switch_writes_state_payload(
    #[case] on: bool,
    #[case] expected: Vec<u8>,
) -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    bot.switch(on).await?;

    assert_eq!(vec![expected], backend.frames(mac()));
    assert_eq!(Some(on), backend.snapshot(mac()).map(|bot| bot.arm_extended));
    Ok(())
}

#[rstest]
#[case::negative(-1)]
#[case::too_long(61)]
#[tokio::test]
async fn hold_time_out_of_range_never_connects(#[case] seconds: i64) {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    let error = bot
        .set_hold_time(seconds)
        .await
        .expect_err("out-of-range hold time should fail");

    assert_eq!(switchbot::ErrorKind::InvalidInput, error.kind());
    assert_eq!(Vec::<switchbot::FakeEvent>::new(), backend.events());
}

#[tokio::test]
async fn hold_time_is_visible_in_settings() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    bot.set_hold_time(10).await?;
    let settings = bot.get_settings().await?;

    assert_eq!(
        vec![vec![0x57, 0x0F, 0x08, 0x0A], vec![0x57, 0x02]],
        backend.frames(mac())
    );
    assert_eq!(10, settings.hold_seconds);
    assert_eq!(87, settings.battery);
    assert_eq!("4.5", settings.firmware.to_string());
    assert_eq!(0, settings.timer_count);
    Ok(())
}

#[tokio::test]
async fn set_mode_clears_timers_then_writes_mode_in_one_session() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    bot.set_mode(true, false).await?;

    let frames = backend.frames(mac());
    assert_eq!(6, frames.len());
    for (frame, selector) in frames.iter().zip([0x03, 0x13, 0x23, 0x33, 0x43]) {
        let mut expected = vec![0x57, 0x09, selector];
        expected.extend([0; 10]);
        assert_eq!(&expected, frame);
    }
    assert_eq!(vec![0x57, 0x03, 0x64, 0x10], frames[5]);
    assert_eq!(1, connects(&backend));
    assert_eq!(1, disconnects(&backend));

    let settings = bot.get_settings().await?;
    assert!(settings.dual_state_mode);
    assert!(!settings.inverse_direction);
    Ok(())
}

#[tokio::test]
async fn set_timer_rejects_index_beyond_count_without_connecting() {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    let error = bot
        .set_timer(&standard_timer(7, switchbot::Action::Press), 3, 2)
        .await
        .expect_err("index 3 of 2 timers should fail");

    assert_eq!(switchbot::ErrorKind::InvalidInput, error.kind());
    assert_eq!(0, connects(&backend));
}

#[tokio::test]
async fn get_timer_rejects_out_of_range_index() {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    let error = bot.get_timer(5).await.expect_err("slot 5 does not exist");

    assert_matches!(error, switchbot::ProtocolError::InvalidInput(_));
    assert_eq!(0, connects(&backend));
}

#[tokio::test]
async fn get_timers_stops_at_first_unset_slot() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);
    let timers = vec![
        standard_timer(7, switchbot::Action::Press),
        standard_timer(8, switchbot::Action::Press),
    ];

    bot.set_timers(&timers).await?;
    let written = backend.frames(mac()).len();
    let listed = bot.get_timers().await?;

    assert_eq!(timers, listed);
    let reads: Vec<Vec<u8>> = backend.frames(mac()).split_off(written);
    assert_eq!(
        vec![
            vec![0x57, 0x08, 0x03],
            vec![0x57, 0x08, 0x13],
            vec![0x57, 0x08, 0x23],
        ],
        reads
    );

    let decoded = bot.get_timer(1).await?;
    assert_eq!(Some(timers[1]), decoded.timer);
    assert_eq!(2, decoded.num_timer);
    Ok(())
}

#[tokio::test]
async fn add_then_remove_timer_compacts_schedule() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);
    let first = standard_timer(6, switchbot::Action::Press);
    let second = standard_timer(7, switchbot::Action::Press);
    let third = standard_timer(8, switchbot::Action::Press);

    bot.add_timer(first).await?;
    bot.add_timer(second).await?;
    bot.add_timer(third).await?;
    let removed = bot.remove_timer(1).await?;

    assert_eq!(second, removed);
    assert_eq!(vec![first, third], bot.get_timers().await?);
    assert_eq!(Some(2), backend.snapshot(mac()).map(|bot| bot.timer_count));
    Ok(())
}

#[tokio::test]
async fn add_timer_refuses_a_sixth_timer() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);
    let timers: Vec<switchbot::Timer> = (1..=5)
        .map(|hour| standard_timer(hour, switchbot::Action::Press))
        .collect();
    bot.set_timers(&timers).await?;

    let error = bot
        .add_timer(standard_timer(9, switchbot::Action::Press))
        .await
        .expect_err("six timers do not fit");

    assert_matches!(
        error,
        switchbot::ProtocolError::InvalidInput(inner)
            if *inner == switchbot::InvalidInputError::TooManyTimers { count: 6, max: 5 }
    );
    Ok(())
}

#[tokio::test]
async fn remove_timer_rejects_unset_index() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);
    bot.add_timer(standard_timer(6, switchbot::Action::Press))
        .await?;

    let error = bot.remove_timer(1).await.expect_err("only slot 0 is set");

    assert_eq!(switchbot::ErrorKind::InvalidInput, error.kind());
    Ok(())
}

#[tokio::test]
async fn set_timers_with_clock_syncs_first() -> anyhow::Result<()> {
    let backend = open_backend();
    let mut bot = bot_on(&backend);

    bot.set_timers_with_clock(&[standard_timer(6, switchbot::Action::TurnOn)])
        .await?;

    let frames = backend.frames(mac());
    assert_eq!(6, frames.len());
    assert_eq!([0x57, 0x09, 0x01], frames[0][..3]);
    assert_eq!(11, frames[0].len());
    assert_eq!(1, connects(&backend));
    assert!(
        backend
            .snapshot(mac())
            .and_then(|bot| bot.clock)
            .is_some()
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn silent_device_times_out_and_still_disconnects() {
    let backend = switchbot::FakeBackend::new(
        switchbot::FakeBackendConfig::builder()
            .devices(fixture())
            .silent(true)
            .build(),
    );
    let mut bot = bot_on(&backend);

    let error = bot.press().await.expect_err("silent device should time out");

    assert_eq!(switchbot::ErrorKind::TransportFailure, error.kind());
    assert_eq!("communication with ble device failed", error.to_string());
    assert_eq!(1, disconnects(&backend));
}

#[tokio::test]
async fn failed_disconnect_fails_an_otherwise_successful_operation() {
    let backend = switchbot::FakeBackend::new(
        switchbot::FakeBackendConfig::builder()
            .devices(fixture())
            .fail_disconnect(true)
            .build(),
    );
    let mut bot = bot_on(&backend);

    let error = bot.press().await.expect_err("disconnect failure should surface");

    assert_eq!(switchbot::ErrorKind::TransportFailure, error.kind());
    assert_eq!(Some(1), backend.snapshot(mac()).map(|bot| bot.press_count));
}

#[tokio::test]
async fn operation_error_wins_over_failed_disconnect() {
    let backend = switchbot::FakeBackend::new(
        switchbot::FakeBackendConfig::builder()
            .devices(fixture())
            .forced_status(switchbot::ActionStatus::DeviceBusy.code())
            .fail_disconnect(true)
            .build(),
    );
    let mut bot = bot_on(&backend);

    let error = bot.press().await.expect_err("busy device should fail");

    assert_eq!(
        Some(switchbot::ActionStatus::DeviceBusy),
        error.action_status()
    );
    assert_eq!(1, disconnects(&backend));
}

#[tokio::test]
async fn unknown_status_byte_is_a_decode_failure() {
    let backend = switchbot::FakeBackend::new(
        switchbot::FakeBackendConfig::builder()
            .devices(fixture())
            .forced_status(0x42)
            .build(),
    );
    let mut bot = bot_on(&backend);

    let error = bot.press().await.expect_err("unknown status should fail");

    assert_eq!(switchbot::ErrorKind::DecodeFailure, error.kind());
}

#[test]
fn bot_rejects_malformed_address() {
    let backend = open_backend();
    let transport: Arc<dyn switchbot::BleTransport> = Arc::new(backend);

    let result = switchbot::Bot::new(1, "AA:BB:CC:DD:EE", "Kettle", transport);

    assert_matches!(
        result,
        Err(switchbot::InvalidInputError::InvalidMacAddress { value }) if value == "AA:BB:CC:DD:EE"
    );
}
