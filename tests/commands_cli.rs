use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use clap::error::ErrorKind;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const BOT: &str = "AA:BB:CC:DD:EE:01";
const FIXTURE: &str = "AA:BB:CC:DD:EE:01|Kettle|switchbot;AA:BB:CC:DD:EE:02|Lamp|other";

#[derive(Debug, Default)]
struct FakeTerminalClient;

impl switchbot::TerminalClient for FakeTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        false
    }

    fn stderr_is_terminal(&self) -> bool {
        false
    }
}

async fn run_with_parsed_args(
    args: switchbot::Args,
    default_output: switchbot::OutputFormat,
) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let (command, options, maybe_fake_args) = args.into_parts(default_output)?;
    let backend = match maybe_fake_args {
        Some(fake_args) => switchbot::fake_backend(fake_args),
        None => switchbot::HardwareBackend::Real,
    };
    switchbot::run_with_clients(command, &options, &mut output, &FakeTerminalClient, backend)
        .await?;
    Ok(String::from_utf8(output)?)
}

async fn run_pretty<const N: usize>(argv: [&str; N]) -> anyhow::Result<String> {
    let parsed_args = switchbot::Args::try_parse_from(argv)?;
    run_with_parsed_args(parsed_args, switchbot::OutputFormat::Pretty).await
}

async fn run_json<const N: usize>(argv: [&str; N]) -> anyhow::Result<Value> {
    let parsed_args = switchbot::Args::try_parse_from(argv)?;
    let output = run_with_parsed_args(parsed_args, switchbot::OutputFormat::Json).await?;
    Ok(serde_json::from_str(&output)?)
}

fn unique_temp_path(label: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    std::env::temp_dir().join(format!(
        "switchbot-{label}-{}-{nanos}",
        std::process::id()
    ))
}

#[tokio::test]
async fn press_prints_summary_line() -> anyhow::Result<()> {
    let output = run_pretty([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "press",
    ])
    .await?;

    assert_snapshot!(output, @"✓ Pressed (AA:BB:CC:DD:EE:01)");
    Ok(())
}

#[tokio::test]
async fn switch_reports_requested_state_as_json() -> anyhow::Result<()> {
    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "switch",
        "off",
    ])
    .await?;

    assert_eq!(json!({ "action": "switch", "state": "off" }), output);
    Ok(())
}

#[tokio::test]
async fn settings_json_reports_device_defaults() -> anyhow::Result<()> {
    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "settings",
    ])
    .await?;

    assert_eq!(json!(87), output["battery"]);
    assert_eq!(json!("4.5"), output["firmware"]);
    assert_eq!(json!(0), output["n_timers"]);
    assert_eq!(json!(false), output["dual_state_mode"]);
    Ok(())
}

#[tokio::test]
async fn encrypted_commands_use_the_password_option() -> anyhow::Result<()> {
    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--fake-password",
        "secret",
        "--mac",
        BOT,
        "--password",
        "secret",
        "hold-time",
        "12",
    ])
    .await?;

    assert_eq!(json!({ "action": "hold_time", "seconds": 12 }), output);
    Ok(())
}

#[tokio::test]
async fn wrong_password_surfaces_device_message() {
    let error = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--fake-password",
        "123456",
        "--mac",
        BOT,
        "--password",
        "secret",
        "press",
    ])
    .await
    .expect_err("mismatched password should fail");

    assert_eq!("switchbot password is wrong", error.to_string());
}

#[tokio::test]
async fn out_of_range_hold_time_is_rejected() {
    let error = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "hold-time",
        "-1",
    ])
    .await
    .expect_err("negative hold time should fail");

    let protocol_error = error
        .downcast_ref::<switchbot::ProtocolError>()
        .expect("hold time errors are protocol errors");
    assert_eq!(switchbot::ErrorKind::InvalidInput, protocol_error.kind());
}

#[tokio::test]
async fn timers_add_reports_the_new_timer() -> anyhow::Result<()> {
    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "timers",
        "add",
        "--at",
        "07:30",
        "--days",
        "1,5",
    ])
    .await?;

    assert_eq!(
        json!({
            "action": "add",
            "timer": {
                "mode": "standard",
                "action": "press",
                "enabled": true,
                "weekdays": [1, 5],
                "hour": 7,
                "min": 30,
            },
        }),
        output
    );
    Ok(())
}

#[tokio::test]
async fn timers_list_is_empty_on_a_fresh_device() -> anyhow::Result<()> {
    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "timers",
        "list",
    ])
    .await?;

    assert_eq!(json!([]), output);

    let pretty = run_pretty([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "timers",
        "list",
    ])
    .await?;
    assert_snapshot!(pretty, @"No timers configured.");
    Ok(())
}

#[tokio::test]
async fn timers_set_all_reads_listed_json() -> anyhow::Result<()> {
    let path = unique_temp_path("timers.json");
    std::fs::write(
        &path,
        r#"[
            {"mode": "standard", "action": "press", "enabled": true, "weekdays": [1, 2], "hour": 6, "min": 45},
            {"mode": "standard", "action": "press", "enabled": false, "weekdays": [], "hour": 22, "min": 0}
        ]"#,
    )?;
    let file = path.to_string_lossy().into_owned();

    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--mac",
        BOT,
        "timers",
        "set-all",
        file.as_str(),
        "--sync-clock",
    ])
    .await;
    std::fs::remove_file(&path)?;

    assert_eq!(
        json!({ "action": "set_all", "count": 2, "clock_synced": true }),
        output?
    );
    Ok(())
}

#[tokio::test]
async fn scan_json_lists_every_peripheral_and_fills_the_cache() -> anyhow::Result<()> {
    let cache = unique_temp_path("scan-cache.tsv");
    let cache_arg = cache.to_string_lossy().into_owned();

    let output = run_json([
        "switchbot",
        "--fake",
        "--fake-devices",
        FIXTURE,
        "--scan-cache",
        cache_arg.as_str(),
        "scan",
        "--duration",
        "1s",
    ])
    .await?;
    let cached = std::fs::read_to_string(&cache)?;
    std::fs::remove_file(&cache)?;

    assert_eq!(
        json!([
            {
                "mac": "AA:BB:CC:DD:EE:01",
                "name": "Kettle",
                "rssi": -60,
                "is_switchbot": true,
                "cached": false,
            },
            {
                "mac": "AA:BB:CC:DD:EE:02",
                "name": "Lamp",
                "rssi": -60,
                "is_switchbot": false,
                "cached": false,
            },
        ]),
        output
    );
    assert_eq!(
        "AA:BB:CC:DD:EE:01\tswitchbot\nAA:BB:CC:DD:EE:02\tother\n",
        cached
    );
    Ok(())
}

#[tokio::test]
async fn device_commands_require_mac() {
    let error = run_json(["switchbot", "--fake", "--fake-devices", FIXTURE, "press"])
        .await
        .expect_err("press without --mac should fail");

    assert_eq!("`--mac` is required for this command", error.to_string());
}

#[test]
fn fake_flags_require_fake_mode() {
    let error = switchbot::Args::try_parse_from([
        "switchbot",
        "--fake-devices",
        FIXTURE,
        "press",
    ])
    .expect_err("fake devices without --fake should fail");

    assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
}

#[test]
fn fake_mode_requires_devices() {
    let error = switchbot::Args::try_parse_from(["switchbot", "--fake", "press"])
        .expect_err("--fake without devices should fail");

    assert_eq!(ErrorKind::MissingRequiredArgument, error.kind());
}

#[test]
fn invalid_mac_is_rejected_while_parsing() {
    let error = switchbot::Args::try_parse_from(["switchbot", "--mac", "AA:BB", "press"])
        .expect_err("short address should fail");

    assert_eq!(ErrorKind::ValueValidation, error.kind());
}

#[test]
fn explicit_output_overrides_default() -> anyhow::Result<()> {
    let args = switchbot::Args::try_parse_from(["switchbot", "--output", "json", "press"])?;
    assert_eq!(Some(switchbot::OutputFormat::Json), args.output_format());

    let args = switchbot::Args::try_parse_from(["switchbot", "--log-level", "debug", "press"])?;
    assert_eq!(Some(switchbot::LogLevel::Debug), args.log_level());
    assert_eq!(None, args.output_format());
    Ok(())
}

#[tokio::test]
async fn programmatic_args_run_against_fake_backend() -> anyhow::Result<()> {
    let fake = switchbot::FakeArgs::builder().devices(FIXTURE)?.build();
    let args = switchbot::Args::new(switchbot::CliCommand::Switch(switchbot::SwitchArgs::new(
        switchbot::SwitchTarget::On,
    )))
    .with_mac(switchbot::MacAddress::parse(BOT)?)
    .with_fake(fake);

    let output = run_with_parsed_args(args, switchbot::OutputFormat::Pretty).await?;

    assert_snapshot!(output, @"✓ Switched on (AA:BB:CC:DD:EE:01)");
    Ok(())
}
