//! Integration tests for core CLI contract behavior.

use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("bfflash").expect("binary built")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bfflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bfflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn list_ports_json_writes_machine_output_to_stdout() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .assert()
        .success()
        .get_output()
        .clone();

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("valid json expected");
    assert!(parsed.is_array(), "list-ports --json should return an array");
}

#[test]
fn device_command_without_port_fails_with_hint() {
    let mut cmd = cli_cmd();
    cmd.env_remove("BFFLASH_PORT")
        .arg("identify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("serial port"));
}

#[test]
fn flash_logo_without_write_flag_is_refused() {
    let dir = tempdir().expect("tempdir created");
    let logo = dir.path().join("logo.png");
    image::RgbImage::from_pixel(16, 16, image::Rgb([0, 0, 0]))
        .save(&logo)
        .expect("png written");

    // --simulate=false + no --write fails the precheck before the port
    // is ever opened, so a bogus port name must not matter.
    let mut cmd = cli_cmd();
    cmd.args([
        "-p",
        "/dev/null-no-such-port",
        "flash-logo",
        logo.to_str().expect("utf-8 path"),
        "--offset",
        "0x1000",
    ])
    .assert()
    .failure()
    .stdout(predicate::str::contains("write flag required"));
}

#[test]
fn bf_pack_and_unpack_roundtrip() {
    let dir = tempdir().expect("tempdir created");
    let fw_path = dir.path().join("fw.bin");
    let bf_path = dir.path().join("fw.BF");
    let out_path = dir.path().join("out.bin");

    let firmware: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&fw_path, &firmware).expect("write firmware");

    cli_cmd()
        .args([
            "bf-pack",
            fw_path.to_str().unwrap(),
            "-o",
            bf_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    cli_cmd()
        .args([
            "bf-unpack",
            bf_path.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let roundtripped = fs::read(&out_path).expect("read unpacked");
    assert_eq!(roundtripped, firmware);
}

#[test]
fn bf_region2_scramble_flags_roundtrip() {
    let dir = tempdir().expect("tempdir created");
    let fw_path = dir.path().join("fw.bin");
    let cfg_path = dir.path().join("cfg.bin");
    let bf_path = dir.path().join("fw.BF");
    let out_path = dir.path().join("out.bin");

    let firmware: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let config: Vec<u8> = (0..6_000u32).map(|i| (i % 241) as u8).collect();
    fs::write(&fw_path, &firmware).expect("write firmware");
    fs::write(&cfg_path, &config).expect("write config");

    cli_cmd()
        .args([
            "bf-pack",
            fw_path.to_str().unwrap(),
            "-c",
            cfg_path.to_str().unwrap(),
            "-o",
            bf_path.to_str().unwrap(),
            "--scramble-region2",
        ])
        .assert()
        .success();

    cli_cmd()
        .args([
            "bf-unpack",
            bf_path.to_str().unwrap(),
            "-o",
            out_path.to_str().unwrap(),
            "--descramble-region2",
        ])
        .assert()
        .success();

    assert_eq!(fs::read(&out_path).expect("region 1"), firmware);
    let mut data_path = out_path.as_os_str().to_owned();
    data_path.push(".data");
    assert_eq!(fs::read(&data_path).expect("region 2"), config);
}

#[test]
fn expert_flags_require_env_gate() {
    let dir = tempdir().expect("tempdir created");
    let bf_path = dir.path().join("fw.BF");
    fs::write(&bf_path, vec![0u8; 64]).expect("write bf");

    let mut cmd = cli_cmd();
    cmd.env_remove("BFFLASH_EXPERT")
        .args([
            "-p",
            "/dev/null-no-such-port",
            "flash-firmware-bf",
            bf_path.to_str().unwrap(),
            "--allow-small",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BFFLASH_EXPERT"));
}
