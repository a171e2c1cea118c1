use std::path::{Path, PathBuf};
use std::process::{Command, Output};

mod aggregate;
mod report;
mod run;

pub fn testdata(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(name)
}

/// Run `tracelat` isolated from any user config file.
pub fn tracelat(config_home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tracelat"))
        .args(args)
        .env("TRACELAT_CONFIG_PATH", config_home.join("config.toml"))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run tracelat")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
