//! End-to-end tests driving the distpack binary over a scaffolded project.
//!
//! Contract: exit code 0 means every pipeline task succeeded and every
//! artifact exists under the staging directory.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"
[product]
website = "https://example.invalid"

[tokens]
splash = "launcher_splash.png"

[resources]
root = "resources"

[archive]
extension = "jar"
entry_point = "app"
keep = ["logkit-*"]

[[archive.units]]
name = "app"
refs = ["core"]

[[archive.units.files]]
source = "artifacts/app.bin"
archive_path = "com/example/app.bin"

[[archive.units]]
name = "core"

[[archive.units.files]]
source = "artifacts/core.bin"
archive_path = "lib/core.bin"

[[archive.units]]
name = "logkit-core"

[[archive.units.files]]
source = "artifacts/logkit.bin"
archive_path = "lib/logkit.bin"

[[archive.units]]
name = "annotations"

[[archive.units.files]]
source = "artifacts/annotations.bin"
archive_path = "lib/annotations.bin"
"#;

fn scaffold(root: &Path) -> Result<()> {
    for dir in ["appimage", "innosetup", "packr", "osx", "resources", "artifacts"] {
        fs::create_dir_all(root.join(dir))?;
    }

    fs::write(root.join("distpack.toml"), CONFIG)?;
    fs::write(
        root.join("appimage/launcher.desktop"),
        "[Desktop Entry]\nName=${finalName}\nExec=${lowerName}\nIcon=${splash}\nComment=${later.stage}\n",
    )?;
    fs::write(
        root.join("innosetup/app.iss"),
        "AppName=${finalName}\nAppPublisherURL=${website}\n",
    )?;
    fs::write(
        root.join("innosetup/installer.pas"),
        "const NAME = '{project.finalName}';\nconst UPPER = '${project.finalName_upper}';\n",
    )?;
    fs::write(
        root.join("packr/config.json"),
        "{\n  \"jar\": \"Launcher.jar\",\n  \"classpath\": [\"Launcher.jar\"]\n}\n",
    )?;
    fs::write(
        root.join("osx/Info.plist"),
        "<key>CFBundleName</key>\n<string>${finalName}</string>\n",
    )?;
    fs::write(
        root.join("resources/launcher.properties"),
        "app.name=${finalName}\napp.user=${user}\n",
    )?;

    fs::write(root.join("artifacts/app.bin"), b"app")?;
    fs::write(root.join("artifacts/core.bin"), b"core")?;
    fs::write(root.join("artifacts/logkit.bin"), b"logkit")?;
    fs::write(root.join("artifacts/annotations.bin"), b"annotations")?;
    Ok(())
}

fn distpack(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("distpack").expect("binary built");
    cmd.current_dir(root)
        .env_remove("GITHUB_ENV")
        .env("RUST_LOG", "info");
    cmd
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("reading {}: {}", rel, e))
}

#[test]
fn end_to_end_produces_platform_outputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    scaffold(dir.path())?;

    distpack(dir.path()).arg("--name").arg("ExampleApp").assert().success();

    let desktop = read(dir.path(), "build/filtered-resources/launcher.desktop");
    assert!(desktop.contains("Name=ExampleApp"));
    assert!(desktop.contains("Exec=exampleapp"));
    assert!(desktop.contains("Icon=launcher_splash.png"));
    // Unknown placeholders are left for later external stages.
    assert!(desktop.contains("Comment=${later.stage}"));

    let iss = read(dir.path(), "build/filtered-resources/app.iss");
    assert!(iss.contains("AppName=ExampleApp"));
    assert!(iss.contains("AppPublisherURL=https://example.invalid"));

    let pas = read(dir.path(), "build/filtered-resources/installer.pas");
    assert!(pas.contains("const NAME = 'ExampleApp';"));
    assert!(pas.contains("const UPPER = 'EXAMPLEAPP';"));

    let packr = read(dir.path(), "build/packr/config.json");
    assert!(packr.contains("\"jar\": \"ExampleApp.jar\""));
    assert!(packr.contains("\"classpath\": [\"ExampleApp.jar\"]"));

    let plist = read(dir.path(), "build/filtered-resources/Info.plist");
    assert!(plist.contains("<string>ExampleApp</string>"));

    let properties = read(dir.path(), "build/resources/launcher.properties");
    assert!(properties.contains("app.name=ExampleApp"));

    let state = read(dir.path(), "build/app-name.properties");
    assert!(state.contains("finalName=ExampleApp"));
    assert!(state.contains("lowerName=exampleapp"));
    assert!(state.contains("upperName=EXAMPLEAPP"));

    // Minimized archive: closure of the entry point plus the keep-list.
    let archive_file = fs::File::open(dir.path().join("build/ExampleApp.jar"))?;
    let archive = zip::ZipArchive::new(archive_file)?;
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"com/example/app.bin"));
    assert!(names.contains(&"lib/core.bin"));
    assert!(names.contains(&"lib/logkit.bin"));
    assert!(!names.contains(&"lib/annotations.bin"));

    let report = read(dir.path(), "build/pipeline-report.json");
    assert!(report.contains("\"success\": true"));
    Ok(())
}

#[test]
fn outputs_are_reproducible_across_runs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    scaffold(dir.path())?;

    distpack(dir.path()).arg("--name").arg("ExampleApp").assert().success();
    let first_archive = fs::read(dir.path().join("build/ExampleApp.jar"))?;
    let first_desktop = fs::read(dir.path().join("build/filtered-resources/launcher.desktop"))?;
    let first_packr = fs::read(dir.path().join("build/packr/config.json"))?;

    distpack(dir.path()).arg("--name").arg("ExampleApp").assert().success();
    assert_eq!(first_archive, fs::read(dir.path().join("build/ExampleApp.jar"))?);
    assert_eq!(
        first_desktop,
        fs::read(dir.path().join("build/filtered-resources/launcher.desktop"))?
    );
    assert_eq!(first_packr, fs::read(dir.path().join("build/packr/config.json"))?);
    Ok(())
}

#[test]
fn missing_packr_source_fails_only_its_task() -> Result<()> {
    let dir = tempfile::tempdir()?;
    scaffold(dir.path())?;
    fs::remove_file(dir.path().join("packr/config.json"))?;

    distpack(dir.path())
        .arg("--name")
        .arg("ExampleApp")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("filter-packr"));

    // Siblings and the archive are unaffected.
    assert!(dir.path().join("build/filtered-resources/launcher.desktop").exists());
    assert!(dir.path().join("build/filtered-resources/Info.plist").exists());
    assert!(dir.path().join("build/ExampleApp.jar").exists());

    let report = read(dir.path(), "build/pipeline-report.json");
    assert!(report.contains("\"success\": false"));
    assert!(report.contains("\"outcome\": \"failed\""));
    Ok(())
}

#[test]
fn failed_resolution_skips_every_downstream_task() -> Result<()> {
    let dir = tempfile::tempdir()?;
    scaffold(dir.path())?;

    // A CI env file in a directory that does not exist fails the resolve
    // task; everything downstream must be skipped, not executed.
    distpack(dir.path())
        .env("GITHUB_ENV", dir.path().join("no-such-dir/github.env"))
        .arg("--name")
        .arg("ExampleApp")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("resolve-names"));

    assert!(!dir.path().join("build/filtered-resources").exists());
    assert!(!dir.path().join("build/ExampleApp.jar").exists());

    let report = read(dir.path(), "build/pipeline-report.json");
    assert!(report.contains("\"outcome\": \"skipped\""));
    assert!(report.contains("\"dependency\": \"resolve-names\""));
    Ok(())
}

#[test]
fn persisted_names_win_over_later_overrides() -> Result<()> {
    let dir = tempfile::tempdir()?;
    scaffold(dir.path())?;

    distpack(dir.path()).arg("--name").arg("ExampleApp").assert().success();
    // A second stage of the same build must see the persisted triple even
    // with a diverging override.
    distpack(dir.path()).arg("--name").arg("OtherApp").assert().success();

    let desktop = read(dir.path(), "build/filtered-resources/launcher.desktop");
    assert!(desktop.contains("Name=ExampleApp"));
    assert!(dir.path().join("build/ExampleApp.jar").exists());
    assert!(!dir.path().join("build/OtherApp.jar").exists());
    Ok(())
}

#[test]
fn default_name_is_used_when_nothing_is_configured() -> Result<()> {
    let dir = tempfile::tempdir()?;
    scaffold(dir.path())?;

    distpack(dir.path()).assert().success();

    let state = read(dir.path(), "build/app-name.properties");
    assert!(state.contains("finalName=Launcher"));
    assert!(dir.path().join("build/Launcher.jar").exists());
    Ok(())
}
