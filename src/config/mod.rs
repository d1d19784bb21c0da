//! Pipeline configuration.
//!
//! Loaded from a `distpack.toml` at the project root. Every section has
//! defaults mirroring the conventional source layout (`appimage/`,
//! `innosetup/`, `packr/`, `osx/` resource directories, a `build/` staging
//! area), so a minimal project needs only the sections it customizes.

use crate::pipeline::error::{ErrorExt, Result};
use crate::pipeline::template::LineRule;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration for one pipeline invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Product identity.
    #[serde(default)]
    pub product: ProductConfig,

    /// Staging area layout.
    #[serde(default)]
    pub staging: StagingConfig,

    /// Static tokens (lowest substitution precedence).
    ///
    /// Conventionally used for fixed resource filenames such as icon and
    /// splash images.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,

    /// Template source locations and find/replace rules.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Executable archive contents.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl PipelineConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).fs_context("reading configuration", path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads configuration, falling back to defaults when the file does not
    /// exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

/// Product identity configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductConfig {
    /// Configured display name.
    ///
    /// Overridden by `--name`; absent means the built-in default.
    ///
    /// Default: None
    #[serde(default)]
    pub name: Option<String>,

    /// Explicit normalized (lowercase) name override.
    ///
    /// Default: None (derived from the display name)
    #[serde(default)]
    pub lower: Option<String>,

    /// Product website, exposed as the `website` token.
    ///
    /// Default: None
    #[serde(default)]
    pub website: Option<String>,
}

/// Staging area configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Directory all generated outputs land under.
    ///
    /// Default: `build`
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("build")
}

/// Template source locations and the line-replace rule sets.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    /// Root of the structured-resource tree swept for `*.properties` and
    /// `*.xml` files.
    ///
    /// Default: None (the sweep task is not registered)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Directory holding the AppImage desktop entry.
    ///
    /// Default: `appimage`
    #[serde(default = "default_appimage_dir")]
    pub appimage: PathBuf,

    /// Directory holding Inno Setup `.iss` and `.pas` sources.
    ///
    /// Default: `innosetup`
    #[serde(default = "default_innosetup_dir")]
    pub innosetup: PathBuf,

    /// Directory holding the packr `.json` manifest.
    ///
    /// Default: `packr`
    #[serde(default = "default_packr_dir")]
    pub packr: PathBuf,

    /// Directory holding the macOS `Info.plist`.
    ///
    /// Default: `osx`
    #[serde(default = "default_osx_dir")]
    pub osx: PathBuf,

    /// Find/replace rules for the packr manifest.
    ///
    /// Default: rename the default launcher jar to `${finalName}.jar`
    #[serde(default = "default_packr_rules")]
    pub packr_rules: Vec<LineRule>,

    /// Find/replace rules for the Inno Setup Pascal scripts.
    ///
    /// Default: resolve the installer script's name placeholders to the
    /// uppercase and display names
    #[serde(default = "default_script_rules")]
    pub script_rules: Vec<LineRule>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            root: None,
            appimage: default_appimage_dir(),
            innosetup: default_innosetup_dir(),
            packr: default_packr_dir(),
            osx: default_osx_dir(),
            packr_rules: default_packr_rules(),
            script_rules: default_script_rules(),
        }
    }
}

fn default_appimage_dir() -> PathBuf {
    PathBuf::from("appimage")
}

fn default_innosetup_dir() -> PathBuf {
    PathBuf::from("innosetup")
}

fn default_packr_dir() -> PathBuf {
    PathBuf::from("packr")
}

fn default_osx_dir() -> PathBuf {
    PathBuf::from("osx")
}

fn default_packr_rules() -> Vec<LineRule> {
    vec![LineRule {
        pattern: "Launcher.jar".to_string(),
        replacement: "${finalName}.jar".to_string(),
    }]
}

fn default_script_rules() -> Vec<LineRule> {
    vec![
        LineRule {
            pattern: "${project.finalName_upper}".to_string(),
            replacement: "${upperName}".to_string(),
        },
        LineRule {
            pattern: "{project.finalName}".to_string(),
            replacement: "${finalName}".to_string(),
        },
    ]
}

/// Executable archive configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Archive file extension.
    ///
    /// Default: `jar`
    #[serde(default = "default_archive_extension")]
    pub extension: String,

    /// Unit the reachability closure starts from.
    ///
    /// Required when units are declared.
    #[serde(default)]
    pub entry_point: Option<String>,

    /// Glob patterns naming units kept regardless of reachability.
    ///
    /// The escape hatch for units loaded by name rather than static
    /// reference.
    ///
    /// Default: empty
    #[serde(default)]
    pub keep: Vec<String>,

    /// The dependency set. The bundle task is registered only when at
    /// least one unit is declared.
    ///
    /// Default: empty
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            extension: default_archive_extension(),
            entry_point: None,
            keep: Vec::new(),
            units: Vec::new(),
        }
    }
}

fn default_archive_extension() -> String {
    "jar".to_string()
}

/// One declared dependency unit.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// Unit name, unique within the archive section.
    pub name: String,

    /// Names of units this unit statically references.
    ///
    /// Default: empty
    #[serde(default)]
    pub refs: Vec<String>,

    /// Files the unit contributes to the archive.
    ///
    /// Default: empty
    #[serde(default)]
    pub files: Vec<FileMappingConfig>,
}

/// Source artifact mapped to its path inside the archive.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMappingConfig {
    /// Artifact on disk.
    pub source: PathBuf,
    /// Path of the entry inside the archive.
    pub archive_path: String,
}
