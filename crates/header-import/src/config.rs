//! Header importer configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "import-headers.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub destination: DestinationSettings,
    /// Headers to import, relative to the upstream public include directory
    #[serde(default = "default_headers")]
    pub headers: Vec<HeaderSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default = "GeneralSettings::default_log_level")]
    pub log_level: String,
    /// Stop at the first git step that exits non-zero
    #[serde(default = "GeneralSettings::default_strict")]
    pub strict: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            strict: Self::default_strict(),
        }
    }
}

impl GeneralSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_strict() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "UpstreamSettings::default_url")]
    pub url: String,
    /// Public header directory inside the upstream checkout
    #[serde(default = "UpstreamSettings::default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "UpstreamSettings::default_primary_branch")]
    pub primary_branch: String,
    /// Throwaway branch created at the requested tag
    #[serde(default = "UpstreamSettings::default_temp_branch")]
    pub temp_branch: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            public_dir: Self::default_public_dir(),
            primary_branch: Self::default_primary_branch(),
            temp_branch: Self::default_temp_branch(),
        }
    }
}

impl UpstreamSettings {
    fn default_url() -> String {
        "git://xenbits.xen.org/xen.git".to_string()
    }

    fn default_public_dir() -> PathBuf {
        PathBuf::from("xen/include/public")
    }

    fn default_primary_branch() -> String {
        "master".to_string()
    }

    fn default_temp_branch() -> String {
        "tmp".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSettings {
    /// Local repository whose index receives the headers
    #[serde(default = "DestinationSettings::default_repo_root")]
    pub repo_root: PathBuf,
    /// Include tree, relative to `repo_root`
    #[serde(default = "DestinationSettings::default_include_root")]
    pub include_root: PathBuf,
}

impl Default for DestinationSettings {
    fn default() -> Self {
        Self {
            repo_root: Self::default_repo_root(),
            include_root: Self::default_include_root(),
        }
    }
}

impl DestinationSettings {
    fn default_repo_root() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_include_root() -> PathBuf {
        PathBuf::from("include/xen")
    }
}

/// One header to import
///
/// `subdir` is empty for headers at the top of the public directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpec {
    #[serde(default)]
    pub subdir: String,
    pub file: String,
}

impl HeaderSpec {
    pub fn new(subdir: &str, file: &str) -> Self {
        Self {
            subdir: subdir.to_string(),
            file: file.to_string(),
        }
    }

    /// Path relative to a header root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.subdir).join(&self.file)
    }
}

fn default_headers() -> Vec<HeaderSpec> {
    vec![
        HeaderSpec::new("", "xen.h"),
        HeaderSpec::new("", "xen-compat.h"),
        HeaderSpec::new("arch-x86", "xen.h"),
        HeaderSpec::new("arch-x86", "xen-x86_64.h"),
        HeaderSpec::new("io", "ring.h"),
        HeaderSpec::new("io", "xs_wire.h"),
    ]
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            upstream: UpstreamSettings::default(),
            destination: DestinationSettings::default(),
            headers: default_headers(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from `path`, or from the first standard location
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => common::locate_config(CONFIG_FILE)
                .ok_or_else(|| anyhow!("No configuration file found"))?,
        };

        let config: ImportConfig = common::read_toml(&config_path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load the first configuration file found, or defaults if there is none
    ///
    /// A file that exists but does not parse or validate is an error.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first(common::config_candidates(CONFIG_FILE))
    }

    fn load_first(candidates: Vec<PathBuf>) -> Result<Self> {
        match common::find_config(candidates) {
            Some(path) => Self::load(Some(path)),
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        common::write_toml(self, path)?;
        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        common::user_config_path(CONFIG_FILE)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        common::validate_log_level(&self.general.log_level)?;

        if self.upstream.url.trim().is_empty() {
            return Err(anyhow!("Upstream URL must not be empty"));
        }

        if self.upstream.primary_branch.is_empty() || self.upstream.temp_branch.is_empty() {
            return Err(anyhow!("Branch names must not be empty"));
        }

        if self.upstream.primary_branch == self.upstream.temp_branch {
            return Err(anyhow!(
                "Temporary branch '{}' must differ from the primary branch",
                self.upstream.temp_branch
            ));
        }

        if self.destination.include_root.as_os_str().is_empty() {
            return Err(anyhow!("Destination include_root must not be empty"));
        }

        if self.headers.is_empty() {
            return Err(anyhow!("Header list is empty, nothing to import"));
        }

        for header in &self.headers {
            Self::validate_header(header)?;
        }

        Ok(())
    }

    /// Header entries must stay inside the include tree
    fn validate_header(header: &HeaderSpec) -> Result<()> {
        if header.file.is_empty() || header.file.contains(['/', '\\']) {
            return Err(anyhow!(
                "Invalid header file name '{}', expected a bare file name",
                header.file
            ));
        }

        let escapes = Path::new(&header.subdir)
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if escapes {
            return Err(anyhow!(
                "Invalid header subdir '{}', must be a relative path without '..'",
                header.subdir
            ));
        }

        Ok(())
    }
}
