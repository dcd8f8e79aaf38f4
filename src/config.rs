use crate::types::{ChipError, ChipResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Top-level pipeline configuration, loaded from a `.yaml` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub pipeline_elements: PipelineElements,
    /// Variables exported into the process environment before stages run
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub datastores: Vec<Datastore>,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub epsg: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineElements {
    #[serde(default)]
    pub elements: Vec<PipelineElement>,
}

/// One gated pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineElement {
    pub script: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// A storage location the pipeline reads from or writes to. When
/// `symbolic` is set, `local_dir` becomes a symlink to `remote_dir`;
/// otherwise `local_dir` is created as a plain directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datastore {
    pub local_dir: PathBuf,
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,
    #[serde(default)]
    pub symbolic: bool,
}

/// Where to fetch the shared configuration file from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub file: String,
}

impl PipelineConfig {
    /// Load a configuration file; the path must exist and end in `.yaml`
    pub fn load<P: AsRef<Path>>(path: P) -> ChipResult<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            return Err(ChipError::Config(format!(
                "configuration file {} must have a .yaml suffix",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(ChipError::Config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        log::info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> ChipResult<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)
            .map_err(|e| ChipError::Config(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ChipResult<()> {
        if self.project.name.trim().is_empty() {
            return Err(ChipError::Config("project.name must not be empty".to_string()));
        }
        for element in &self.pipeline_elements.elements {
            if element.script.trim().is_empty() {
                return Err(ChipError::Config(
                    "pipeline element with empty script name".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Dump the configuration to the log for auditability
    pub fn display(&self) {
        match serde_yaml::to_string(self) {
            Ok(rendered) => log::info!("Pipeline configuration:\n{}", rendered),
            Err(e) => log::warn!("Could not render configuration: {}", e),
        }
    }

    /// Whether a pipeline stage should run. Stages default to enabled;
    /// only an entry carrying `enabled: false` switches one off.
    pub fn element_enabled(&self, script: &str) -> bool {
        for element in &self.pipeline_elements.elements {
            if element.script == script && !element.enabled {
                return false;
            }
        }
        true
    }

    /// Export the `environment` map into the process environment
    pub fn apply_environment(&self) {
        for (key, value) in &self.environment {
            log::debug!("Setting environment variable {}", key);
            std::env::set_var(key, value);
        }
    }

    /// Materialize every datastore below `root`: symlinks for symbolic
    /// stores, plain directories otherwise. Existing entries are left
    /// untouched.
    pub fn setup_datastores<P: AsRef<Path>>(&self, root: P) -> ChipResult<()> {
        let root = root.as_ref();
        for store in &self.datastores {
            let local = root.join(&store.local_dir);
            if store.symbolic {
                let remote = store.remote_dir.as_ref().ok_or_else(|| {
                    ChipError::Config(format!(
                        "symbolic datastore {} has no remote_dir",
                        store.local_dir.display()
                    ))
                })?;
                if local.symlink_metadata().is_ok() {
                    log::debug!("Datastore link {} already present", local.display());
                    continue;
                }
                if let Some(parent) = local.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                link_datastore(remote, &local)?;
                log::info!(
                    "Linked datastore {} -> {}",
                    local.display(),
                    remote.display()
                );
            } else {
                std::fs::create_dir_all(&local)?;
                log::debug!("Datastore directory {} ready", local.display());
            }
        }
        Ok(())
    }

    /// Fetch the remote configuration file declared in `remote` into `dest_dir`
    pub fn fetch_remote<P: AsRef<Path>>(&self, dest_dir: P) -> ChipResult<PathBuf> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            ChipError::Config("no remote configuration source declared".to_string())
        })?;
        let dest = dest_dir.as_ref().join(&remote.file);
        fetch_config_file(&remote.url, &dest)?;
        Ok(dest)
    }
}

#[cfg(unix)]
fn link_datastore(remote: &Path, local: &Path) -> ChipResult<()> {
    std::os::unix::fs::symlink(remote, local)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_datastore(_remote: &Path, local: &Path) -> ChipResult<()> {
    Err(ChipError::Config(format!(
        "symbolic datastore {} requires a unix host",
        local.display()
    )))
}

/// Download a configuration file over HTTPS. The body lands in a scratch
/// file first and is moved into place only on success.
pub fn fetch_config_file(url: &str, dest: &Path) -> ChipResult<()> {
    log::info!("Fetching remote configuration {}", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| ChipError::Config(format!("failed to build HTTP client: {}", e)))?;
    let response = client
        .get(url)
        .send()
        .map_err(|e| ChipError::Config(format!("failed to fetch {}: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(ChipError::Config(format!(
            "fetch of {} failed with HTTP {}",
            url,
            response.status()
        )));
    }
    let body = response
        .bytes()
        .map_err(|e| ChipError::Config(format!("failed to read body of {}: {}", url, e)))?;

    let parent = dest.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let mut scratch = tempfile::NamedTempFile::new_in(&parent)?;
    scratch.write_all(&body)?;
    scratch
        .persist(dest)
        .map_err(|e| ChipError::Io(e.error))?;

    log::info!("Saved remote configuration to {}", dest.display());
    Ok(())
}

/// Default search path for the pipeline configuration: the working
/// directory first, then the user configuration directory.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("pipeline.yaml");
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("chipseal").join("pipeline.yaml"))
        .filter(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
project:
  name: seal-survey
  epsg: 32724
pipeline_elements:
  elements:
    - script: retrieve_data
      enabled: true
    - script: pansharpen
      enabled: false
environment:
  GDAL_CACHEMAX: "512"
datastores:
  - local_dir: scenes
    remote_dir: /mnt/share/scenes
    symbolic: true
  - local_dir: tiles
remote:
  url: https://example.org/configs/pipeline.yaml
  file: pipeline.yaml
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = PipelineConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.project.name, "seal-survey");
        assert_eq!(config.project.epsg, Some(32724));
        assert_eq!(config.pipeline_elements.elements.len(), 2);
        assert_eq!(config.datastores.len(), 2);
        assert_eq!(config.environment.get("GDAL_CACHEMAX").map(String::as_str), Some("512"));
    }

    #[test]
    fn test_element_gating_defaults_to_enabled() {
        let config = PipelineConfig::from_yaml(SAMPLE).unwrap();
        assert!(config.element_enabled("retrieve_data"));
        assert!(!config.element_enabled("pansharpen"));
        // Scripts the config never mentions stay enabled
        assert!(config.element_enabled("tile_scenes"));
    }

    #[test]
    fn test_element_without_enabled_flag_parses_as_enabled() {
        let yaml = "project:\n  name: p\npipeline_elements:\n  elements:\n    - script: stage_data\n";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert!(config.pipeline_elements.elements[0].enabled);
        assert!(config.element_enabled("stage_data"));
    }

    #[test]
    fn test_load_rejects_non_yaml_suffix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(PipelineConfig::load(dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_empty_project_name_rejected() {
        let result = PipelineConfig::from_yaml("project:\n  name: \"\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_setup_datastores_creates_plain_dirs() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::from_yaml("project:\n  name: p\ndatastores:\n  - local_dir: tiles\n").unwrap();
        config.setup_datastores(dir.path()).unwrap();
        assert!(dir.path().join("tiles").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_setup_datastores_links_symbolic_stores() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote_scenes");
        std::fs::create_dir(&remote).unwrap();

        let yaml = format!(
            "project:\n  name: p\ndatastores:\n  - local_dir: scenes\n    remote_dir: {}\n    symbolic: true\n",
            remote.display()
        );
        let config = PipelineConfig::from_yaml(&yaml).unwrap();
        config.setup_datastores(dir.path()).unwrap();

        let link = dir.path().join("scenes");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        // A second run leaves the existing link alone
        config.setup_datastores(dir.path()).unwrap();
    }
}
