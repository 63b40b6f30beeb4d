//! Configuration file support for Skunk
//!
//! Loads project-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.skunkrc.json` in project root
//! 3. `skunk.config.json` in project root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default exclude patterns applied when no config is specified
const DEFAULT_EXCLUDES: &[&str] = &["**/.*/**"];

/// Skunk configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkunkConfig {
    /// Glob patterns for srcML files to include (default: every `.xml` file)
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns for srcML files to exclude (default: hidden directories)
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Feature references file, relative to the project root
    #[serde(default)]
    pub features: Option<PathBuf>,

    /// Worker threads for per-file analysis (default: one per core)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Only report functions with at least this many lines of feature code
    #[serde(default)]
    pub min_lofc: Option<u64>,
}

/// Resolved configuration with compiled glob patterns
#[derive(Debug)]
pub struct ResolvedConfig {
    /// Compiled include patterns (None means include all)
    pub include: Option<GlobSet>,
    /// Compiled exclude patterns
    pub exclude: GlobSet,
    /// Source patterns behind `exclude`
    pub exclude_patterns: Vec<String>,
    pub features: Option<PathBuf>,
    pub threads: Option<usize>,
    pub min_lofc: Option<u64>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl SkunkConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1 (got 0)");
        }

        for pattern in &self.include {
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        }
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Resolve config into compiled form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let include = if self.include.is_empty() {
            None
        } else {
            Some(build_globset(self.include.iter().map(String::as_str))?)
        };

        let exclude_patterns: Vec<String> = if self.exclude.is_empty() {
            DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect()
        } else {
            self.exclude.clone()
        };
        let exclude = build_globset(exclude_patterns.iter().map(String::as_str))?;

        Ok(ResolvedConfig {
            include,
            exclude,
            exclude_patterns,
            features: self.features.clone(),
            threads: self.threads,
            min_lofc: self.min_lofc,
            config_path: None,
        })
    }
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

impl ResolvedConfig {
    /// Check if a file path should be included based on include/exclude patterns
    pub fn should_include(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        if self.exclude.is_match(path_str.as_ref()) {
            return false;
        }

        if let Some(ref include) = self.include {
            return include.is_match(path_str.as_ref());
        }

        true
    }

    /// True when no exclude patterns were configured
    pub fn uses_default_excludes(&self) -> bool {
        self.exclude_patterns
            .iter()
            .map(String::as_str)
            .eq(DEFAULT_EXCLUDES.iter().copied())
    }

    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        SkunkConfig::default().resolve()
    }
}

/// Discover and load a config file from the project root
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(SkunkConfig, PathBuf)>> {
    for name in [".skunkrc.json", "skunk.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<SkunkConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: SkunkConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns default config if nothing is found. A relative `features` path is
/// resolved against the directory holding the config file.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (SkunkConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let (Some(features), Some(source)) = (&resolved.features, &source_path) {
        if features.is_relative() {
            let base = source.parent().unwrap_or(project_root);
            resolved.features = Some(base.join(features));
        }
    }
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = SkunkConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert!(resolved.include.is_none());
        assert!(resolved.threads.is_none());
        assert!(resolved.min_lofc.is_none());
        assert!(resolved.should_include(Path::new("out/src/log.c.xml")));
        assert!(!resolved.should_include(Path::new("out/.cache/log.c.xml")));
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "include": ["out/src/**"],
            "exclude": ["**/test/**"],
            "features": "features.json",
            "threads": 4,
            "min_lofc": 2
        }"#;
        let config: SkunkConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert!(resolved.should_include(Path::new("out/src/a.c.xml")));
        assert!(!resolved.should_include(Path::new("out/src/test/a.c.xml")));
        assert!(!resolved.should_include(Path::new("out/lib/a.c.xml")));
        assert_eq!(resolved.threads, Some(4));
        assert_eq!(resolved.min_lofc, Some(2));
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"unknown_field": true}"#;
        let result: Result<SkunkConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_zero_threads() {
        let config = SkunkConfig {
            threads: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_invalid_glob() {
        let config = SkunkConfig {
            include: vec!["src/[".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_rc_file_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".skunkrc.json"), r#"{"threads": 2}"#).unwrap();
        fs::write(dir.path().join("skunk.config.json"), r#"{"threads": 3}"#).unwrap();
        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.threads, Some(2));
        assert!(path.ends_with(".skunkrc.json"));
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert!(resolved.features.is_none());
    }

    #[test]
    fn test_features_path_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("skunk.config.json"),
            r#"{"features": "refs/features.json"}"#,
        )
        .unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert_eq!(
            resolved.features,
            Some(dir.path().join("refs/features.json"))
        );
    }

    #[test]
    fn test_config_file_without_exclude_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".skunkrc.json"), r#"{"threads": 2}"#).unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_some());
        assert!(resolved.uses_default_excludes());
        assert_eq!(resolved.exclude_patterns, vec!["**/.*/**".to_string()]);
        assert!(!resolved.should_include(Path::new("out/.cache/log.c.xml")));
    }

    #[test]
    fn test_config_file_with_exclude_replaces_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".skunkrc.json"),
            r#"{"exclude": ["**/test/**"]}"#,
        )
        .unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(!resolved.uses_default_excludes());
        assert_eq!(resolved.exclude_patterns, vec!["**/test/**".to_string()]);
        assert!(resolved.should_include(Path::new("out/.cache/log.c.xml")));
    }

    #[test]
    fn test_invalid_config_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_and_resolve(dir.path(), Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
    }
}
