//! Bundle search paths
//!
//! A bundle is a directory of pluggable application code. Bundles are merged
//! from several roots, in increasing order of precedence:
//!
//! 1. installed bundle packages (`<packages_dir>/*/bundles/*/` and
//!    `<packages_dir>/*/*/bundles/*/`)
//! 2. local module roots listed in configuration
//! 3. the application's own `bundles/*/` directory
//!
//! Later roots override earlier ones, so expanding a relative pattern keeps
//! each resolved pattern at the position of its last contributing root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::glob;
use tracing::debug;

use crate::config::BundlesConfig;
use crate::error::{BundleError, Result};

/// Ordered list of bundle directory glob roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundlePaths {
    roots: Vec<String>,
}

impl BundlePaths {
    /// Create search paths from explicit roots.
    ///
    /// Each root is a directory glob; a trailing separator is added when
    /// missing so relative patterns can be appended directly.
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roots = roots
            .into_iter()
            .map(|r| {
                let mut root: String = r.into();
                if !root.ends_with('/') {
                    root.push('/');
                }
                root
            })
            .collect();
        Self { roots }
    }

    /// Compute the search roots for an application
    pub fn discover(app_root: &Path, config: &BundlesConfig) -> Self {
        let mut roots = Vec::new();

        let packages = app_root.join(&config.packages_dir);
        if packages.is_dir() {
            roots.extend(package_roots(&packages));
        }

        for module in &config.modules {
            let module = if module.is_absolute() {
                module.clone()
            } else {
                app_root.join(module)
            };
            roots.extend(package_roots(&module.join(&config.packages_dir)));
            roots.push(dir_glob(&module.join("bundles")));
        }

        let bundles = app_root.join("bundles");
        if bundles.is_dir() {
            roots.push(dir_glob(&bundles));
        }

        debug!(roots = roots.len(), "bundle search paths computed");
        Self::new(roots)
    }

    /// The ordered search roots
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Whether no roots are configured
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Expand relative patterns against every root.
    ///
    /// Produces `root + pattern` for each root (outer) and pattern (inner).
    /// Duplicates are removed so that each resolved pattern appears exactly
    /// once, at the position of its last occurrence.
    pub fn files<S: AsRef<str>>(&self, patterns: &[S]) -> Vec<String> {
        let combined = self.roots.iter().flat_map(|root| {
            patterns
                .iter()
                .map(move |p| format!("{}{}", root, p.as_ref().trim_start_matches('/')))
        });

        let mut seen = HashSet::new();
        let mut kept: Vec<String> = combined
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        kept.reverse();
        kept
    }

    /// Expand relative patterns and return the matching paths on disk.
    ///
    /// Paths are sorted within each resolved pattern and deduplicated across
    /// patterns, keeping the first match.
    pub fn glob<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        for pattern in self.files(patterns) {
            let entries = glob(&pattern).map_err(|e| BundleError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;

            let mut paths = Vec::new();
            for entry in entries {
                let path = entry.map_err(|e| BundleError::Unreadable(e.to_string()))?;
                paths.push(path);
            }
            paths.sort();

            for path in paths {
                if seen.insert(path.clone()) {
                    matches.push(path);
                }
            }
        }

        debug!(count = matches.len(), "bundle files matched");
        Ok(matches)
    }
}

fn package_roots(packages: &Path) -> [String; 2] {
    [
        dir_glob(&packages.join("*").join("bundles")),
        dir_glob(&packages.join("*").join("*").join("bundles")),
    ]
}

fn dir_glob(dir: &Path) -> String {
    format!("{}/*/", dir.to_string_lossy().trim_end_matches('/'))
}
