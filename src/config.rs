//! Fork configuration loading and validation.
//!
//! The config file is an INI document with a `[USER]` section holding the
//! credentials used to call the API, an `[OWNER]` section naming the account
//! that will own the forks, and any number of repository sections whose name
//! contains `REPO`:
//!
//! ```ini
//! [USER]
//! USERNAME = alice
//! APP_PW = app-password
//!
//! [OWNER]
//! USERNAME = acme
//!
//! [REPO_BACKEND]
//! ORIGIN_REPO_SLUG = backend
//! ORIGIN_PROJECT_KEY = CORE
//! FORK_REPO_NAME = backend-fork
//! FORK_PROJECT_KEY = FORKS
//! LANGUAGE = rust
//! ```
//!
//! Keys under a `[DEFAULT]` section apply to every other section unless the
//! section sets them itself.
//!
//! Validation is all-or-nothing: a config either loads completely or fails
//! before any request is made.

use ini::{Ini, ParseOption, Properties};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ForkerError, Result};

/// Config path used when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "./configs/fork_config.cfg";

/// Substring that marks a section as a repository entry.
pub const REPO_SECTION_MARKER: &str = "REPO";

const DEFAULT_SECTION: &str = "DEFAULT";
const USER_SECTION: &str = "USER";
const OWNER_SECTION: &str = "OWNER";
const USERNAME: &str = "USERNAME";
const APP_PW: &str = "APP_PW";

const ORIGIN_REPO_SLUG: &str = "ORIGIN_REPO_SLUG";
const ORIGIN_PROJECT_KEY: &str = "ORIGIN_PROJECT_KEY";
const FORK_REPO_NAME: &str = "FORK_REPO_NAME";
const FORK_PROJECT_KEY: &str = "FORK_PROJECT_KEY";
const LANGUAGE: &str = "LANGUAGE";

/// Required sections and their keys, in validation order.
const REQUIRED_SECTIONS: [(&str, &[&str]); 2] = [
    (USER_SECTION, &[USERNAME, APP_PW]),
    (OWNER_SECTION, &[USERNAME]),
];

/// Keys every repository section must define.
pub const REPO_OPTIONS: [&str; 5] = [
    ORIGIN_REPO_SLUG,
    ORIGIN_PROJECT_KEY,
    FORK_REPO_NAME,
    FORK_PROJECT_KEY,
    LANGUAGE,
];

/// Credentials for authenticating API calls.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    app_password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            app_password: app_password.into(),
        }
    }

    pub fn app_password(&self) -> &str {
        &self.app_password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("app_password", &"[REDACTED]")
            .finish()
    }
}

/// One repository section of the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    /// Section name the entry was declared under.
    pub section: String,
    pub origin_repo_slug: String,
    pub origin_project_key: String,
    pub fork_repo_name: String,
    pub fork_project_key: String,
    pub language: String,
}

/// A validated fork configuration.
#[derive(Debug, Clone)]
pub struct ForkConfig {
    pub credentials: Credentials,
    /// Account the forks are created under.
    pub owner: String,
    /// Repository entries in file declaration order.
    pub repos: Vec<RepoEntry>,
}

impl ForkConfig {
    /// Load from the given path, or from [`DEFAULT_CONFIG_FILE`] when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_file(&path)
    }

    /// Load and validate a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ForkerError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let ini = Ini::load_from_str_opt(&content, parse_options()).map_err(|e| {
            ForkerError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        Self::from_ini(&ini, path)
    }

    /// Parse and validate config text.
    pub fn parse(content: &str) -> Result<Self> {
        let path = Path::new("<string>");
        let ini = Ini::load_from_str_opt(content, parse_options()).map_err(|e| {
            ForkerError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        Self::from_ini(&ini, path)
    }

    fn from_ini(ini: &Ini, path: &Path) -> Result<Self> {
        let sections = named_sections(ini, path)?;

        let missing: Vec<String> = REQUIRED_SECTIONS
            .iter()
            .filter(|(name, _)| !sections.iter().any(|s| s.name == *name))
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ForkerError::MissingSection { sections: missing });
        }

        for (name, options) in REQUIRED_SECTIONS {
            section_named(&sections, name)?.require(options)?;
        }

        let user = section_named(&sections, USER_SECTION)?;
        let owner = section_named(&sections, OWNER_SECTION)?;
        let credentials = Credentials::new(user.value(USERNAME), user.value(APP_PW));
        let owner = owner.value(USERNAME);

        let mut repos = Vec::new();
        for section in sections.iter().filter(|s| is_repo_section(s.name)) {
            section.require(&REPO_OPTIONS)?;
            repos.push(RepoEntry {
                section: section.name.to_string(),
                origin_repo_slug: section.value(ORIGIN_REPO_SLUG),
                origin_project_key: section.value(ORIGIN_PROJECT_KEY),
                fork_repo_name: section.value(FORK_REPO_NAME),
                fork_project_key: section.value(FORK_PROJECT_KEY),
                language: section.value(LANGUAGE),
            });
        }

        Ok(Self {
            credentials,
            owner,
            repos,
        })
    }
}

/// Whether a section name declares a repository entry.
pub fn is_repo_section(name: &str) -> bool {
    name != USER_SECTION && name != OWNER_SECTION && name.contains(REPO_SECTION_MARKER)
}

fn parse_options() -> ParseOption {
    // Passwords are taken literally.
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

struct Section<'a> {
    name: &'a str,
    props: &'a Properties,
    /// Keys from `[DEFAULT]`, inherited by every section.
    defaults: Option<&'a Properties>,
}

impl Section<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.props
            .get(key)
            .or_else(|| self.defaults.and_then(|d| d.get(key)))
    }

    fn require(&self, options: &[&str]) -> Result<()> {
        let missing: Vec<String> = options
            .iter()
            .filter(|key| self.get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ForkerError::MissingOption {
                section: self.name.to_string(),
                options: missing,
            })
        }
    }

    fn value(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }
}

/// Named sections in declaration order.
///
/// Rejects duplicate sections, duplicate keys within a section and keys
/// placed before the first section header. `[DEFAULT]` is not returned as a
/// section; its keys back every other section.
fn named_sections<'a>(ini: &'a Ini, path: &Path) -> Result<Vec<Section<'a>>> {
    let mut seen = HashSet::new();
    let mut declared = Vec::new();
    let mut defaults = None;

    for (name, props) in ini.iter() {
        let Some(name) = name else {
            if let Some((key, _)) = props.iter().next() {
                return Err(ForkerError::ConfigParse {
                    path: path.to_path_buf(),
                    message: format!("key {key:?} appears before any section header"),
                });
            }
            continue;
        };
        if !seen.insert(name) {
            return Err(ForkerError::DuplicateSection(name.to_string()));
        }
        if let Some((key, _)) = props.iter().find(|(key, _)| props.get_all(*key).count() > 1) {
            return Err(ForkerError::DuplicateOption {
                section: name.to_string(),
                option: key.to_string(),
            });
        }
        if name == DEFAULT_SECTION {
            defaults = Some(props);
        } else {
            declared.push((name, props));
        }
    }

    Ok(declared
        .into_iter()
        .map(|(name, props)| Section {
            name,
            props,
            defaults,
        })
        .collect())
}

fn section_named<'s, 'a>(sections: &'s [Section<'a>], name: &str) -> Result<&'s Section<'a>> {
    sections
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ForkerError::MissingSection {
            sections: vec![name.to_string()],
        })
}
