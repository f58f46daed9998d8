//! `ConfigEngine` finds the right default location for DragonSync's
//! configuration file and loads it.
//!
//! Config-file-and-struct-neutral: it only knows the base directory and,
//! with `load()`, reads the proper file (or the default one).

use crate::makepath;

use directories::BaseDirs;
use eyre::Result;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::{env, fs};
use tracing::{debug, trace};

/// Config filename
const CONFIG: &str = "config.hcl";

/// Main name for the directory base
const TAG: &str = "dragonsync";

/// Anything loadable through `ConfigEngine` must expose its own version so
/// we can detect a stale config file early instead of failing deep inside
/// deserialization.
pub trait Versioned {
    fn version(&self) -> usize;
}

/// Locates and loads a DragonSync configuration file.
#[derive(Debug)]
pub struct ConfigEngine<T: Debug + DeserializeOwned + Versioned> {
    basedir: PathBuf,
    _a: PhantomData<T>,
}

impl<T> ConfigEngine<T>
where
    T: Debug + DeserializeOwned + Versioned,
{
    #[tracing::instrument]
    fn new(tag: &str) -> Self {
        let base = BaseDirs::new();

        let basedir: PathBuf = match base {
            Some(base) => {
                let base = base.config_local_dir().to_string_lossy().to_string();
                debug!("base = {base}");
                makepath!(base, tag)
            }
            None => {
                #[cfg(unix)]
                let homedir = env::var("HOME").expect("HOME is not set, can not continue");

                #[cfg(windows)]
                let homedir =
                    env::var("LOCALAPPDATA").expect("LOCALAPPDATA is not set, can not continue");

                debug!("base = {homedir}");

                #[cfg(unix)]
                let base: PathBuf = makepath!(homedir, ".config", tag);

                #[cfg(windows)]
                let base: PathBuf = makepath!(homedir, tag);

                base
            }
        };
        ConfigEngine {
            basedir,
            _a: PhantomData,
        }
    }

    /// Returns the path of the default config directory.
    #[tracing::instrument]
    pub fn config_path(&self) -> PathBuf {
        self.basedir.clone()
    }

    /// Returns the path of the default config file.
    #[tracing::instrument]
    pub fn default_file(&self) -> PathBuf {
        let cfg = self.config_path().join(CONFIG);
        debug!("default = {cfg:?}");
        cfg
    }

    #[tracing::instrument]
    pub fn load(fname: Option<&str>) -> Result<T> {
        trace!("loading config");

        let cfg = ConfigEngine::<T>::new(TAG);

        let fname = match fname {
            Some(fname) => PathBuf::from(fname),
            None => cfg.default_file(),
        };

        trace!("reading {fname:?}");
        let data = fs::read_to_string(fname)?;

        let data: T = hcl::from_str(&data)?;
        debug!("config = {data:?}");

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Deserialize)]
    struct Foo {
        version: usize,
        pub name: String,
    }

    impl Versioned for Foo {
        fn version(&self) -> usize {
            self.version
        }
    }

    #[test]
    fn test_configengine_default_file_under_tag_dir() {
        let cfg = ConfigEngine::<Foo>::new(TAG);
        let path = cfg.default_file();
        assert!(path.ends_with("dragonsync/config.hcl") || path.ends_with("dragonsync\\config.hcl"));
    }

    #[test]
    fn test_configengine_load_missing_file_errors() {
        let res: Result<Foo> = ConfigEngine::load(Some("/nonexistent/dragonsync.hcl"));
        assert!(res.is_err());
    }
}
