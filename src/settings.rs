use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::Config;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use crate::log::LogSettings;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub worker: WorkerSettings,
    /// remove server side quoting from matchers before matching
    pub unquote_matchers: bool,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub queue_capacity: usize,
    #[serde_as(as = "Option<DurationSeconds<f64>>")]
    pub request_timeout: Option<Duration>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            request_timeout: None,
        }
    }
}

/// what the command line asked us to do
#[derive(Debug, Clone)]
pub enum Operation {
    /// alert groups per policy
    Groups { tree: PathBuf, groups: PathBuf },
    /// policies per label set
    Match { tree: PathBuf, labels: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Cli {
    pub config: String,
    pub level: Option<String>,
    pub unquote: bool,
    pub operation: Operation,
}

impl Cli {
    fn command() -> Command<'static> {
        let unquote = Arg::new("unquote")
            .help("remove server side quoting from matchers before matching")
            .long("unquote");
        let tree = Arg::new("tree")
            .help("path of the policy tree (json)")
            .takes_value(true)
            .required(true)
            .long("tree");

        Command::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .author(clap::crate_authors!())
            .subcommand_required(true)
            .args(&[
                Arg::new("config")
                    .help("path of config file")
                    .takes_value(true)
                    .short('c')
                    .long("config")
                    .default_value("./config.yaml"),
                Arg::new("level")
                    .help("log level")
                    .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                    .ignore_case(true)
                    .takes_value(true)
                    .long("log"),
            ])
            .subcommand(
                Command::new("groups")
                    .about("filter alert groups down to the alerts routed to each policy")
                    .arg(tree.clone())
                    .arg(
                        Arg::new("groups")
                            .help("path of the alert groups (json)")
                            .takes_value(true)
                            .required(true)
                            .long("groups"),
                    )
                    .arg(unquote.clone()),
            )
            .subcommand(
                Command::new("match")
                    .about("resolve label sets to the policies they are routed to")
                    .arg(tree)
                    .arg(
                        Arg::new("labels")
                            .help("path of a json list of label sets")
                            .takes_value(true)
                            .required(true)
                            .long("labels"),
                    )
                    .arg(unquote),
            )
    }

    pub fn parse() -> Result<Self> {
        Self::from_matches(&Self::command().get_matches())
    }

    fn from_matches(opts: &ArgMatches) -> Result<Self> {
        let path = |matches: &ArgMatches, name: &str| -> Result<PathBuf> {
            matches
                .value_of(name)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("missing --{}", name))
        };

        let (operation, sub) = match opts.subcommand() {
            Some(("groups", sub)) => (
                Operation::Groups {
                    tree: path(sub, "tree")?,
                    groups: path(sub, "groups")?,
                },
                sub,
            ),
            Some(("match", sub)) => (
                Operation::Match {
                    tree: path(sub, "tree")?,
                    labels: path(sub, "labels")?,
                },
                sub,
            ),
            _ => return Err(anyhow!("no operation given")),
        };

        Ok(Self {
            config: opts
                .value_of("config")
                .unwrap_or("./config.yaml")
                .to_string(),
            level: opts.value_of("level").map(str::to_string),
            unquote: sub.is_present("unquote"),
            operation,
        })
    }
}

impl Settings {
    /// settings installed by [Settings::init], defaults if there are none
    pub fn global() -> &'static Self {
        SETTINGS.get_or_init(Settings::default)
    }

    pub fn init(settings: Settings) -> Result<()> {
        SETTINGS
            .set(settings)
            .map_err(|_| anyhow!("settings already initialized"))
    }

    /// loads the config file (if there is one) and `ROUTEMATCH__*` environment variables, command line
    /// arguments take precedence
    pub fn load(cli: &Cli) -> Result<Self> {
        let conf = Config::builder()
            .add_source(config::File::with_name(cli.config.as_str()).required(false))
            .add_source(config::Environment::with_prefix("ROUTEMATCH").separator("__"))
            .build()
            .context("can't load config")?;

        let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

        if let Some(level) = &cli.level {
            settings.log.level = level.to_string();
        }

        if cli.unquote {
            settings.unquote_matchers = true;
        }

        Ok(settings)
    }
}
