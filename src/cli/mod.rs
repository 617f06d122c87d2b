pub mod common;
pub mod parser;
pub mod reader;

pub use common::*;
pub use parser::{Overrides, ParsedConfig};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parser::parse_config;
use reader::{read_config, Config};

use crate::model::Visibility;

#[derive(Parser, Debug)]
#[clap(
    name = "orgmove",
    version,
    about = "Moves the repositories of a GitHub organization into another one"
)]
pub struct Args {
    /// YAML file with the same keys as the flags below
    #[clap(short, long, parse(from_os_str), global = true)]
    pub config: Option<std::path::PathBuf>,

    #[clap(long, global = true)]
    pub source_org: Option<String>,

    #[clap(long, global = true)]
    pub target_org: Option<String>,

    #[clap(long, env = "GH_SOURCE_PAT", hide_env_values = true, global = true)]
    pub source_token: Option<String>,

    #[clap(long, env = "GH_PAT", hide_env_values = true, global = true)]
    pub target_token: Option<String>,

    /// Attempts per remote call before a step is considered failed
    #[clap(long, global = true)]
    pub max_retries: Option<u32>,

    /// Repositories migrated in parallel
    #[clap(long, global = true)]
    pub workers: Option<usize>,

    #[clap(long, env = "DEBUG", global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate every source repository not yet present at the target
    MigrateOrganization,
    /// Migrate a single repository
    MigrateRepository {
        #[clap(long)]
        repo: String,
    },
    /// Migrate secret scanning alerts of one repository, or of all of them
    MigrateSecretScanning {
        #[clap(long)]
        repo: Option<String>,
    },
    /// Migrate code scanning alerts of one repository
    MigrateCodeScanning {
        #[clap(long)]
        repo: String,
    },
    /// Enable at the target the workflows that are active at the source
    ReactivateTargetWorkflows {
        #[clap(long)]
        repo: String,
    },
    /// Show how far an organization migration got
    MigrationStatus,
    DeleteBranchProtections {
        #[clap(long)]
        repo: String,
        #[clap(long, arg_enum, default_value = "target")]
        side: Side,
    },
    ChangeVisibility {
        #[clap(long)]
        repo: String,
        #[clap(long)]
        visibility: Visibility,
        #[clap(long, arg_enum, default_value = "target")]
        side: Side,
    },
    /// Turn GHAS on or off for one repository
    GhasRepoSettings {
        #[clap(long)]
        repo: String,
        #[clap(long, conflicts_with = "deactivate", required_unless_present = "deactivate")]
        activate: bool,
        #[clap(long)]
        deactivate: bool,
        #[clap(long, arg_enum, default_value = "target")]
        side: Side,
    },
    /// Enable GHAS defaults for one organization or every organization of an enterprise
    ActivateGhasFeatures {
        #[clap(long, conflicts_with = "organization", required_unless_present = "organization")]
        enterprise: Option<String>,
        #[clap(long)]
        organization: Option<String>,
        #[clap(long, arg_enum, default_value = "target")]
        side: Side,
    },
    /// Toggle GHAS defaults for new repositories of an organization
    GhasOrgSettings {
        #[clap(long, conflicts_with = "deactivate", required_unless_present = "deactivate")]
        activate: bool,
        #[clap(long)]
        deactivate: bool,
        #[clap(long, arg_enum, default_value = "target")]
        side: Side,
    },
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            source_org: self.source_org.clone(),
            target_org: self.target_org.clone(),
            source_token: self.source_token.clone(),
            target_token: self.target_token.clone(),
            max_retries: self.max_retries,
            workers: self.workers,
            debug: self.debug,
        }
    }
}

pub fn load(args: &Args) -> Result<ParsedConfig> {
    let config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("could not read file `{:?}`", path))?;
            read_config(&content)
                .with_context(|| format!("could not parse file `{:?}`", path))?
        }
        None => Config::default(),
    };

    let parsed = parse_config(&args.overrides(), config).context("invalid configuration")?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn global_flags_come_after_the_subcommand_too() {
        let args = parse(&[
            "orgmove",
            "migrate-repository",
            "--repo",
            "api",
            "--source-org",
            "acme",
            "--target-org",
            "acme-emu",
            "--source-token",
            "s",
            "--target-token",
            "t",
            "--workers",
            "2",
        ]);

        assert!(matches!(&args.command, Command::MigrateRepository { repo } if repo == "api"));
        let config = load(&args).unwrap();
        assert_eq!(config.source_org, "acme");
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn side_defaults_to_target() {
        let args = parse(&[
            "orgmove",
            "change-visibility",
            "--repo",
            "api",
            "--visibility",
            "internal",
        ]);

        match args.command {
            Command::ChangeVisibility {
                visibility, side, ..
            } => {
                assert_eq!(visibility, Visibility::Internal);
                assert_eq!(side, Side::Target);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ghas_org_settings_needs_exactly_one_direction() {
        assert!(Args::try_parse_from(["orgmove", "ghas-org-settings"]).is_err());
        assert!(Args::try_parse_from([
            "orgmove",
            "ghas-org-settings",
            "--activate",
            "--deactivate"
        ])
        .is_err());

        let args = parse(&["orgmove", "ghas-org-settings", "--deactivate", "--side", "source"]);
        assert!(matches!(
            args.command,
            Command::GhasOrgSettings {
                activate: false,
                deactivate: true,
                side: Side::Source
            }
        ));
    }

    #[test]
    fn ghas_repo_settings_takes_a_repository_and_a_direction() {
        assert!(Args::try_parse_from(["orgmove", "ghas-repo-settings", "--repo", "api"]).is_err());

        let args = parse(&["orgmove", "ghas-repo-settings", "--repo", "api", "--activate"]);
        assert!(matches!(
            args.command,
            Command::GhasRepoSettings {
                activate: true,
                deactivate: false,
                side: Side::Target,
                ..
            }
        ));
    }

    #[test]
    fn activate_ghas_features_needs_one_scope() {
        assert!(Args::try_parse_from(["orgmove", "activate-ghas-features"]).is_err());
        assert!(Args::try_parse_from([
            "orgmove",
            "activate-ghas-features",
            "--enterprise",
            "acme-corp",
            "--organization",
            "acme-emu"
        ])
        .is_err());

        let args = parse(&["orgmove", "activate-ghas-features", "--enterprise", "acme-corp"]);
        match args.command {
            Command::ActivateGhasFeatures {
                enterprise,
                organization,
                ..
            } => {
                assert_eq!(enterprise.as_deref(), Some("acme-corp"));
                assert!(organization.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = parse(&[
            "orgmove",
            "--config",
            "/nonexistent/orgmove.yaml",
            "migration-status",
        ]);

        let err = load(&args).unwrap_err();
        assert!(err.to_string().contains("could not read file"));
    }
}
