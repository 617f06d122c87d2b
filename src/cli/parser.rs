use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use super::common::{DEFAULT_GH_PATH, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SETTLE_DELAY_SECS};
use super::reader;
use crate::error::ConfigError;
use crate::orchestrator::DEFAULT_REPORT_PATH;
use crate::step::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::worker::DEFAULT_WORKERS;

/// Values given on the command line. They win over the configuration file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub source_org: Option<String>,
    pub target_org: Option<String>,
    pub source_token: Option<String>,
    pub target_token: Option<String>,
    pub max_retries: Option<u32>,
    pub workers: Option<usize>,
    pub debug: bool,
}

#[derive(Clone, Debug)]
pub struct ParsedConfig {
    pub source_org: String,
    pub target_org: String,
    pub source_token: String,
    pub target_token: String,
    pub retry: RetryPolicy,
    pub workers: usize,
    pub debug: bool,
    pub settle_delay: Duration,
    pub report_path: PathBuf,
    pub gh_path: String,
    pub exclude: Vec<glob::Pattern>,
}

pub fn parse_config(
    overrides: &Overrides,
    config: reader::Config,
) -> Result<ParsedConfig, ConfigError> {
    let source_org = required("source-org", overrides.source_org.clone(), config.source_org)?;
    let target_org = required("target-org", overrides.target_org.clone(), config.target_org)?;
    let source_token = required(
        "source-token",
        overrides.source_token.clone(),
        config.source_token,
    )?;
    let target_token = required(
        "target-token",
        overrides.target_token.clone(),
        config.target_token,
    )?;

    if source_org == target_org {
        return Err(ConfigError::Invalid {
            key: "target-org",
            message: "source and target organizations must differ".to_string(),
        });
    }

    let workers = overrides
        .workers
        .or(config.workers)
        .unwrap_or(DEFAULT_WORKERS);
    if workers == 0 {
        return Err(ConfigError::Invalid {
            key: "workers",
            message: "at least one worker is needed".to_string(),
        });
    }

    let max_retries = overrides
        .max_retries
        .or(config.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let base_delay = Duration::from_millis(
        config
            .retry_base_delay_ms
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
    );

    let exclude = config
        .exclude
        .unwrap_or_default()
        .iter()
        .map(|expression| parse_exclude_expression(expression))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedConfig {
        source_org,
        target_org,
        source_token,
        target_token,
        retry: RetryPolicy::new(max_retries, base_delay),
        workers,
        debug: overrides.debug || config.debug.unwrap_or(false),
        settle_delay: Duration::from_secs(
            config.settle_delay_secs.unwrap_or(DEFAULT_SETTLE_DELAY_SECS),
        ),
        report_path: PathBuf::from(
            config
                .report_path
                .unwrap_or_else(|| DEFAULT_REPORT_PATH.to_string()),
        ),
        gh_path: config
            .gh_path
            .unwrap_or_else(|| DEFAULT_GH_PATH.to_string()),
        exclude,
    })
}

fn required(
    key: &'static str,
    flag: Option<String>,
    file: Option<String>,
) -> Result<String, ConfigError> {
    flag.or(file)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

/// Accepts either a bare glob (`archive-*`) or the wrapped form `glob("archive-*")`.
fn parse_exclude_expression(val: &str) -> Result<glob::Pattern, ConfigError> {
    let wrapped = Regex::new(r#"^glob\("(.*?)"\)$"#).map_err(|err| ConfigError::Invalid {
        key: "exclude",
        message: err.to_string(),
    })?;

    let pattern = match wrapped.captures(val.trim()) {
        Some(captures) => captures.get(1).map_or("", |m| m.as_str()),
        None => val.trim(),
    };

    glob::Pattern::new(pattern).map_err(|source| ConfigError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::reader::{read_config, Config};
    use indoc::indoc;

    fn complete() -> Config {
        Config {
            source_org: Some("acme".into()),
            target_org: Some("acme-emu".into()),
            source_token: Some("source".into()),
            target_token: Some("target".into()),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let parsed = parse_config(&Overrides::default(), complete()).unwrap();

        assert_eq!(parsed.retry, RetryPolicy::default());
        assert_eq!(parsed.workers, DEFAULT_WORKERS);
        assert_eq!(parsed.settle_delay, Duration::from_secs(10));
        assert_eq!(parsed.report_path, PathBuf::from("migration-result.json"));
        assert_eq!(parsed.gh_path, "gh");
        assert!(!parsed.debug);
        assert!(parsed.exclude.is_empty());
    }

    #[test]
    fn command_line_wins_over_file() {
        let overrides = Overrides {
            target_org: Some("acme-cloud".into()),
            max_retries: Some(2),
            workers: Some(9),
            debug: true,
            ..Overrides::default()
        };
        let config = Config {
            max_retries: Some(7),
            workers: Some(3),
            ..complete()
        };

        let parsed = parse_config(&overrides, config).unwrap();

        assert_eq!(parsed.source_org, "acme");
        assert_eq!(parsed.target_org, "acme-cloud");
        assert_eq!(parsed.retry.max_retries, 2);
        assert_eq!(parsed.workers, 9);
        assert!(parsed.debug);
    }

    #[test]
    fn missing_token_is_reported_by_name() {
        let config = Config {
            target_token: None,
            ..complete()
        };

        let err = parse_config(&Overrides::default(), config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("target-token")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let overrides = Overrides {
            source_org: Some("  ".into()),
            ..Overrides::default()
        };
        let config = Config {
            source_org: None,
            ..complete()
        };

        let err = parse_config(&overrides, config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("source-org")));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let overrides = Overrides {
            workers: Some(0),
            ..Overrides::default()
        };

        let err = parse_config(&overrides, complete()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "workers", .. }));
    }

    #[test]
    fn same_organization_is_rejected() {
        let config = Config {
            target_org: Some("acme".into()),
            ..complete()
        };

        assert!(parse_config(&Overrides::default(), config).is_err());
    }

    #[test]
    fn exclude_accepts_bare_and_wrapped_globs() {
        let doc = indoc! {r#"
        source_org: acme
        target_org: acme-emu
        source_token: s
        target_token: t
        retry_base_delay_ms: 250
        exclude:
          - archive-*
          - glob("sandbox-?")
        "#};

        let parsed = parse_config(&Overrides::default(), read_config(doc).unwrap()).unwrap();

        assert_eq!(parsed.retry.base_delay, Duration::from_millis(250));
        assert_eq!(parsed.exclude.len(), 2);
        assert!(parsed.exclude[0].matches("archive-2019"));
        assert!(parsed.exclude[1].matches("sandbox-1"));
        assert!(!parsed.exclude[1].matches("sandbox-12"));
        assert_eq!(parsed.exclude[1].as_str(), "sandbox-?");
    }

    #[test]
    fn broken_glob_is_rejected() {
        let config = Config {
            exclude: Some(vec!["glob(\"[\")".into()]),
            ..complete()
        };

        let err = parse_config(&Overrides::default(), config).unwrap_err();
        match err {
            ConfigError::Pattern { pattern, .. } => assert_eq!(pattern, "["),
            other => panic!("unexpected error: {other}"),
        }
    }
}
