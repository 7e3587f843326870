use crate::devops::fields::RankField;
use color_eyre::eyre::{eyre, Report, WrapErr};
use std::env;
use std::str::FromStr;

/// Largest page the work item batch endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 200;

pub const DEFAULT_HISTORY_COMMENT: &str = "Updated by AIT Voting Extension";
pub const DEFAULT_WRITE_RETRIES: u32 = 3;

/// Settings shared by the fetch, materialize and write stages.
#[derive(Clone, Debug, PartialEq)]
pub struct BacklogSettings {
    pub page_size: usize,
    /// Shown for items nobody is assigned to.
    pub unassigned_label: String,
    pub rank_field: RankField,
    pub history_comment: String,
    /// Retries for a document write that lost an optimistic-concurrency race.
    pub write_retries: u32,
}

impl Default for BacklogSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            unassigned_label: String::new(),
            rank_field: RankField::StackRank,
            history_comment: DEFAULT_HISTORY_COMMENT.to_owned(),
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }
}

impl BacklogSettings {
    pub fn validate(self) -> Result<Self, Report> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(eyre!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.page_size
            ));
        }
        Ok(self)
    }
}

/// Connection details for the work tracking service.
#[derive(Clone, Debug)]
pub struct DevOpsConfig {
    pub organization_url: String,
    pub project: String,
    pub team: String,
    pub token: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub devops: DevOpsConfig,
    pub backlog: BacklogSettings,
}

impl Config {
    /// Reads the configuration from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, Report> {
        dotenv::dotenv().ok();
        let defaults = BacklogSettings::default();
        let backlog = BacklogSettings {
            page_size: parse_or("VAAS_PAGE_SIZE", defaults.page_size)?,
            unassigned_label: env::var("VAAS_UNASSIGNED_LABEL")
                .unwrap_or(defaults.unassigned_label),
            rank_field: parse_or("VAAS_RANK_FIELD", defaults.rank_field)?,
            history_comment: env::var("VAAS_HISTORY_COMMENT").unwrap_or(defaults.history_comment),
            write_retries: parse_or("VAAS_WRITE_RETRIES", defaults.write_retries)?,
        }
        .validate()?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            devops: DevOpsConfig {
                organization_url: required("DEVOPS_ORG_URL")?,
                project: required("DEVOPS_PROJECT")?,
                team: required("DEVOPS_TEAM")?,
                token: required("DEVOPS_TOKEN")?,
            },
            backlog,
        })
    }
}

fn required(key: &str) -> Result<String, Report> {
    env::var(key).wrap_err_with(|| format!("{} must be set", key))
}

fn parse_or<T>(key: &str, default: T) -> Result<T, Report>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| eyre!("invalid value {:?} for {}: {}", raw, key, err)),
        Err(_) => Ok(default),
    }
}
