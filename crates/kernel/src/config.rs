//! Configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::operation::SortDirection;
use crate::pagination::{GraphQlPaginationOptions, OrderOptions, PaginationOptions};

/// Pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub pagination: PaginationOptions,

    pub graphql_pagination: GraphQlPaginationOptions,

    pub order: OrderOptions,
}

impl Config {
    /// Load configuration from `QUARRY_*` environment variables.
    ///
    /// Unset variables keep the defaults of [`PaginationOptions`] and
    /// [`OrderOptions`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PaginationOptions::default();

        let enabled = parse_or(&lookup, "QUARRY_PAGINATION_ENABLED", defaults.enabled)?;
        let client_enabled = parse_or(&lookup, "QUARRY_PAGINATION_CLIENT_ENABLED", defaults.client_enabled)?;
        let items_per_page = parse_or(&lookup, "QUARRY_PAGINATION_ITEMS_PER_PAGE", defaults.items_per_page)?;
        let client_items_per_page = parse_or(
            &lookup,
            "QUARRY_PAGINATION_CLIENT_ITEMS_PER_PAGE",
            defaults.client_items_per_page,
        )?;
        let maximum_items_per_page = lookup("QUARRY_PAGINATION_MAXIMUM_ITEMS_PER_PAGE")
            .map(|v| v.trim().parse())
            .transpose()
            .context("QUARRY_PAGINATION_MAXIMUM_ITEMS_PER_PAGE must be a valid integer")?;
        let partial = parse_or(&lookup, "QUARRY_PAGINATION_PARTIAL", defaults.partial)?;
        let client_partial = parse_or(&lookup, "QUARRY_PAGINATION_CLIENT_PARTIAL", defaults.client_partial)?;

        let default_direction = lookup("QUARRY_ORDER_DEFAULT_DIRECTION")
            .filter(|v| !v.trim().is_empty())
            .map(|v| SortDirection::from_str(v.trim()))
            .transpose()
            .map_err(|e| anyhow::anyhow!("QUARRY_ORDER_DEFAULT_DIRECTION: {e}"))?;

        let graphql_enabled = parse_or(
            &lookup,
            "QUARRY_GRAPHQL_PAGINATION_ENABLED",
            GraphQlPaginationOptions::default().enabled,
        )?;

        Ok(Self {
            pagination: PaginationOptions {
                enabled,
                client_enabled,
                client_items_per_page,
                items_per_page,
                maximum_items_per_page,
                partial,
                client_partial,
                ..defaults
            },
            graphql_pagination: GraphQlPaginationOptions {
                enabled: graphql_enabled,
            },
            order: OrderOptions {
                default_direction,
                ..OrderOptions::default()
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
