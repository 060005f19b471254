//! Page, limit and offset resolution from operation, options and request.

use serde_json::Value;

use super::cursor::decode_cursor;
use super::options::{GraphQlPaginationOptions, PaginationOptions};
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::operation::Operation;

/// Resolved page window for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub offset: u64,
    pub limit: i64,
}

/// Resolves pagination parameters for a request.
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    options: PaginationOptions,
    graphql: GraphQlPaginationOptions,
}

impl Pagination {
    pub fn new(options: PaginationOptions, graphql: GraphQlPaginationOptions) -> Self {
        Self { options, graphql }
    }

    pub fn options(&self) -> &PaginationOptions {
        &self.options
    }

    /// Requested page; 1 when absent.
    pub fn page(&self, ctx: &QueryContext) -> QueryResult<u64> {
        let page = int_param(ctx, &self.options.page_parameter_name)?.unwrap_or(1);
        if page < 1 {
            return Err(QueryError::invalid("Page should not be less than 1"));
        }
        Ok(page as u64)
    }

    /// Items per page after client overrides, clamping and graph arguments.
    pub fn limit(&self, operation: &Operation, ctx: &QueryContext) -> QueryResult<i64> {
        let pagination = &operation.pagination;
        let mut limit = pagination
            .items_per_page
            .unwrap_or(self.options.items_per_page);

        let client_limit = pagination
            .client_items_per_page
            .unwrap_or(self.options.client_items_per_page);
        if client_limit {
            if let Some(requested) = int_param(ctx, &self.options.items_per_page_parameter_name)? {
                limit = requested;
            }
            let maximum = pagination
                .maximum_items_per_page
                .or(self.options.maximum_items_per_page);
            if let Some(maximum) = maximum
                && limit > maximum
            {
                tracing::debug!(requested = limit, maximum, "clamping items per page");
                limit = maximum;
            }
        }

        if ctx.is_graphql() {
            if let Some(first) = int_param(ctx, "first")? {
                limit = first;
            }
            if let Some(last) = int_param(ctx, "last")? {
                limit = last;
            }
        }

        if limit < 0 {
            return Err(QueryError::invalid("Limit should not be less than 0"));
        }

        if ctx.is_graphql()
            && let Some(before) = text_param(ctx, "before")
        {
            let before = decoded_index(&before)?;
            if before < limit {
                limit = before;
            }
        }
        Ok(limit)
    }

    /// Index of the first row of the page.
    pub fn offset(&self, operation: &Operation, ctx: &QueryContext) -> QueryResult<u64> {
        let limit = self.limit(operation, ctx)?;

        if ctx.is_graphql() {
            if let Some(after) = text_param(ctx, "after") {
                return Ok((decoded_index(&after)? as u64).saturating_add(1));
            }
            if let Some(before) = text_param(ctx, "before") {
                return Ok(decoded_index(&before)?.saturating_sub(limit).max(0) as u64);
            }
            if let Some(last) = int_param(ctx, "last")? {
                let last = u64::try_from(last).map_err(|_| QueryError::invalid("last should not be less than 0"))?;
                return Ok(ctx.count.unwrap_or(0).saturating_sub(last));
            }
        }

        let page = self.page(ctx)?;
        (page - 1)
            .checked_mul(limit as u64)
            .ok_or_else(|| QueryError::invalid("Page parameter is too large"))
    }

    /// Page, offset and limit in one pass.
    pub fn window(&self, operation: &Operation, ctx: &QueryContext) -> QueryResult<PageWindow> {
        let page = self.page(ctx)?;
        let limit = self.limit(operation, ctx)?;
        if limit == 0 && page > 1 {
            return Err(QueryError::invalid(
                "Page should not be greater than 1 if limit is equal to 0",
            ));
        }
        Ok(PageWindow {
            page,
            offset: self.offset(operation, ctx)?,
            limit,
        })
    }

    pub fn is_enabled(&self, operation: &Operation, ctx: &QueryContext) -> bool {
        let pagination = &operation.pagination;
        let enabled = pagination.enabled.unwrap_or(self.options.enabled);
        let client = pagination
            .client_enabled
            .unwrap_or(self.options.client_enabled);
        let enabled = self.client_flag(ctx, client, &self.options.enabled_parameter_name, enabled);

        if ctx.is_graphql() {
            return enabled && self.is_graphql_enabled(operation);
        }
        enabled
    }

    pub fn is_partial_enabled(&self, operation: &Operation, ctx: &QueryContext) -> bool {
        let pagination = &operation.pagination;
        let partial = pagination.partial.unwrap_or(self.options.partial);
        let client = pagination
            .client_partial
            .unwrap_or(self.options.client_partial);
        self.client_flag(ctx, client, &self.options.partial_parameter_name, partial)
    }

    pub fn is_graphql_enabled(&self, operation: &Operation) -> bool {
        operation.pagination.enabled.unwrap_or(self.graphql.enabled)
    }

    fn client_flag(&self, ctx: &QueryContext, client: bool, parameter: &str, default: bool) -> bool {
        if !client {
            return default;
        }
        match ctx.filter(parameter) {
            Some(value) => parse_bool_flag(value),
            None => default,
        }
    }
}

/// Boolean coercion for request flags: `1`, `true`, `on` and `yes` are true.
pub fn parse_bool_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

fn int_param(ctx: &QueryContext, name: &str) -> QueryResult<Option<i64>> {
    match ctx.filter(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| QueryError::invalid(format!("{name} must be an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| QueryError::invalid(format!("{name} must be an integer"))),
        Some(_) => Err(QueryError::invalid(format!("{name} must be an integer"))),
    }
}

fn text_param(ctx: &QueryContext, name: &str) -> Option<String> {
    ctx.filter(name).and_then(Value::as_str).map(str::to_string)
}

fn decoded_index(cursor: &str) -> QueryResult<i64> {
    let index = decode_cursor(cursor)?;
    i64::try_from(index).map_err(|_| QueryError::invalid(format!("cursor \"{cursor}\" is invalid")))
}
