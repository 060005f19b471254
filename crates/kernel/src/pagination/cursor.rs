//! Opaque Relay-style cursors and connections.
//!
//! A cursor is the base64 encoding of a decimal row index.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;

use super::paginator::{Paginator, PartialPaginator};
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};

/// Encode a row index as an opaque cursor.
pub fn encode_cursor(index: u64) -> String {
    STANDARD.encode(index.to_string())
}

/// Decode an opaque cursor back into a row index.
pub fn decode_cursor(cursor: &str) -> QueryResult<u64> {
    let invalid = || QueryError::invalid(format!("cursor \"{cursor}\" is invalid"));
    let bytes = STANDARD.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.parse::<u64>().map_err(|_| invalid())
}

/// Graph collection arguments read from the request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub first: Option<u64>,
    pub last: Option<u64>,
    pub after: Option<String>,
    pub before: Option<String>,
}

impl ConnectionArgs {
    pub fn from_context(ctx: &QueryContext) -> Self {
        let number = |name: &str| match ctx.filter(name) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        let text = |name: &str| ctx.filter(name).and_then(Value::as_str).map(str::to_string);
        Self {
            first: number("first"),
            last: number("last"),
            after: text("after"),
            before: text("before"),
        }
    }

    /// Index of the first row of the page relative to the whole collection.
    fn offset(&self, page_count: usize, total: u64) -> QueryResult<u64> {
        let mut offset: i128 = 0;
        if let Some(after) = &self.after {
            offset = i128::from(decode_cursor(after)?) + 1;
        }
        if let Some(before) = &self.before {
            offset = i128::from(decode_cursor(before)?) - page_count as i128;
        }
        if let (Some(last), None) = (self.last, &self.before) {
            offset = i128::from(total) - i128::from(last);
        }
        Ok(u64::try_from(offset.max(0)).unwrap_or(0))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Edge {
    pub node: Value,
    pub cursor: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Relay connection built from a paginator.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub total_count: Option<u64>,
}

impl Connection {
    /// Build a connection from a paginator that knows the total count.
    pub fn from_paginator(paginator: &dyn Paginator, args: &ConnectionArgs) -> QueryResult<Self> {
        let total = paginator.total_items() as u64;
        let offset = args.offset(paginator.count(), total)?;
        let has_next_page = paginator.current_page() != paginator.last_page()
            && paginator.count() as f64 == paginator.items_per_page();
        let end_cursor = total.checked_sub(1).map(encode_cursor);

        Ok(Self {
            edges: edges(paginator.items(), offset),
            page_info: PageInfo {
                start_cursor: Some(encode_cursor(offset)),
                end_cursor,
                has_next_page,
                has_previous_page: offset > 0,
            },
            total_count: Some(total),
        })
    }

    /// Build a connection from a count-less paginator.
    pub fn from_partial(paginator: &dyn PartialPaginator, args: &ConnectionArgs) -> QueryResult<Self> {
        let count = paginator.count();
        let offset = args.offset(count, 0)?;
        let end_cursor = (count > 0).then(|| encode_cursor(offset + count as u64 - 1));

        Ok(Self {
            edges: edges(paginator.items(), offset),
            page_info: PageInfo {
                start_cursor: Some(encode_cursor(offset)),
                end_cursor,
                has_next_page: count as f64 == paginator.items_per_page(),
                has_previous_page: offset > 0,
            },
            total_count: None,
        })
    }
}

fn edges(items: &[Value], offset: u64) -> Vec<Edge> {
    items
        .iter()
        .enumerate()
        .map(|(index, node)| Edge {
            node: node.clone(),
            cursor: encode_cursor(index as u64 + offset),
        })
        .collect()
}
