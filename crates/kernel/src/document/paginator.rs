//! Paginator over the output of the pagination `$facet` stage.

use serde_json::Value;

use super::pipeline::{FIRST_RESULT_FIELD, MAX_RESULTS_FIELD};
use crate::error::{QueryError, QueryResult};
use crate::pagination::OffsetPaginator;

/// Build a paginator from the single facet document an aggregation returns.
///
/// Expected shape: `{results: [...], count: [{count: n}],
/// __api_first_result__: n, __api_max_results__: n}`; an empty `count`
/// array means zero matches.
pub fn paginator_from_facet(output: Vec<Value>) -> QueryResult<OffsetPaginator> {
    let Some(Value::Object(mut facet)) = output.into_iter().next() else {
        return Err(QueryError::mapping("the aggregation returned no facet document"));
    };

    let Some(Value::Array(items)) = facet.remove("results") else {
        return Err(QueryError::mapping(
            "\"$facet\" stage was not applied to the aggregation pipeline: missing \"results\"",
        ));
    };
    let Some(Value::Array(count)) = facet.remove("count") else {
        return Err(QueryError::mapping(
            "\"$facet\" stage was not applied to the aggregation pipeline: missing \"count\"",
        ));
    };
    let total_items = count
        .first()
        .and_then(|c| c.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let first_result = facet
        .get(FIRST_RESULT_FIELD)
        .and_then(Value::as_u64)
        .ok_or_else(|| QueryError::mapping(format!("missing \"{FIRST_RESULT_FIELD}\" in the aggregation output")))?;
    let max_results = facet
        .get(MAX_RESULTS_FIELD)
        .and_then(Value::as_i64)
        .ok_or_else(|| QueryError::mapping(format!("missing \"{MAX_RESULTS_FIELD}\" in the aggregation output")))?;

    Ok(OffsetPaginator::new(items, first_result, max_results, total_items))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::pagination::{Paginator, PartialPaginator};
    use serde_json::json;

    #[test]
    fn reads_facet_output() {
        let output = vec![json!({
            "results": [{"_id": 21}, {"_id": 22}],
            "count": [{"count": 45}],
            "__api_first_result__": 20,
            "__api_max_results__": 10,
        })];
        let paginator = paginator_from_facet(output).unwrap();
        assert_eq!(paginator.count(), 2);
        assert_eq!(paginator.total_items(), 45.0);
        assert_eq!(paginator.current_page(), 3.0);
        assert_eq!(paginator.last_page(), 5.0);
        assert!(paginator.has_next_page());
    }

    #[test]
    fn empty_count_means_zero() {
        let output = vec![json!({
            "results": [],
            "count": [],
            "__api_first_result__": 0,
            "__api_max_results__": 0,
        })];
        let paginator = paginator_from_facet(output).unwrap();
        assert_eq!(paginator.total_items(), 0.0);
        assert_eq!(paginator.current_page(), 1.0);
        assert_eq!(paginator.last_page(), 1.0);
    }

    #[test]
    fn malformed_output_is_a_mapping_error() {
        for output in [
            vec![],
            vec![json!({"count": []})],
            vec![json!({"results": []})],
            vec![json!({"results": [], "count": []})],
        ] {
            assert!(matches!(
                paginator_from_facet(output),
                Err(QueryError::Mapping(_))
            ));
        }
    }
}
