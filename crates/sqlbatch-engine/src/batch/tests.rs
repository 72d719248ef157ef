//! Tests for normalization, classification and chunk planning

use super::*;
use crate::BatchError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use sqlbatch_core::{BindSet, Statement};

fn bind_sets(n: usize) -> Vec<BindSet> {
    (0..n).map(|i| BindSet::new().with("x", i as i64)).collect()
}

mod normalize_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_binds_become_one_empty_set() {
        let request = normalize("SELECT 1", Binds::None).unwrap();

        assert_eq!(request.statements, vec![Statement::new("SELECT 1")]);
        assert_eq!(request.binds.len(), 1);
        assert!(request.is_unparameterized());
    }

    #[test]
    fn test_empty_bind_sequence_becomes_one_empty_set() {
        let request = normalize("SELECT 1", Vec::<BindSet>::new()).unwrap();

        assert!(request.is_unparameterized());
    }

    #[test]
    fn test_single_bind_set_is_wrapped() {
        let request = normalize("DELETE FROM t WHERE id = :id", BindSet::new().with("id", 7_i64)).unwrap();

        assert_eq!(request.binds.len(), 1);
        assert!(!request.is_unparameterized());
        assert_eq!(request.bind_value_count(), 1);
    }

    #[test]
    fn test_optional_bind_set() {
        let none = normalize("SELECT 1", None::<BindSet>).unwrap();
        assert!(none.is_unparameterized());

        let some = normalize("SELECT :a", Some(BindSet::new().with("a", 1_i64))).unwrap();
        assert_eq!(some.binds.len(), 1);
    }

    #[test]
    fn test_statement_sequence_keeps_order() {
        let request = normalize(["SELECT 1", "SELECT 2", "SELECT 3"], ()).unwrap();
        let sql: Vec<&str> = request.statements.iter().map(Statement::sql).collect();

        assert_eq!(sql, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_empty_statement_list_is_rejected() {
        let err = normalize(Vec::<Statement>::new(), ()).unwrap_err();

        assert!(matches!(err, BatchError::InputShape(_)));
    }

    #[test]
    fn test_blank_statement_is_rejected() {
        let err = normalize(vec!["SELECT 1", "   "], ()).unwrap_err();

        assert!(matches!(err, BatchError::InputShape(msg) if msg.contains("statement 1")));
    }
}

mod bind_product_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_product_with_no_rest_is_one_set_per_value() {
        let binds = bind_product([1_i64, 2, 3], "x", vec![]);

        assert_eq!(binds, bind_sets(4)[1..].to_vec());
    }

    #[test]
    fn test_nested_product_is_value_major() {
        let binds = bind_product(["f1", "f2"], "file", bind_product(["s1", "s2", "s3"], "site", vec![]));

        let pairs: Vec<(String, String)> = binds
            .iter()
            .map(|b| {
                (
                    b.get("file").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    b.get("site").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                )
            })
            .collect();

        assert_eq!(binds.len(), 6);
        assert_eq!(pairs[0], ("f1".to_string(), "s1".to_string()));
        assert_eq!(pairs[2], ("f1".to_string(), "s3".to_string()));
        assert_eq!(pairs[3], ("f2".to_string(), "s1".to_string()));
    }

    #[test]
    fn test_product_with_no_values_is_empty() {
        let binds = bind_product(Vec::<i64>::new(), "x", bind_sets(3));

        assert!(binds.is_empty());
    }
}

mod classify_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case(1, 0, Strategy::Direct)]
    #[case(3, 0, Strategy::Direct)]
    #[case(1, 1, Strategy::FanOut)]
    #[case(1, 1200, Strategy::FanOut)]
    #[case(2, 2, Strategy::Zipped)]
    #[case(5, 5, Strategy::Zipped)]
    fn test_classify(#[case] statements: usize, #[case] binds: usize, #[case] expected: Strategy) {
        // 0 bind sets means the lone empty set the normalizer produces
        let binds = if binds == 0 { vec![BindSet::new()] } else { bind_sets(binds) };

        assert_eq!(Strategy::classify(statements, &binds).unwrap(), expected);
    }

    #[rstest]
    #[case(2, 3)]
    #[case(3, 2)]
    #[case(2, 1)]
    fn test_classify_mismatch(#[case] statements: usize, #[case] binds: usize) {
        let err = Strategy::classify(statements, &bind_sets(binds)).unwrap_err();

        assert!(matches!(
            err,
            BatchError::CardinalityMismatch { statements: s, binds: b } if s == statements && b == binds
        ));
    }

    #[test]
    fn test_zipped_with_empty_sets_is_not_direct() {
        let binds = vec![BindSet::new(), BindSet::new()];

        assert_eq!(Strategy::classify(2, &binds).unwrap(), Strategy::Zipped);
    }

    #[test]
    fn test_only_fan_out_is_chunked() {
        assert!(Strategy::FanOut.is_chunked());
        assert!(!Strategy::Direct.is_chunked());
        assert!(!Strategy::Zipped.is_chunked());
    }
}

mod planner_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case(1, 500, 1)]
    #[case(500, 500, 1)]
    #[case(501, 500, 2)]
    #[case(1200, 500, 3)]
    #[case(3, 2, 2)]
    #[case(7, 1, 7)]
    fn test_chunk_count_is_ceiling(#[case] n: usize, #[case] cap: usize, #[case] expected: usize) {
        let binds = bind_sets(n);
        let plan = plan_chunks(&binds, cap);

        assert_eq!(plan.chunk_count(), expected);
        assert_eq!(plan.len(), expected);

        let chunks: Vec<Chunk<'_>> = plan.collect();
        assert_eq!(chunks.len(), expected);
        assert!(chunks.iter().all(|c| c.len() <= cap && !c.is_empty()));
    }

    #[test]
    fn test_chunks_concatenate_to_input() {
        let binds = bind_sets(1200);
        let mut rebuilt = Vec::new();

        for (expected_index, chunk) in plan_chunks(&binds, 500).enumerate() {
            assert_eq!(chunk.index, expected_index);
            assert_eq!(chunk.offset, rebuilt.len());
            rebuilt.extend_from_slice(chunk.binds);
        }

        assert_eq!(rebuilt, binds);
    }

    #[test]
    fn test_last_chunk_holds_remainder() {
        let binds = bind_sets(1200);
        let sizes: Vec<usize> = plan_chunks(&binds, 500).map(|c| c.len()).collect();
        let ranges: Vec<_> = plan_chunks(&binds, 500).map(|c| c.bind_range()).collect();

        assert_eq!(sizes, vec![500, 500, 200]);
        assert_eq!(ranges, vec![0..500, 500..1000, 1000..1200]);
    }

    #[test]
    fn test_zero_cap_is_treated_as_one() {
        let binds = bind_sets(3);

        assert_eq!(plan_chunks(&binds, 0).cap(), 1);
        assert_eq!(plan_chunks(&binds, 0).count(), 3);
    }

    #[test]
    fn test_plan_is_lazy_and_exact_size() {
        let binds = bind_sets(5);
        let mut plan = plan_chunks(&binds, 2);

        assert_eq!(plan.size_hint(), (3, Some(3)));
        plan.next();
        assert_eq!(plan.len(), 2);
        plan.next();
        plan.next();
        assert!(plan.next().is_none());
        assert!(plan.next().is_none());
    }

    #[test]
    fn test_single_plan_covers_everything() {
        let binds = bind_sets(4);
        let chunks: Vec<_> = ChunkPlan::single(&binds).collect();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4);
        assert_eq!(chunks[0].index, 0);
    }
}
