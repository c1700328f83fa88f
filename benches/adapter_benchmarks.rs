//! Criterion benchmarks for rust_table_adapter

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_table_adapter::core::{Join, OrderDirection, OrderTerm, SelectBuilder, TableRef};
use rust_table_adapter::prelude::*;

fn predicate_text(terms: usize) -> String {
    (0..terms)
        .map(|i| match i % 3 {
            0 => format!("c{i} = 'value {i}'"),
            1 => format!("c{i} BETWEEN {i} AND {}", i * 10),
            _ => format!("c{i} IN (1, 2, 3)"),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

// ============================================================================
// Predicate Benchmarks
// ============================================================================

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for terms in [1, 5, 20].iter() {
        let text = predicate_text(*terms);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &text, |b, text| {
            b.iter(|| predicate::tokenize(black_box(text)))
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate_parse");

    for terms in [1, 5, 20].iter() {
        let text = predicate_text(*terms);
        group.throughput(Throughput::Elements(*terms as u64));
        group.bench_with_input(BenchmarkId::from_parameter(terms), &text, |b, text| {
            b.iter(|| predicate::parse(black_box(text)))
        });
    }

    group.finish();
}

// ============================================================================
// Rendering Benchmarks
// ============================================================================

fn bench_select_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_rendering");

    for terms in [1, 5, 20].iter() {
        let clauses = predicate::parse(&predicate_text(*terms)).unwrap();
        let builder = SelectBuilder::new(TableRef::new(Some("sales"), "Customer"))
            .member("CustomerId", Some("Customer"), None, false)
            .member("Name", Some("Customer"), None, false)
            .join(Join {
                join_type: JoinType::Left,
                table: "Orders".to_string(),
                alias: None,
                on_condition: "Orders.CustomerId = Customer.CustomerId".to_string(),
            })
            .clauses(clauses)
            .order_by(OrderTerm::parse_list("Name DESC, CustomerId", OrderDirection::Asc))
            .limit(Some(50));

        for dialect in [DatabaseType::Sqlite, DatabaseType::Postgres, DatabaseType::Mssql] {
            group.bench_with_input(
                BenchmarkId::new(dialect.to_str(), terms),
                &builder,
                |b, builder| b.iter(|| builder.build(black_box(dialect))),
            );
        }
    }

    group.finish();
}

fn bench_entity_tracking(c: &mut Criterion) {
    let registry = MetadataRegistry::new();
    registry.register_fn("Customer", |m| {
        m.register_entity(None, "Customer", false)
            .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Long(0))
            .register_entity_field("Name", DbType::Varchar, Some(50), false, false, DatabaseValue::Null)
            .register_entity_field("Age", DbType::Int, None, true, false, DatabaseValue::Null)
            .register_entity_pri_key("CustomerId");
    });

    let mut group = c.benchmark_group("entity_tracking");

    group.bench_function("create", |b| {
        b.iter(|| registry.create(black_box("Customer")))
    });

    group.bench_function("set_and_diff", |b| {
        let mut entity = registry.create("Customer").unwrap();
        b.iter(|| {
            entity.set("Name", black_box("Ann")).unwrap();
            entity.set("Age", black_box(34)).unwrap();
            let changed = entity.changed_fields().len();
            entity.discard_changes();
            black_box(changed)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_parse,
    bench_select_rendering,
    bench_entity_tracking,
);
criterion_main!(benches);
