//! Document Planning Benchmarks
//!
//! Measures decoding of change documents and planning of the directory
//! operations for every directive they hold, as document size grows.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ldap_provisioner::document::parse_document;
use ldap_provisioner::{DirectiveExecutor, DirectoryConfig};
use std::sync::Arc;

/// A document with `users` user additions, each joining three groups.
fn build_document(users: usize) -> String {
    let mut xml = String::from("<input>");
    for index in 0..users {
        let login = login_for(index);
        xml.push_str(&format!(
            r#"<add class-name="Usuario">
                <add-attr attr-name="Nome Completo"><value>Usuario {login}</value></add-attr>
                <add-attr attr-name="Login"><value>{login}</value></add-attr>
                <add-attr attr-name="Telefone"><value>555{index:04}</value></add-attr>
                <add-attr attr-name="Grupo"><value>TI</value><value>RH</value><value>Financeiro</value></add-attr>
            </add>"#
        ));
    }
    xml.push_str("</input>");
    xml
}

/// Letters-only login, since logins may not contain digits.
fn login_for(mut index: usize) -> String {
    let mut login = String::from("u");
    loop {
        login.push((b'a' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break login;
        }
    }
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_document");
    for users in [10, 100, 1000] {
        let xml = build_document(users);
        group.throughput(Throughput::Elements(users as u64));
        group.bench_with_input(BenchmarkId::from_parameter(users), &xml, |b, xml| {
            b.iter(|| black_box(parse_document(xml).unwrap()));
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let config = DirectoryConfig::builder()
        .initial_password("changeit")
        .build()
        .unwrap();
    let executor = DirectiveExecutor::new(Arc::new(config));

    let mut group = c.benchmark_group("plan_directives");
    for users in [10, 100, 1000] {
        let document = parse_document(&build_document(users)).unwrap();
        group.throughput(Throughput::Elements(users as u64));
        group.bench_with_input(BenchmarkId::from_parameter(users), &document, |b, document| {
            b.iter(|| {
                for directive in document.directives() {
                    black_box(executor.plan(directive).unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(document_planning_benches, bench_parse, bench_plan);
criterion_main!(document_planning_benches);
