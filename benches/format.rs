use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use ruleforge::{
    format_parameter, ParameterSpecification, ParameterType, QueryFamily, SessionError,
    UriExpander,
};

struct PrefixExpander;

impl UriExpander for PrefixExpander {
    fn expand_short_uri(&self, short_form: &str) -> Result<String, SessionError> {
        Ok(format!("https://knowledge.example.org/{short_form}"))
    }
}

fn bench_formatting(c: &mut Criterion) {
    let ids: Vec<String> = (0..100).map(|i| format!("entity/{i}")).collect();
    let value = json!(ids);

    let uri_list = ParameterSpecification::new("ids", ParameterType::SparqlValueUriList);
    c.bench_function("format_sparql_value_uri_list_100", |b| {
        b.iter(|| {
            format_parameter(
                black_box(&uri_list),
                black_box(&value),
                QueryFamily::Sparql,
                &PrefixExpander,
            )
            .unwrap()
        });
    });

    let plain_list = ParameterSpecification::new("ids", ParameterType::List);
    c.bench_function("format_list_100", |b| {
        b.iter(|| {
            format_parameter(
                black_box(&plain_list),
                black_box(&value),
                QueryFamily::Elastic,
                &PrefixExpander,
            )
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_formatting);
criterion_main!(benches);
