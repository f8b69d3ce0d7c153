//! Criterion benchmarks for hot paths in the drift engine.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - State flattening (recursive object walk)
//!   - Fingerprinting (SHA-256 + hex truncation)
//!   - Whole-snapshot diff (flatten + key-by-key compare)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use driftd::engine::compare::diff;
use driftd::engine::drift_fingerprint;
use driftd::engine::flatten::flatten;
use driftd::model::Domain;

fn sample_tree() -> Value {
    json!({
        "resources": [
            {
                "type": "aws_instance",
                "address": "aws_instance.web",
                "values": {
                    "instance_type": "t3.micro",
                    "ami": "ami-0123456789abcdef0",
                    "tags": {"env": "dev", "team": "platform", "cost_center": "cc-42"},
                    "root_block_device": {"volume_size": 40, "volume_type": "gp3"}
                }
            },
            {
                "type": "aws_security_group",
                "address": "aws_security_group.web",
                "values": {
                    "ingress": [{"from_port": 443, "to_port": 443, "protocol": "tcp"}],
                    "egress": [{"from_port": 0, "to_port": 0, "protocol": "-1"}]
                }
            }
        ],
        "outputs": {"vpc_id": "vpc-1234", "subnet_ids": ["subnet-1", "subnet-2"]}
    })
}

fn bench_flatten(c: &mut Criterion) {
    let tree = sample_tree();
    c.bench_function("flatten_terraform_snapshot", |b| {
        b.iter(|| {
            let flat = flatten(black_box(&tree));
            black_box(flat);
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    c.bench_function("drift_fingerprint", |b| {
        b.iter(|| {
            let fp = drift_fingerprint(
                black_box(Domain::Cloud),
                black_box("aws_instance"),
                black_box("root_block_device.volume_size"),
            );
            black_box(fp);
        });
    });
}

fn bench_diff(c: &mut Criterion) {
    let desired = sample_tree();
    let mut live = sample_tree();
    live["resources"][0]["values"]["instance_type"] = json!("t3.large");

    c.bench_function("domain_diff_cloud", |b| {
        b.iter(|| {
            let found = diff(Domain::Cloud, black_box(&desired), black_box(&live));
            black_box(found);
        });
    });
}

criterion_group!(benches, bench_flatten, bench_fingerprint, bench_diff);
criterion_main!(benches);
