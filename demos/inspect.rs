//! Inspect - decode a log file and print its fields.
//!
//! ```text
//! cargo run --example inspect -- match.rlog
//! cargo run --example inspect -- match.rlog /Drive/LeftVelocity 10 20
//! ```
//!
//! With only a path, prints the field tree. With a display key, prints the
//! samples of that field between the two timestamps (whole log by default).

use rlog_engine::store::{nearest_resolution, FieldStore, FieldTreeNode};
use rlog_engine::{ingest, DecoderConfig};

/// Target number of printed samples for long ranges.
const MAX_PRINTED: f64 = 200.0;

fn print_tree(store: &FieldStore, name: &str, node: &FieldTreeNode, depth: usize) {
    let label = match node.field.and_then(|handle| store.field_info(handle)) {
        Some(info) => format!("{} [{}]", name, info.value_type),
        None => name.to_string(),
    };
    println!("{}{}", "  ".repeat(depth), label);
    for (child, node) in &node.children {
        print_tree(store, child, node, depth + 1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rlog_engine=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: inspect <log> [display-key [start end]]");
        return Ok(());
    };

    let store = ingest::load_file(path, DecoderConfig::default()).await??;
    let Some((first, last)) = store.timestamp_range() else {
        println!("empty log");
        return Ok(());
    };
    println!(
        "{} entries, {} fields, {:.3}s to {:.3}s",
        store.len(),
        store.field_count(),
        first,
        last
    );

    let Some(key) = args.get(2) else {
        for (name, node) in &store.get_field_tree(false).children {
            print_tree(&store, name, node, 0);
        }
        return Ok(());
    };

    let start = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(first);
    let end = args.get(4).map(|s| s.parse()).transpose()?.unwrap_or(last);
    let Some(handle) = store.find_field_by_display_key(key) else {
        eprintln!("no field named {}", key);
        return Ok(());
    };

    let step = nearest_resolution((end - start) / MAX_PRINTED);
    let range = store.get_data_in_range(handle, start, end).decimate(step);
    for sample in range.iter() {
        println!("{:>10.3}  {:?}", sample.timestamp, sample.value);
    }
    Ok(())
}
