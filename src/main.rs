use std::env;
use std::process;

use log::error;

use slotdb::common::DbConfig;
use slotdb::tuple::{Date, Record, Schema, Value};
use slotdb::{Result, StorageEngine};

fn main() {
    env_logger::init();

    println!("slotdb - storage core demo");
    println!("==========================\n");

    // An optional argument names a `key = value` configuration file
    let config = match env::args().nth(1) {
        Some(path) => DbConfig::load(&path).unwrap_or_else(|e| {
            error!("cannot load configuration {}: {}", path, e);
            process::exit(2);
        }),
        None => DbConfig::new("demo_db"),
    };

    if let Err(e) = run(config) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(config: DbConfig) -> Result<()> {
    println!("Data directory: {}", config.db_path.display());
    println!(
        "Page size {} bytes, {} buffers, {} replacement\n",
        config.page_size, config.bm_buffer_count, config.bm_policy
    );

    let mut engine = StorageEngine::open(config)?;

    let schema: Schema =
        "id INT, score REAL, code CHAR(4), name VARCHAR(20), joined DATE".parse()?;
    let people = engine.create_table("people", schema.clone())?;
    println!(
        "Created table {}{} at {}",
        people.name(),
        people.schema(),
        people.header_page()
    );

    let rows = [
        (1, 9.5, "AB", "alice", Date::new(3, 1, 2020)),
        (2, 7.25, "CD", "bob", Date::new(14, 6, 2021)),
        (3, 8.0, "EFGH", "carol", Date::new(30, 11, 2022)),
    ];
    for (id, score, code, name, joined) in rows {
        let record = Record::new(
            &schema,
            vec![
                Value::Int(id),
                Value::Real(score),
                Value::from(code),
                Value::from(name),
                Value::Date(joined),
            ],
        )?;
        let rid = people.insert_record(engine.pool_mut(), &record)?;
        println!("Inserted record at {}", rid);
    }

    println!("\nData pages: {:?}", people.list_data_pages(engine.pool_mut())?);
    println!("\nReading back:");
    for record in people.get_all_records(engine.pool_mut())? {
        let fields: Vec<String> = record.values().iter().map(|v| v.to_string()).collect();
        println!("  - {}", fields.join(" | "));
    }

    let stats = engine.pool().stats();
    println!(
        "\nBuffer pool: {} cached, {} free, {} evictable",
        stats.cached_frames, stats.free_buffers, stats.evictable_frames
    );

    engine.shutdown()?;
    println!("\nDemo completed successfully!");
    Ok(())
}
