use crate::output::print_json;
use mig_core::id::{timestamp_of, to_base32};
use mig_core::IdGenerator;

pub fn run(base32: bool, json: bool) -> anyhow::Result<()> {
    let generator = IdGenerator::new();
    if base32 && !json {
        println!("{}", generator.generate_base32());
        return Ok(());
    }

    let id = generator.generate();
    if json {
        return print_json(&serde_json::json!({
            "id": id,
            "base32": to_base32(id),
            "timestamp": timestamp_of(id),
        }));
    }
    println!("{id}");
    Ok(())
}
