use local_schema_config::LocalSchemaConfig;
use schemars::schema_for;

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
  println!("⚙️ Generating JSON schema for local schema config file...");
  let schema = schema_for!(LocalSchemaConfig);
  let as_string = serde_json::to_string_pretty(&schema)?;
  println!("✏️ Writing to: libs/config/local-schema.schema.json");
  std::fs::write("libs/config/local-schema.schema.json", as_string)?;
  println!("✅ Done");

  Ok(())
}
